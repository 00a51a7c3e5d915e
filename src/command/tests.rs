//! Command Module Tests
//!
//! Covers the client line protocol from raw text to rendered reply.
//!
//! ## Test Scopes
//! - **Parsing**: verbs, keys, values and every rejection path.
//! - **Execution**: SET/GET/STATS replies on a single node.
//! - **Transport**: a real TCP session against `CommandServer`.

#[cfg(test)]
mod tests {
    use crate::cluster::node::{ClusterNode, Role};
    use crate::command::parser::{Command, CommandError, parse};
    use crate::command::server::{CommandServer, REPORT_TERMINATOR, handle_line};
    use crate::config::NodeConfig;
    use crate::membership::types::PeerId;
    use crate::rpc::client::PeerClient;
    use crate::storage::disk::{DiskStore, IoMode};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn lone_node(min_replicas: usize) -> (TempDir, Arc<ClusterNode>) {
        let dir = TempDir::new().unwrap();
        let config = NodeConfig {
            min_replicas,
            ..NodeConfig::default()
        };
        let store = DiskStore::open(IoMode::Classic, dir.path()).unwrap();
        let node = ClusterNode::new(
            config,
            PeerId::new("127.0.0.1", 5555),
            Role::Coordinator,
            store,
            PeerClient::new().unwrap(),
        );
        (dir, node)
    }

    // ============================================================
    // PARSER TESTS
    // ============================================================

    #[test]
    fn test_parse_set_keeps_rest_of_line() {
        assert_eq!(
            parse("SET 1 hello   spaced  world"),
            Ok(Command::Set {
                key: 1,
                value: "hello   spaced  world".to_string()
            })
        );
    }

    #[test]
    fn test_parse_verbs_are_case_insensitive() {
        assert_eq!(parse("get 42"), Ok(Command::Get { key: 42 }));
        assert_eq!(parse("  Stats  "), Ok(Command::Stats));
        assert_eq!(
            parse("set -5 v"),
            Ok(Command::Set {
                key: -5,
                value: "v".to_string()
            })
        );
    }

    #[test]
    fn test_parse_rejections() {
        assert_eq!(parse(""), Err(CommandError::Empty));
        assert_eq!(parse("   "), Err(CommandError::Empty));
        assert_eq!(parse("SET"), Err(CommandError::MissingKey("SET")));
        assert_eq!(parse("GET"), Err(CommandError::MissingKey("GET")));
        assert_eq!(parse("SET 1"), Err(CommandError::MissingValue));
        assert_eq!(parse("GET 1 2"), Err(CommandError::TrailingInput));
        assert_eq!(
            parse("GET abc"),
            Err(CommandError::InvalidKey("abc".to_string()))
        );
        assert_eq!(
            parse("SET 99999999999 v"),
            Err(CommandError::InvalidKey("99999999999".to_string()))
        );
        assert_eq!(
            parse("DELETE 1"),
            Err(CommandError::Unknown("DELETE".to_string()))
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CommandError::InvalidKey("x".into()).to_string(),
            "Invalid key format: x"
        );
        assert!(
            CommandError::Unknown("FOO".into())
                .to_string()
                .contains("Usage: SET <key> <value> | GET <key> | STATS")
        );
    }

    // ============================================================
    // EXECUTION TESTS
    // ============================================================

    #[tokio::test]
    async fn test_set_then_get_on_lone_node() {
        let (_dir, node) = lone_node(0);

        assert_eq!(handle_line(&node, "SET 7 seven:with:colons").await, "OK");
        assert_eq!(handle_line(&node, "GET 7").await, "OK seven:with:colons");
        assert!(node.store.exists(7));
    }

    #[tokio::test]
    async fn test_get_absent_key_is_bare_ok() {
        let (_dir, node) = lone_node(0);

        assert_eq!(handle_line(&node, "GET 12345").await, "OK");
    }

    #[tokio::test]
    async fn test_parse_failure_becomes_error_reply() {
        let (_dir, node) = lone_node(0);

        let reply = handle_line(&node, "FROB 1").await;
        assert!(reply.starts_with("ERROR Unknown command: FROB"), "{}", reply);

        let reply = handle_line(&node, "GET nope").await;
        assert_eq!(reply, "ERROR Invalid key format: nope");
    }

    #[tokio::test]
    async fn test_set_without_enough_replicas_reports_error() {
        let (_dir, node) = lone_node(1);

        let reply = handle_line(&node, "SET 3 v").await;

        assert!(reply.starts_with("ERROR"), "{}", reply);
        assert!(reply.contains("0/0"), "{}", reply);
        // The local copy is still written.
        assert_eq!(handle_line(&node, "GET 3").await, "OK v");
    }

    #[tokio::test]
    async fn test_stats_reply_is_terminated() {
        let (_dir, node) = lone_node(0);
        handle_line(&node, "SET 1 a").await;

        let reply = handle_line(&node, "STATS").await;
        let lines: Vec<&str> = reply.lines().collect();

        assert_eq!(lines.last(), Some(&REPORT_TERMINATOR));
        assert!(lines.contains(&"Total SET: 1"));
        assert!(lines[0].contains("COORDINATOR"));
    }

    // ============================================================
    // TRANSPORT TESTS
    // ============================================================

    #[tokio::test]
    async fn test_command_session_over_tcp() {
        let (_dir, node) = lone_node(0);
        let server = CommandServer::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        let handle = tokio::spawn(server.run(node));

        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"SET 10 over tcp\n\nGET 10\nGET 11\n").await.unwrap();

        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("OK"));
        assert_eq!(
            lines.next_line().await.unwrap().as_deref(),
            Some("OK over tcp")
        );
        assert_eq!(lines.next_line().await.unwrap().as_deref(), Some("OK"));

        writer.write_all(b"STATS\n").await.unwrap();
        loop {
            let line = lines.next_line().await.unwrap().unwrap();
            if line == REPORT_TERMINATOR {
                break;
            }
        }

        handle.abort();
    }
}
