use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use super::parser::{self, Command};
use crate::cluster::node::ClusterNode;

/// Terminates the multi-line `STATS` reply.
pub const REPORT_TERMINATOR: &str = "END";

/// Executes one parsed command and renders the reply (without trailing newline).
pub async fn execute(node: &ClusterNode, command: Command) -> String {
    match command {
        Command::Set { key, value } => match node.replicate_write(key, value).await {
            Ok(outcome) if outcome.is_success() => "OK".to_string(),
            Ok(outcome) => format!(
                "ERROR stored locally but only {}/{} replicas acknowledged ({} required)",
                outcome.acknowledged.len(),
                outcome.attempted.len(),
                outcome.required
            ),
            Err(e) => format!("ERROR {:#}", e),
        },
        Command::Get { key } => match node.lookup(key).await {
            Ok(Some(value)) => format!("OK {}", value),
            Ok(None) => "OK".to_string(),
            Err(e) => format!("ERROR {:#}", e),
        },
        Command::Stats => {
            let mut lines = node.stats_report();
            lines.push(REPORT_TERMINATOR.to_string());
            lines.join("\n")
        }
    }
}

/// Parses and executes one raw line. Parse failures become `ERROR <reason>`.
pub async fn handle_line(node: &ClusterNode, line: &str) -> String {
    match parser::parse(line) {
        Ok(command) => execute(node, command).await,
        Err(e) => format!("ERROR {}", e),
    }
}

/// Line-protocol listener opened by the coordinator.
pub struct CommandServer {
    listener: TcpListener,
}

impl CommandServer {
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind command port {}", addr))?;
        tracing::info!("Command interface listening on {}", addr);
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts clients forever; each connection runs on its own task.
    pub async fn run(self, node: Arc<ClusterNode>) {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let node = node.clone();
                    tokio::spawn(async move {
                        tracing::debug!("[CONNECTION] {}", peer);
                        if let Err(e) = serve_client(stream, node).await {
                            tracing::debug!("Client {} disconnected: {}", peer, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Command accept failed: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }
}

async fn serve_client(stream: TcpStream, node: Arc<ClusterNode>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let mut reply = handle_line(&node, &line).await;
        reply.push('\n');
        writer.write_all(reply.as_bytes()).await?;
    }

    Ok(())
}
