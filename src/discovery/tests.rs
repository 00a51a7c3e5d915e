//! Discovery Module Tests
//!
//! All network tests stay on the loopback interface: the "broadcast" address is
//! pointed at `127.0.0.1` and the scan is fed explicit candidates.
//!
//! ## Test Scopes
//! - **Addressing**: candidate generation and announcement parsing.
//! - **Broadcast**: probe/answer round-trip with a live beacon.
//! - **Scan**: first-connect wins, empty ranges give up.

#[cfg(test)]
mod tests {
    use crate::config::NodeConfig;
    use crate::discovery::beacon::CoordinatorBeacon;
    use crate::discovery::service::{
        DiscoveryService, candidate_addresses, parse_announcement, parse_coordinator_address,
    };
    use crate::discovery::{PROBE_MESSAGE, REPLY_PREFIX};
    use crate::membership::types::PeerId;
    use std::net::Ipv4Addr;
    use std::time::{Duration, Instant};
    use tokio::net::{TcpListener, UdpSocket};

    fn loopback_service(discovery_port: u16, coordinator_port: u16) -> DiscoveryService {
        let config = NodeConfig {
            discovery_port,
            rpc_port: coordinator_port,
            no_scan: true,
            ..NodeConfig::default()
        };
        let mut service = DiscoveryService::new(Ipv4Addr::LOCALHOST, &config);
        service.broadcast_addr = Ipv4Addr::LOCALHOST;
        service.broadcast_wait = Duration::from_millis(500);
        service
    }

    async fn unused_udp_port() -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.local_addr().unwrap().port()
    }

    // ============================================================
    // ADDRESSING TESTS
    // ============================================================

    #[test]
    fn test_candidates_cover_slash_16_without_self() {
        let local = Ipv4Addr::new(192, 168, 4, 20);
        let candidates: Vec<Ipv4Addr> = candidate_addresses(local).collect();

        assert_eq!(candidates.len(), 256 * 254 - 1);
        assert!(!candidates.contains(&local));
        assert_eq!(candidates.first(), Some(&Ipv4Addr::new(192, 168, 0, 1)));
        assert_eq!(candidates.last(), Some(&Ipv4Addr::new(192, 168, 255, 254)));
        assert!(candidates.iter().all(|ip| {
            let [a, b, _, host] = ip.octets();
            a == 192 && b == 168 && host != 0 && host != 255
        }));
    }

    #[test]
    fn test_parse_announcement() {
        assert_eq!(
            parse_announcement("LEADER_HERE:10.0.0.5:5555", 1),
            Some(PeerId::new("10.0.0.5", 5555))
        );
        assert_eq!(
            parse_announcement("LEADER_HERE:10.0.0.5\n", 5555),
            Some(PeerId::new("10.0.0.5", 5555))
        );
        assert_eq!(parse_announcement("LEADER_HERE:", 5555), None);
        assert_eq!(parse_announcement("HELLO", 5555), None);
        assert_eq!(parse_announcement(PROBE_MESSAGE, 5555), None);
    }

    #[test]
    fn test_parse_coordinator_address() {
        assert_eq!(
            parse_coordinator_address("10.1.2.3", 5555),
            Some(PeerId::new("10.1.2.3", 5555))
        );
        assert_eq!(
            parse_coordinator_address("10.1.2.3:6000", 5555),
            Some(PeerId::new("10.1.2.3", 6000))
        );
        assert_eq!(parse_coordinator_address("10.1.2.3:bad", 5555), None);
        assert_eq!(parse_coordinator_address("  ", 5555), None);
    }

    // ============================================================
    // BROADCAST TESTS
    // ============================================================

    #[tokio::test]
    async fn test_beacon_answers_probe() {
        let coordinator = PeerId::new("127.0.0.1", 5999);
        let beacon = CoordinatorBeacon::bind("127.0.0.1:0".parse().unwrap(), coordinator.clone())
            .await
            .unwrap();
        let beacon_port = beacon.local_addr().unwrap().port();
        assert_eq!(beacon.announcement(), format!("{}127.0.0.1:5999", REPLY_PREFIX));
        let handle = tokio::spawn(beacon.run());

        let service = loopback_service(beacon_port, 5555);
        let found = service.broadcast_probe().await.unwrap();

        assert_eq!(found, Some(coordinator));
        handle.abort();
    }

    #[tokio::test]
    async fn test_beacon_ignores_other_datagrams() {
        let beacon = CoordinatorBeacon::bind(
            "127.0.0.1:0".parse().unwrap(),
            PeerId::new("127.0.0.1", 5999),
        )
        .await
        .unwrap();
        let beacon_addr = beacon.local_addr().unwrap();
        let handle = tokio::spawn(beacon.run());

        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket.send_to(b"LEADER_SEARCH_PLEASE", beacon_addr).await.unwrap();

        let mut buf = [0u8; 64];
        let reply =
            tokio::time::timeout(Duration::from_millis(300), socket.recv_from(&mut buf)).await;
        assert!(reply.is_err(), "Beacon must only answer exact probes");

        handle.abort();
    }

    #[tokio::test]
    async fn test_lone_node_discovers_nothing_within_wait() {
        let service = loopback_service(unused_udp_port().await, 5555);

        let started = Instant::now();
        let found = service.discover().await;

        assert!(found.is_none(), "Lone node must become coordinator");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    // ============================================================
    // SCAN TESTS
    // ============================================================

    #[tokio::test]
    async fn test_scan_finds_listening_coordinator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let service = loopback_service(unused_udp_port().await, port);
        let found = service.scan([Ipv4Addr::LOCALHOST]).await;

        assert_eq!(found, Some(PeerId::new("127.0.0.1", port)));
    }

    #[tokio::test]
    async fn test_scan_with_no_listener_gives_up() {
        // Reserve then release a port so the connect is refused.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut service = loopback_service(unused_udp_port().await, port);
        service.scan_deadline = Duration::from_secs(1);

        assert_eq!(service.scan([Ipv4Addr::LOCALHOST]).await, None);
        assert_eq!(service.scan(Vec::<Ipv4Addr>::new()).await, None);
    }

    #[tokio::test]
    async fn test_scan_respects_deadline() {
        // TEST-NET addresses never answer; the connect timeouts exceed the deadline.
        let mut service = loopback_service(unused_udp_port().await, 5555);
        service.scan_workers = 1;
        service.scan_connect_timeout = Duration::from_secs(5);
        service.scan_deadline = Duration::from_millis(200);

        let started = Instant::now();
        let found = service.scan([Ipv4Addr::new(192, 0, 2, 1)]).await;

        assert!(found.is_none());
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
