use anyhow::Result;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinSet;

use super::{PROBE_MESSAGE, REPLY_PREFIX};
use crate::config::{
    BROADCAST_WAIT, NodeConfig, SCAN_CONNECT_TIMEOUT, SCAN_DEADLINE, SCAN_WORKERS,
};
use crate::membership::types::PeerId;

/// Locates a running coordinator, or reports that there is none.
#[derive(Debug, Clone)]
pub struct DiscoveryService {
    pub local_ip: Ipv4Addr,
    pub broadcast_addr: Ipv4Addr,
    pub discovery_port: u16,
    /// Port a coordinator's RPC listener is expected on.
    pub coordinator_port: u16,
    pub broadcast_wait: Duration,
    pub scan_enabled: bool,
    pub scan_connect_timeout: Duration,
    pub scan_workers: usize,
    pub scan_deadline: Duration,
}

impl DiscoveryService {
    pub fn new(local_ip: Ipv4Addr, config: &NodeConfig) -> Self {
        Self {
            local_ip,
            broadcast_addr: Ipv4Addr::BROADCAST,
            discovery_port: config.discovery_port,
            coordinator_port: config.rpc_port,
            broadcast_wait: BROADCAST_WAIT,
            scan_enabled: !config.no_scan,
            scan_connect_timeout: SCAN_CONNECT_TIMEOUT,
            scan_workers: SCAN_WORKERS,
            scan_deadline: SCAN_DEADLINE,
        }
    }

    /// Broadcast first, then the wide-area scan. `None` means this node should
    /// become coordinator.
    pub async fn discover(&self) -> Option<PeerId> {
        match self.broadcast_probe().await {
            Ok(Some(coordinator)) => {
                tracing::info!("Coordinator answered broadcast: {}", coordinator);
                return Some(coordinator);
            }
            Ok(None) => tracing::info!("No answer to broadcast probe"),
            Err(e) => tracing::warn!("Broadcast probe failed: {}", e),
        }

        if !self.scan_enabled {
            return None;
        }

        tracing::info!(
            "Scanning {}.{}.0.0/16 for a coordinator on port {}",
            self.local_ip.octets()[0],
            self.local_ip.octets()[1],
            self.coordinator_port
        );
        self.scan(candidate_addresses(self.local_ip)).await
    }

    /// Sends one probe datagram and waits up to `broadcast_wait` for a reply.
    pub async fn broadcast_probe(&self) -> Result<Option<PeerId>> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.set_broadcast(true)?;
        socket
            .send_to(
                PROBE_MESSAGE.as_bytes(),
                SocketAddr::from((self.broadcast_addr, self.discovery_port)),
            )
            .await?;

        let deadline = tokio::time::Instant::now() + self.broadcast_wait;
        let mut buf = [0u8; 256];

        loop {
            let received = tokio::time::timeout_at(deadline, socket.recv_from(&mut buf)).await;
            let Ok(received) = received else {
                return Ok(None);
            };
            let (len, src) = received?;
            let message = String::from_utf8_lossy(&buf[..len]);
            match parse_announcement(&message, self.coordinator_port) {
                Some(coordinator) => return Ok(Some(coordinator)),
                None => tracing::debug!("Ignoring discovery reply from {}: {:?}", src, message),
            }
        }
    }

    /// Probes `candidates` with a bounded window of concurrent TCP connects.
    ///
    /// The first successful connect wins and aborts every in-flight probe; the
    /// whole scan gives up after `scan_deadline`.
    pub async fn scan(&self, candidates: impl IntoIterator<Item = Ipv4Addr>) -> Option<PeerId> {
        let port = self.coordinator_port;
        let connect_timeout = self.scan_connect_timeout;
        let workers = self.scan_workers.max(1);
        let mut candidates = candidates.into_iter();

        let scan = async {
            let mut probes = JoinSet::new();
            loop {
                while probes.len() < workers {
                    let Some(ip) = candidates.next() else {
                        break;
                    };
                    probes.spawn(async move {
                        let addr = SocketAddr::from((ip, port));
                        match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
                            Ok(Ok(_)) => Some(ip),
                            _ => None,
                        }
                    });
                }

                match probes.join_next().await {
                    Some(Ok(Some(ip))) => {
                        probes.abort_all();
                        return Some(PeerId::new(ip.to_string(), port));
                    }
                    Some(_) => continue,
                    None => return None,
                }
            }
        };

        match tokio::time::timeout(self.scan_deadline, scan).await {
            Ok(Some(found)) => {
                tracing::info!("Coordinator found by scan: {}", found);
                Some(found)
            }
            Ok(None) => None,
            Err(_) => {
                tracing::info!("Scan deadline reached without finding a coordinator");
                None
            }
        }
    }
}

/// Every `a.b.x.y` sharing the first two octets of `local`, hosts 1..=254,
/// excluding `local` itself.
pub fn candidate_addresses(local: Ipv4Addr) -> impl Iterator<Item = Ipv4Addr> {
    let [a, b, _, _] = local.octets();
    (0..=255u8)
        .flat_map(move |subnet| (1..=254u8).map(move |host| Ipv4Addr::new(a, b, subnet, host)))
        .filter(move |candidate| *candidate != local)
}

/// Parses `LEADER_HERE:<host>[:<port>]`; a bare host gets `default_port`.
pub fn parse_announcement(message: &str, default_port: u16) -> Option<PeerId> {
    let address = message.trim().strip_prefix(REPLY_PREFIX)?;
    if address.is_empty() {
        return None;
    }
    parse_coordinator_address(address, default_port)
}

/// Accepts `host` or `host:port`.
pub fn parse_coordinator_address(address: &str, default_port: u16) -> Option<PeerId> {
    let address = address.trim();
    if address.is_empty() {
        return None;
    }
    match address.parse::<PeerId>() {
        Ok(peer) => Some(peer),
        Err(_) if !address.contains(':') => Some(PeerId::new(address, default_port)),
        Err(_) => None,
    }
}
