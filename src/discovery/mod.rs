//! Coordinator Discovery Module
//!
//! A starting node looks for an existing coordinator before deciding its role.
//!
//! ## Phases
//! 1. **Broadcast**: a `LEADER_SEARCH` datagram goes to the subnet broadcast
//!    address; a coordinator answers `LEADER_HERE:<address>`.
//! 2. **Wide-area scan**: every address sharing the first two octets is probed
//!    with a short TCP connect on the coordinator RPC port. The first connect
//!    wins and cancels the rest.
//!
//! When both phases come back empty the node becomes the coordinator and runs a
//! [`beacon::CoordinatorBeacon`] to answer later probes.

pub mod beacon;
pub mod service;

#[cfg(test)]
mod tests;

use std::net::{IpAddr, Ipv4Addr};
use tokio::net::UdpSocket;

pub const PROBE_MESSAGE: &str = "LEADER_SEARCH";
pub const REPLY_PREFIX: &str = "LEADER_HERE:";

/// Best-effort detection of the non-loopback IPv4 address used for outbound traffic.
///
/// Connecting a UDP socket sends nothing; it only makes the OS pick a route.
pub async fn detect_local_ipv4() -> Ipv4Addr {
    let detected = async {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
        socket.connect(("8.8.8.8", 80)).await?;
        socket.local_addr()
    }
    .await;

    match detected {
        Ok(addr) => match addr.ip() {
            IpAddr::V4(ip) if !ip.is_loopback() && !ip.is_unspecified() => ip,
            _ => Ipv4Addr::LOCALHOST,
        },
        Err(e) => {
            tracing::warn!("Could not detect local address, using loopback: {}", e);
            Ipv4Addr::LOCALHOST
        }
    }
}
