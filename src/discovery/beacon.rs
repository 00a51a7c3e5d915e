use anyhow::{Context, Result};
use std::net::SocketAddr;
use tokio::net::UdpSocket;

use super::{PROBE_MESSAGE, REPLY_PREFIX};
use crate::membership::types::PeerId;

/// Answers discovery probes on behalf of the coordinator.
pub struct CoordinatorBeacon {
    socket: UdpSocket,
    address: PeerId,
}

impl CoordinatorBeacon {
    pub async fn bind(addr: SocketAddr, address: PeerId) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .with_context(|| format!("failed to bind discovery port {}", addr))?;
        socket.set_broadcast(true)?;
        tracing::info!("UDP discovery: listening on {}", addr);
        Ok(Self { socket, address })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub fn announcement(&self) -> String {
        format!("{}{}", REPLY_PREFIX, self.address)
    }

    pub async fn run(self) {
        let mut buf = [0u8; 256];
        let reply = self.announcement();

        loop {
            match self.socket.recv_from(&mut buf).await {
                Ok((len, src)) => {
                    if &buf[..len] != PROBE_MESSAGE.as_bytes() {
                        tracing::trace!("Ignoring datagram from {}", src);
                        continue;
                    }
                    match self.socket.send_to(reply.as_bytes(), src).await {
                        Ok(_) => tracing::info!("[UDP] Answered coordinator search from {}", src),
                        Err(e) => tracing::warn!("[UDP] Failed to answer {}: {}", src, e),
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to receive discovery datagram: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
                }
            }
        }
    }
}
