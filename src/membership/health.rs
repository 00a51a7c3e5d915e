//! Health Monitor
//!
//! Probes every known peer on a fixed interval. A failed probe (timeout,
//! connection error or error reply) marks the peer dead; a dead peer that
//! answers again is promoted back to alive.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use super::registry::MembershipRegistry;
use crate::config::{HEALTH_INITIAL_DELAY, HEALTH_INTERVAL};
use crate::rpc::client::PeerClient;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProbeSummary {
    pub alive: usize,
    pub dead: usize,
}

pub struct HealthMonitor {
    registry: Arc<MembershipRegistry>,
    client: PeerClient,
    initial_delay: Duration,
    interval: Duration,
}

impl HealthMonitor {
    pub fn new(registry: Arc<MembershipRegistry>, client: PeerClient) -> Self {
        Self {
            registry,
            client,
            initial_delay: HEALTH_INITIAL_DELAY,
            interval: HEALTH_INTERVAL,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.initial_delay;
            let mut interval = tokio::time::interval_at(start, self.interval);

            loop {
                interval.tick().await;
                let summary = self.probe_all().await;
                tracing::debug!(
                    "Health round: {} alive, {} dead",
                    summary.alive,
                    summary.dead
                );
            }
        })
    }

    /// Runs one probe round against every remote peer, dead ones included.
    pub async fn probe_all(&self) -> ProbeSummary {
        let mut probes = JoinSet::new();
        for peer in self.registry.remote_peers() {
            let client = self.client.clone();
            probes.spawn(async move {
                let result = client.health(&peer.id).await;
                (peer.id, result)
            });
        }

        let mut summary = ProbeSummary::default();
        while let Some(joined) = probes.join_next().await {
            let Ok((peer, result)) = joined else {
                continue;
            };
            match result {
                Ok(health) => {
                    tracing::trace!("{} healthy ({} records)", peer, health.record_count);
                    self.registry.mark_alive(&peer);
                    summary.alive += 1;
                }
                Err(e) => {
                    if self.registry.mark_dead(&peer) {
                        tracing::warn!("Peer {} unreachable: {}", peer, e);
                    }
                    summary.dead += 1;
                }
            }
        }
        summary
    }
}
