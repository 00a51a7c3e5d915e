//! Replication Engine
//!
//! A write is persisted on the writing node, then pushed to up to `tolerance`
//! peers as `SET:<key>:<value>` replicated-write commands. Peers are chosen by
//! lowest reported storage when size telemetry is available, otherwise
//! round-robin. The acknowledging peers become the key's
//! placement entry.

use anyhow::Result;
use std::time::Duration;
use tokio::task::JoinSet;

use super::node::ClusterNode;
use crate::membership::types::PeerId;
use crate::storage::Key;

/// Result of one replicated write.
#[derive(Debug, Clone)]
pub struct WriteOutcome {
    pub key: Key,
    pub local_write: Duration,
    /// Peers that were asked to hold a copy.
    pub attempted: Vec<PeerId>,
    /// Peers that acknowledged, in selection order.
    pub acknowledged: Vec<PeerId>,
    pub required: usize,
}

impl WriteOutcome {
    pub fn is_success(&self) -> bool {
        self.acknowledged.len() >= self.required
    }
}

impl ClusterNode {
    /// Stores `(key, payload)` locally and on the selected replicas.
    ///
    /// A local I/O failure aborts the write before any peer is contacted.
    /// Peer failures only reduce the acknowledged set; the failing peer is
    /// marked dead.
    pub async fn replicate_write(&self, key: Key, payload: String) -> Result<WriteOutcome> {
        let local_write = self.store_local(key, payload.clone()).await?;
        self.stats.record_set(local_write);

        let targets = self.choose_replicas(self.config.tolerance);
        tracing::debug!("SET {} ({} B) -> replicas {:?}", key, payload.len(), targets);

        let mut pushes = JoinSet::new();
        for (index, peer) in targets.iter().cloned().enumerate() {
            let client = self.client.clone();
            let payload = payload.clone();
            pushes.spawn(async move {
                let result = client.replicated_write(&peer, key, &payload).await;
                (index, peer, result)
            });
        }

        let mut acknowledged = Vec::with_capacity(targets.len());
        while let Some(joined) = pushes.join_next().await {
            match joined {
                Ok((index, peer, Ok(()))) => {
                    tracing::info!(
                        "[REPLICATION] SET {} ({} B) -> {} ok (reported size {} B)",
                        key,
                        payload.len(),
                        peer,
                        self.peer_size(&peer).unwrap_or(0)
                    );
                    acknowledged.push((index, peer));
                }
                Ok((_, peer, Err(e))) => {
                    tracing::warn!("[REPLICATION] SET {} -> {} failed: {}", key, peer, e);
                    self.registry.mark_dead(&peer);
                }
                Err(e) => {
                    tracing::error!("Replication task for key {} panicked: {}", key, e);
                }
            }
        }
        acknowledged.sort_by_key(|(index, _)| *index);
        let acknowledged: Vec<PeerId> = acknowledged.into_iter().map(|(_, peer)| peer).collect();

        if acknowledged.is_empty() {
            self.placement.remove(&key);
        } else {
            tracing::debug!("[PLACEMENT] key {} -> {:?}", key, acknowledged);
            self.placement.insert(key, acknowledged.clone());
        }
        self.stats.record_replications(acknowledged.len());

        Ok(WriteOutcome {
            key,
            local_write,
            attempted: targets,
            acknowledged,
            required: self.config.min_replicas,
        })
    }

    /// Picks up to `tolerance` alive remote peers for a new replica set.
    ///
    /// With size telemetry, the least-loaded peers win (ties keep registry
    /// order, unreported peers count as empty); without it the registry's
    /// round-robin cursor decides.
    pub fn choose_replicas(&self, tolerance: usize) -> Vec<PeerId> {
        if tolerance == 0 {
            return Vec::new();
        }

        if self.peer_sizes.is_empty() {
            return self.registry.select_peers(tolerance);
        }

        let mut candidates = self.registry.alive_peers();
        candidates.sort_by_key(|peer| self.peer_size(&peer.id).unwrap_or(0));
        candidates
            .into_iter()
            .take(tolerance)
            .map(|peer| peer.id)
            .collect()
    }
}
