//! Lookup Router
//!
//! Reads cascade from the cheapest source to the most expensive one:
//! local cache, local disk, the peers recorded in the placement entry, and
//! finally every alive peer. A miss everywhere is `Ok(None)`, never an error.

use anyhow::Result;
use std::collections::HashSet;
use std::time::Instant;

use super::node::ClusterNode;
use crate::membership::types::PeerId;
use crate::storage::Key;

impl ClusterNode {
    pub async fn lookup(&self, key: Key) -> Result<Option<String>> {
        let started = Instant::now();
        let found = self.lookup_inner(key).await;
        self.stats.record_get(started.elapsed());
        found
    }

    async fn lookup_inner(&self, key: Key) -> Result<Option<String>> {
        if let Some(value) = self.read_local(key).await? {
            tracing::debug!("GET {} served locally", key);
            return Ok(Some(value));
        }

        let mut probed: HashSet<PeerId> = HashSet::new();

        if let Some(holders) = self.placement_of(key) {
            tracing::debug!("GET {} known holders: {:?}", key, holders);
            for holder in holders {
                if !self.is_reachable_target(&holder) {
                    continue;
                }
                probed.insert(holder.clone());
                if let Some(value) = self.fetch_from(&holder, key).await {
                    return Ok(Some(value));
                }
            }
        }

        for peer in self.registry.alive_peers() {
            if probed.contains(&peer.id) {
                continue;
            }
            if let Some(value) = self.fetch_from(&peer.id, key).await {
                return Ok(Some(value));
            }
        }

        tracing::debug!("GET {} not found anywhere", key);
        Ok(None)
    }

    fn is_reachable_target(&self, peer: &PeerId) -> bool {
        !self.registry.is_local(peer)
            && self
                .registry
                .get(peer)
                .map(|member| member.is_alive())
                .unwrap_or(false)
    }

    /// Asks one peer for its local copy. Unreachable peers are marked dead.
    async fn fetch_from(&self, peer: &PeerId, key: Key) -> Option<String> {
        match self.client.retrieve(peer, key).await {
            Ok(Some(value)) => {
                tracing::debug!("GET {} found on {}", key, peer);
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!("GET {} from {} failed: {}", key, peer, e);
                self.registry.mark_dead(peer);
                None
            }
        }
    }
}
