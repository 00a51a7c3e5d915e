use anyhow::{Context, Result};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::stats::NodeStats;
use crate::config::NodeConfig;
use crate::membership::registry::MembershipRegistry;
use crate::membership::types::PeerId;
use crate::rpc::client::PeerClient;
use crate::storage::Key;
use crate::storage::disk::DiskStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Answers discovery probes and serves the line protocol.
    Coordinator,
    Follower,
}

impl Role {
    pub fn name(&self) -> &'static str {
        match self {
            Role::Coordinator => "COORDINATOR",
            Role::Follower => "FOLLOWER",
        }
    }
}

/// Shared state of one cluster member, created once at startup.
pub struct ClusterNode {
    pub config: NodeConfig,
    pub role: Role,
    pub registry: Arc<MembershipRegistry>,
    pub store: DiskStore,
    pub client: PeerClient,
    pub stats: NodeStats,
    /// Mirror of records persisted on this node.
    pub(crate) cache: Arc<DashMap<Key, String>>,
    /// Peers that acknowledged a replica of each key written through this node.
    pub(crate) placement: DashMap<Key, Vec<PeerId>>,
    /// Last reported `total_bytes` per peer, refreshed in the background.
    pub(crate) peer_sizes: DashMap<PeerId, u64>,
    pub(crate) started: Instant,
}

impl ClusterNode {
    pub fn new(
        config: NodeConfig,
        local: PeerId,
        role: Role,
        store: DiskStore,
        client: PeerClient,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            role,
            registry: MembershipRegistry::new(local),
            store,
            client,
            stats: NodeStats::default(),
            cache: Arc::new(DashMap::new()),
            placement: DashMap::new(),
            peer_sizes: DashMap::new(),
            started: Instant::now(),
        })
    }

    pub fn local(&self) -> &PeerId {
        self.registry.local()
    }

    pub fn is_coordinator(&self) -> bool {
        self.role == Role::Coordinator
    }

    /// Persists a record on this node and refreshes the cache.
    ///
    /// The cache entry is replaced while the record is still locked, so
    /// concurrent writes of one key leave cache and disk agreeing.
    pub async fn store_local(&self, key: Key, payload: String) -> Result<Duration> {
        let store = self.store.clone();
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            store.write_then(key, &payload, || {
                cache.insert(key, payload.clone());
            })
        })
        .await
        .context("disk write task failed")?
    }

    /// Reads a record held by this node: cache first, then disk.
    pub async fn read_local(&self, key: Key) -> Result<Option<String>> {
        if let Some(value) = self.cache.get(&key) {
            return Ok(Some(value.clone()));
        }

        let store = self.store.clone();
        let cache = self.cache.clone();
        tokio::task::spawn_blocking(move || {
            store.read_then(key, |value| {
                cache.insert(key, value.to_string());
            })
        })
        .await
        .context("disk read task failed")?
    }

    pub fn cached_records(&self) -> usize {
        self.cache.len()
    }

    /// Peers recorded as holding `key`, if this node wrote it.
    pub fn placement_of(&self, key: Key) -> Option<Vec<PeerId>> {
        self.placement.get(&key).map(|entry| entry.value().clone())
    }

    pub fn peer_size(&self, peer: &PeerId) -> Option<u64> {
        self.peer_sizes.get(peer).map(|entry| *entry.value())
    }

    pub fn record_peer_size(&self, peer: PeerId, total_bytes: u64) {
        self.peer_sizes.insert(peer, total_bytes);
    }

    /// Registers with the coordinator and adopts its member list.
    pub async fn join_cluster(&self, coordinator: &PeerId) -> Result<usize> {
        let response = self
            .client
            .join(coordinator, self.local())
            .await
            .with_context(|| format!("join via {} failed", coordinator))?;

        if !response.accepted {
            anyhow::bail!("{} refused the join request", coordinator);
        }

        let added = self.registry.add_all(response.members);
        tracing::info!(
            "Joined cluster via {}: {} new member(s), {} known",
            coordinator,
            added,
            self.registry.len()
        );
        Ok(added)
    }

    /// Accepts a newcomer (or a returning peer) into the registry.
    pub fn admit(&self, peer: PeerId) -> bool {
        if self.registry.is_local(&peer) {
            return false;
        }
        if !self.registry.add(peer.clone()) {
            self.registry.mark_alive(&peer);
            return false;
        }
        tracing::info!(
            "New member {} (cluster size now {})",
            peer,
            self.registry.len()
        );
        true
    }

    /// Tells every other alive member about `newcomer`.
    pub async fn announce_member(&self, newcomer: &PeerId) {
        for peer in self.registry.alive_peers() {
            if &peer.id == newcomer {
                continue;
            }
            if let Err(e) = self.client.notify_member(&peer.id, newcomer).await {
                tracing::warn!("Failed to notify {} about {}: {}", peer.id, newcomer, e);
                self.registry.mark_dead(&peer.id);
            }
        }
    }
}
