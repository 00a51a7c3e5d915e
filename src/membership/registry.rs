use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use super::types::{Peer, PeerId, PeerState};

/// In-memory set of known peers with liveness flags.
///
/// Safe to share across tasks: the peer map is a `DashMap` and every read
/// hands out cloned snapshots, so concurrent mutation never disturbs a caller
/// that is iterating.
pub struct MembershipRegistry {
    local: PeerId,
    members: DashMap<PeerId, Peer>,
    next_order: AtomicU64,
    // Round-robin position among alive non-local peers.
    cursor: Mutex<usize>,
}

impl MembershipRegistry {
    pub fn new(local: PeerId) -> Arc<Self> {
        let registry = Self {
            local: local.clone(),
            members: DashMap::new(),
            next_order: AtomicU64::new(0),
            cursor: Mutex::new(0),
        };
        registry.add(local);
        Arc::new(registry)
    }

    pub fn local(&self) -> &PeerId {
        &self.local
    }

    pub fn is_local(&self, id: &PeerId) -> bool {
        id == &self.local
    }

    /// Adds a peer as alive. Returns `false` when the identity was already known,
    /// in which case its state is left untouched.
    pub fn add(&self, id: PeerId) -> bool {
        match self.members.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                let peer = Peer {
                    id: slot.key().clone(),
                    state: PeerState::Alive,
                    order: self.next_order.fetch_add(1, Ordering::SeqCst),
                    last_seen: Some(Instant::now()),
                };
                tracing::debug!("Registered peer {}", peer.id);
                slot.insert(peer);
                true
            }
        }
    }

    pub fn add_all(&self, ids: impl IntoIterator<Item = PeerId>) -> usize {
        ids.into_iter().filter(|id| self.add(id.clone())).count()
    }

    pub fn remove(&self, id: &PeerId) -> bool {
        if self.is_local(id) {
            return false;
        }
        self.members.remove(id).is_some()
    }

    /// Flags a peer as dead. Returns `true` only on an Alive -> Dead transition.
    pub fn mark_dead(&self, id: &PeerId) -> bool {
        if self.is_local(id) {
            return false;
        }
        match self.members.get_mut(id) {
            Some(mut peer) if peer.state == PeerState::Alive => {
                peer.state = PeerState::Dead;
                tracing::warn!("Peer {} marked dead", id);
                true
            }
            _ => false,
        }
    }

    /// Records a successful contact. A dead peer is promoted back to alive.
    pub fn mark_alive(&self, id: &PeerId) -> bool {
        match self.members.get_mut(id) {
            Some(mut peer) => {
                peer.last_seen = Some(Instant::now());
                if peer.state == PeerState::Dead {
                    peer.state = PeerState::Alive;
                    tracing::info!("Peer {} is alive again", id);
                    return true;
                }
                false
            }
            None => false,
        }
    }

    pub fn get(&self, id: &PeerId) -> Option<Peer> {
        self.members.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &PeerId) -> bool {
        self.members.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Point-in-time copy of every known peer (local node included) in registry order.
    pub fn snapshot(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self
            .members
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        peers.sort_by_key(|peer| peer.order);
        peers
    }

    /// Every known peer except the local node, in registry order.
    pub fn remote_peers(&self) -> Vec<Peer> {
        self.snapshot()
            .into_iter()
            .filter(|peer| !self.is_local(&peer.id))
            .collect()
    }

    /// Alive peers except the local node, in registry order.
    pub fn alive_peers(&self) -> Vec<Peer> {
        self.remote_peers()
            .into_iter()
            .filter(|peer| peer.is_alive())
            .collect()
    }

    /// Picks up to `n` alive remote peers round-robin.
    ///
    /// The cursor advances by the number of peers returned and wraps modulo the
    /// alive-set size, so consecutive calls cycle through the registry order.
    pub fn select_peers(&self, n: usize) -> Vec<PeerId> {
        if n == 0 {
            return Vec::new();
        }

        let mut cursor = self.cursor.lock();
        let alive = self.alive_peers();
        if alive.is_empty() {
            return Vec::new();
        }

        let count = n.min(alive.len());
        let start = *cursor % alive.len();
        let selected = (0..count)
            .map(|offset| alive[(start + offset) % alive.len()].id.clone())
            .collect();

        *cursor = (start + count) % alive.len();
        selected
    }
}
