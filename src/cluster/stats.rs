//! Node statistics and the periodic background reporters.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::node::ClusterNode;
use crate::config::{
    SIZE_REFRESH_INITIAL_DELAY, SIZE_REFRESH_INTERVAL, STATS_INITIAL_DELAY, STATS_INTERVAL,
};

#[derive(Debug, Default)]
pub struct NodeStats {
    sets: AtomicU64,
    gets: AtomicU64,
    write_micros: AtomicU64,
    read_micros: AtomicU64,
    replications: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub sets: u64,
    pub gets: u64,
    pub write_micros: u64,
    pub read_micros: u64,
    pub replications: u64,
}

impl StatsSnapshot {
    pub fn avg_write_micros(&self) -> Option<u64> {
        (self.sets > 0).then(|| self.write_micros / self.sets)
    }

    pub fn avg_read_micros(&self) -> Option<u64> {
        (self.gets > 0).then(|| self.read_micros / self.gets)
    }
}

impl NodeStats {
    pub fn record_set(&self, write_time: Duration) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.write_micros
            .fetch_add(write_time.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_get(&self, read_time: Duration) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        self.read_micros
            .fetch_add(read_time.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_replications(&self, count: usize) {
        self.replications.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sets: self.sets.load(Ordering::Relaxed),
            gets: self.gets.load(Ordering::Relaxed),
            write_micros: self.write_micros.load(Ordering::Relaxed),
            read_micros: self.read_micros.load(Ordering::Relaxed),
            replications: self.replications.load(Ordering::Relaxed),
        }
    }
}

pub fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.2} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

impl ClusterNode {
    /// Human-readable report, one line per entry.
    pub fn stats_report(&self) -> Vec<String> {
        let stats = self.stats.snapshot();
        let mut lines = vec![
            format!("Node: {} ({})", self.local(), self.role.name()),
            format!("I/O Mode: {}", self.store.mode().name()),
            format!("Data Dir: {}", self.store.data_dir().display()),
            format!(
                "Time: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
            ),
            format!("Uptime: {}s", self.started.elapsed().as_secs()),
            format!("Tolerance: {}", self.config.tolerance),
            format!("Total SET: {}", stats.sets),
            format!("Total GET: {}", stats.gets),
            format!("Successful Replications: {}", stats.replications),
        ];

        if let Some(avg) = stats.avg_write_micros() {
            lines.push(format!("Avg Write Time: {} us", avg));
        }
        if let Some(avg) = stats.avg_read_micros() {
            lines.push(format!("Avg Read Time: {} us", avg));
        }

        lines.push(format!("Files on Disk: {}", self.store.file_count()));
        lines.push(format!("Total Size: {}", format_size(self.store.total_bytes())));
        lines.push(format!("Records in Memory: {}", self.cached_records()));
        lines.push(format!("Tracked Placements: {}", self.placement.len()));

        let members = self.registry.snapshot();
        let alive = members.iter().filter(|peer| peer.is_alive()).count();
        lines.push(format!("Members: {} ({} alive)", members.len(), alive));
        for peer in members {
            let tag = if self.registry.is_local(&peer.id) {
                " (self)".to_string()
            } else {
                match self.peer_size(&peer.id) {
                    Some(size) => format!(" [{}]", format_size(size)),
                    None => String::new(),
                }
            };
            let seen = match peer.last_seen {
                Some(at) if !self.registry.is_local(&peer.id) => {
                    format!(" seen {}s ago", at.elapsed().as_secs())
                }
                _ => String::new(),
            };
            lines.push(format!("  - {} {:?}{}{}", peer.id, peer.state, tag, seen));
        }

        lines
    }

    /// Queries every alive peer for its stored byte count.
    ///
    /// Peers that fail to answer are dropped from the size cache so they are
    /// not favoured on stale data.
    pub async fn refresh_peer_sizes(&self) {
        for peer in self.registry.alive_peers() {
            match self.client.storage_info(&peer.id).await {
                Ok(total_bytes) => self.record_peer_size(peer.id, total_bytes),
                Err(e) => {
                    tracing::debug!("Storage info from {} unavailable: {}", peer.id, e);
                    self.peer_sizes.remove(&peer.id);
                }
            }
        }
    }

    pub fn spawn_stats_reporter(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + STATS_INITIAL_DELAY;
            let mut interval = tokio::time::interval_at(start, STATS_INTERVAL);

            loop {
                interval.tick().await;
                let report = node.stats_report().join("\n  ");
                tracing::info!("Cluster stats:\n  {}", report);
            }
        })
    }

    pub fn spawn_size_refresher(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let node = self.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + SIZE_REFRESH_INITIAL_DELAY;
            let mut interval = tokio::time::interval_at(start, SIZE_REFRESH_INTERVAL);

            loop {
                interval.tick().await;
                node.refresh_peer_sizes().await;
            }
        })
    }
}
