//! Node configuration.
//!
//! Command-line flags are parsed once at startup into a [`NodeConfig`]; the
//! timing constants below are shared by the background tasks and the
//! discovery probes.

use clap::Parser;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use crate::storage::disk::IoMode;

pub const DEFAULT_RPC_PORT: u16 = 5555;
pub const DEFAULT_COMMAND_PORT: u16 = 6666;
pub const DEFAULT_DISCOVERY_PORT: u16 = 5554;

pub const BROADCAST_WAIT: Duration = Duration::from_secs(2);
pub const SCAN_CONNECT_TIMEOUT: Duration = Duration::from_millis(200);
pub const SCAN_WORKERS: usize = 100;
pub const SCAN_DEADLINE: Duration = Duration::from_secs(5);

pub const RPC_TIMEOUT: Duration = Duration::from_secs(2);
pub const RPC_CONNECT_TIMEOUT: Duration = Duration::from_millis(500);

pub const HEALTH_INITIAL_DELAY: Duration = Duration::from_secs(5);
pub const HEALTH_INTERVAL: Duration = Duration::from_secs(10);
pub const STATS_INITIAL_DELAY: Duration = Duration::from_secs(3);
pub const STATS_INTERVAL: Duration = Duration::from_secs(10);
pub const SIZE_REFRESH_INITIAL_DELAY: Duration = Duration::from_secs(2);
pub const SIZE_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug, Clone)]
#[command(name = "disk-register")]
#[command(about = "Replicated key/value register node with automatic coordinator discovery")]
pub struct NodeConfig {
    /// Disk write strategy
    #[arg(long, value_enum, default_value = "classic")]
    pub mode: IoMode,

    /// Number of peers each write is replicated to
    #[arg(long, default_value = "1")]
    pub tolerance: usize,

    /// Acknowledged remote copies required before a SET reports OK
    #[arg(long, default_value = "0")]
    pub min_replicas: usize,

    /// Coordinator address (`host` or `host:port`); skips discovery
    #[arg(long)]
    pub leader: Option<String>,

    /// Advertised IPv4 address (detected when omitted)
    #[arg(long)]
    pub host: Option<Ipv4Addr>,

    /// Base port for the inter-node RPC listener
    #[arg(long, default_value_t = DEFAULT_RPC_PORT)]
    pub rpc_port: u16,

    /// Line-protocol port opened by the coordinator
    #[arg(long, default_value_t = DEFAULT_COMMAND_PORT)]
    pub command_port: u16,

    /// UDP port used for coordinator discovery
    #[arg(long, default_value_t = DEFAULT_DISCOVERY_PORT)]
    pub discovery_port: u16,

    /// Skip the wide-area TCP scan when broadcast discovery fails
    #[arg(long)]
    pub no_scan: bool,

    /// Directory under which the per-node data directory is created
    #[arg(long, default_value = ".")]
    pub data_root: PathBuf,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl NodeConfig {
    /// Per-node data directory, named after the advertised address.
    pub fn data_dir(&self, host: &str, port: u16) -> PathBuf {
        self.data_root
            .join(format!("data_{}_{}", host.replace('.', "_"), port))
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            mode: IoMode::Classic,
            tolerance: 1,
            min_replicas: 0,
            leader: None,
            host: None,
            rpc_port: DEFAULT_RPC_PORT,
            command_port: DEFAULT_COMMAND_PORT,
            discovery_port: DEFAULT_DISCOVERY_PORT,
            no_scan: false,
            data_root: PathBuf::from("."),
            verbose: false,
        }
    }
}
