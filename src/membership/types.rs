use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Instant;

/// Identity of a cluster member: the address its RPC listener is bound to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId {
    pub host: String,
    pub port: u16,
}

impl PeerId {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Base URL of the peer's RPC listener.
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for PeerId {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (host, port) = s
            .trim()
            .rsplit_once(':')
            .with_context(|| format!("missing port in peer address '{}'", s))?;
        if host.is_empty() {
            anyhow::bail!("missing host in peer address '{}'", s);
        }
        let port = port
            .parse()
            .with_context(|| format!("invalid port in peer address '{}'", s))?;
        Ok(Self::new(host, port))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PeerState {
    Alive,
    Dead,
}

/// A known member of the cluster.
///
/// `order` is the registry insertion sequence and defines the stable
/// iteration order used for round-robin selection and fan-out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub state: PeerState,

    #[serde(skip)]
    pub order: u64,
    #[serde(skip)]
    pub last_seen: Option<Instant>,
}

impl Peer {
    pub fn is_alive(&self) -> bool {
        self.state == PeerState::Alive
    }
}
