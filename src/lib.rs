//! Self-organizing Replicated Register
//!
//! Nodes find each other without a configuration service, one of them acts as
//! coordinator for client commands, and every record is replicated to a
//! bounded number of peers.
//!
//! ## Architecture Modules
//! - **`storage`**: one-file-per-record durable store with pluggable write strategies.
//! - **`membership`**: the peer registry, round-robin selection and the health monitor.
//! - **`discovery`**: broadcast + wide-area scan for an existing coordinator, and the
//!   beacon a coordinator runs to answer those probes.
//! - **`rpc`**: the JSON-over-HTTP surface members use to talk to each other.
//! - **`cluster`**: the shared node context, replication engine and lookup router.
//! - **`command`**: the line protocol (`SET`/`GET`/`STATS`) served by the coordinator.

pub mod cluster;
pub mod command;
pub mod config;
pub mod discovery;
pub mod membership;
pub mod rpc;
pub mod storage;
