//! Cluster Node Module
//!
//! Ties membership, storage and RPC together into one node context.
//!
//! ## Submodules
//! - **`node`**: the shared `ClusterNode` context and local record access.
//! - **`replication`**: local persist + push to a bounded replica set.
//! - **`lookup`**: cache -> disk -> known holders -> full fan-out reads.
//! - **`stats`**: counters, the `STATS` report and the background reporters.

pub mod lookup;
pub mod node;
pub mod replication;
pub mod stats;
