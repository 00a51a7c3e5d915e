//! Membership Module
//!
//! Tracks the peers this node knows about and their liveness.
//!
//! ## Core Mechanisms
//! - **Registry**: a concurrent set of peers keyed by `host:port`, kept in join order.
//! - **Round-robin selection**: a shared cursor hands out alive peers in turn.
//! - **Health monitoring**: a periodic probe demotes unresponsive peers and promotes
//!   dead ones that answer again.

pub mod health;
pub mod registry;
pub mod types;
