//! Durable Storage Module
//!
//! One file per record under a per-node data directory, written with one of
//! three strategies chosen at startup (see [`disk::IoMode`]).

pub mod disk;


/// Record key as used by the line protocol and the RPC surface.
pub type Key = i32;
