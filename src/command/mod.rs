//! Client Command Interface
//!
//! Line-oriented protocol served by the coordinator: one command per line,
//! one reply per command (`STATS` replies span several lines ending in `END`).

pub mod parser;
pub mod server;

#[cfg(test)]
mod tests;
