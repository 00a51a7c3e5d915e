//! Inter-node RPC Protocol
//!
//! Defines the API endpoints and Data Transfer Objects (DTOs) exchanged between
//! cluster members. Every call is a JSON request/response over HTTP.

use serde::{Deserialize, Serialize};

use crate::membership::types::PeerId;
use crate::storage::Key;

// --- API Endpoints ---

/// A follower announces itself to the coordinator.
pub const ENDPOINT_JOIN: &str = "/join";
/// Lightweight liveness probe.
pub const ENDPOINT_HEALTH: &str = "/health";
/// The coordinator tells existing members about a newcomer.
pub const ENDPOINT_NOTIFY_MEMBER: &str = "/notify_member";
/// Direct write of one record on the receiving node.
pub const ENDPOINT_STORE: &str = "/store";
/// Local-only read of one record (`/retrieve/:key`).
pub const ENDPOINT_RETRIEVE: &str = "/retrieve";
/// Total bytes persisted by the receiving node.
pub const ENDPOINT_STORAGE_INFO: &str = "/storage_info";
/// Write carried as an encoded `SET:<key>:<value>` command.
pub const ENDPOINT_REPLICATED_WRITE: &str = "/replicated_write";

// --- Data Transfer Objects ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinRequest {
    pub peer: PeerId,
}

/// Reply to a join: the coordinator's member list at the time of joining.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinResponse {
    pub accepted: bool,
    pub members: Vec<PeerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub alive: bool,
    /// Records currently persisted by the responder.
    pub record_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyMemberRequest {
    pub peer: PeerId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub ack: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreRequest {
    pub key: Key,
    pub payload: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreResponse {
    pub success: bool,
    /// Failure reason; `None` on success.
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrieveResponse {
    /// `None` when the responder holds no copy of the key.
    pub payload: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfoResponse {
    pub total_bytes: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatedWriteRequest {
    pub command: String,
}

/// Encodes a write as carried by [`ReplicatedWriteRequest`].
pub fn encode_replicated_write(key: Key, payload: &str) -> String {
    format!("SET:{}:{}", key, payload)
}

/// Decodes `SET:<key>:<value>`; the value may itself contain `:`.
pub fn decode_replicated_write(command: &str) -> Option<(Key, String)> {
    let rest = command.strip_prefix("SET:")?;
    let (key, payload) = rest.split_once(':')?;
    let key = key.parse().ok()?;
    Some((key, payload.to_string()))
}
