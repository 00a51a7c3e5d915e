use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use std::sync::Arc;

use super::protocol::*;
use crate::cluster::node::ClusterNode;
use crate::storage::Key;

pub async fn handle_join(
    Extension(node): Extension<Arc<ClusterNode>>,
    Json(req): Json<JoinRequest>,
) -> (StatusCode, Json<JoinResponse>) {
    if node.registry.is_local(&req.peer) {
        tracing::warn!("Rejected join from own address {}", req.peer);
        return (
            StatusCode::OK,
            Json(JoinResponse {
                accepted: false,
                members: Vec::new(),
            }),
        );
    }

    if node.admit(req.peer.clone()) {
        let announcer = node.clone();
        let newcomer = req.peer.clone();
        tokio::spawn(async move {
            announcer.announce_member(&newcomer).await;
        });
    }

    let members = node
        .registry
        .snapshot()
        .into_iter()
        .map(|peer| peer.id)
        .collect();

    (
        StatusCode::OK,
        Json(JoinResponse {
            accepted: true,
            members,
        }),
    )
}

pub async fn handle_health(
    Extension(node): Extension<Arc<ClusterNode>>,
) -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            alive: true,
            record_count: node.store.file_count(),
        }),
    )
}

pub async fn handle_notify_member(
    Extension(node): Extension<Arc<ClusterNode>>,
    Json(req): Json<NotifyMemberRequest>,
) -> (StatusCode, Json<AckResponse>) {
    node.admit(req.peer);
    (StatusCode::OK, Json(AckResponse { ack: true }))
}

pub async fn handle_store(
    Extension(node): Extension<Arc<ClusterNode>>,
    Json(req): Json<StoreRequest>,
) -> (StatusCode, Json<StoreResponse>) {
    let size = req.payload.len();
    match node.store_local(req.key, req.payload).await {
        Ok(elapsed) => {
            node.stats.record_set(elapsed);
            tracing::info!(
                "[STORE] {} ({} B) disk: {} us",
                req.key,
                size,
                elapsed.as_micros()
            );
            (
                StatusCode::OK,
                Json(StoreResponse {
                    success: true,
                    error: None,
                }),
            )
        }
        Err(e) => {
            tracing::error!("Failed to store key {}: {:#}", req.key, e);
            (
                StatusCode::OK,
                Json(StoreResponse {
                    success: false,
                    error: Some(format!("{:#}", e)),
                }),
            )
        }
    }
}

pub async fn handle_retrieve(
    Extension(node): Extension<Arc<ClusterNode>>,
    Path(key): Path<Key>,
) -> (StatusCode, Json<RetrieveResponse>) {
    match node.read_local(key).await {
        Ok(payload) => (StatusCode::OK, Json(RetrieveResponse { payload })),
        Err(e) => {
            tracing::error!("Failed to read key {}: {:#}", key, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RetrieveResponse { payload: None }),
            )
        }
    }
}

pub async fn handle_storage_info(
    Extension(node): Extension<Arc<ClusterNode>>,
) -> (StatusCode, Json<StorageInfoResponse>) {
    (
        StatusCode::OK,
        Json(StorageInfoResponse {
            total_bytes: node.store.total_bytes(),
        }),
    )
}

pub async fn handle_replicated_write(
    Extension(node): Extension<Arc<ClusterNode>>,
    Json(req): Json<ReplicatedWriteRequest>,
) -> (StatusCode, Json<AckResponse>) {
    let Some((key, payload)) = decode_replicated_write(&req.command) else {
        tracing::warn!("Malformed replicated write: {:?}", req.command);
        return (StatusCode::BAD_REQUEST, Json(AckResponse { ack: false }));
    };

    let size = payload.len();
    match node.store_local(key, payload).await {
        Ok(elapsed) => {
            node.stats.record_set(elapsed);
            tracing::info!(
                "[REPLICATION] SET {} ({} B) -> disk write: {} us",
                key,
                size,
                elapsed.as_micros()
            );
            (StatusCode::OK, Json(AckResponse { ack: true }))
        }
        Err(e) => {
            tracing::error!("Replicated write for key {} failed: {:#}", key, e);
            (StatusCode::OK, Json(AckResponse { ack: false }))
        }
    }
}
