//! Inter-node RPC
//!
//! Members talk to each other with JSON over HTTP. The server side is an axum
//! router sharing the node context through an `Extension`; the client side is
//! [`client::PeerClient`].

pub mod client;
pub mod handlers;
pub mod protocol;


use anyhow::{Context, Result};
use axum::{
    Extension, Router,
    routing::{get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::cluster::node::ClusterNode;
use handlers::*;
use protocol::*;

pub fn router(node: Arc<ClusterNode>) -> Router {
    Router::new()
        .route(ENDPOINT_JOIN, post(handle_join))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .route(ENDPOINT_NOTIFY_MEMBER, post(handle_notify_member))
        .route(ENDPOINT_STORE, post(handle_store))
        .route(&format!("{}/:key", ENDPOINT_RETRIEVE), get(handle_retrieve))
        .route(ENDPOINT_STORAGE_INFO, get(handle_storage_info))
        .route(ENDPOINT_REPLICATED_WRITE, post(handle_replicated_write))
        .layer(Extension(node))
}

/// Binds the first free port at or above `start` on all interfaces.
pub async fn bind_first_free(start: u16) -> Result<TcpListener> {
    let mut port = start;
    loop {
        match TcpListener::bind(("0.0.0.0", port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if port < u16::MAX => {
                tracing::debug!("Port {} unavailable: {}", port, e);
                port += 1;
            }
            Err(e) => return Err(e).context("no free RPC port available"),
        }
    }
}

/// Serves the RPC router on `listener` until the task is aborted.
pub fn spawn_server(listener: TcpListener, node: Arc<ClusterNode>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router(node)).await {
            tracing::error!("RPC server stopped: {}", e);
        }
    })
}
