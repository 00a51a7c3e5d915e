//! RPC Client
//!
//! Thin typed wrapper over a shared `reqwest::Client`. Every call carries its own
//! timeout; writes are retried with jittered backoff, probes are not.

use anyhow::{Context, Result};
use std::time::Duration;

use super::protocol::*;
use crate::config::{RPC_CONNECT_TIMEOUT, RPC_TIMEOUT};
use crate::membership::types::PeerId;
use crate::storage::Key;

const WRITE_ATTEMPTS: usize = 2;
const PROBE_ATTEMPTS: usize = 1;

#[derive(Debug, Clone)]
pub struct PeerClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl PeerClient {
    pub fn new() -> Result<Self> {
        Self::with_timeout(RPC_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(RPC_CONNECT_TIMEOUT.min(timeout))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, timeout })
    }

    async fn send_with_retry(
        &self,
        request: reqwest::RequestBuilder,
        attempts: usize,
    ) -> Result<reqwest::Response> {
        let mut delay_ms = 100u64;

        for attempt in 0..attempts {
            let attempt_request = request
                .try_clone()
                .context("request cannot be retried")?
                .timeout(self.timeout);

            match attempt_request.send().await {
                Ok(resp) => return Ok(resp.error_for_status()?),
                Err(e) => {
                    if attempt + 1 == attempts {
                        return Err(anyhow::anyhow!(e));
                    }
                    let jitter = rand::random::<u64>() % 50;
                    tokio::time::sleep(Duration::from_millis(delay_ms + jitter)).await;
                    delay_ms = (delay_ms * 2).min(800);
                }
            }
        }

        Err(anyhow::anyhow!("Retry attempts exhausted"))
    }

    pub async fn join(&self, coordinator: &PeerId, local: &PeerId) -> Result<JoinResponse> {
        let request = self
            .http
            .post(format!("{}{}", coordinator.base_url(), ENDPOINT_JOIN))
            .json(&JoinRequest {
                peer: local.clone(),
            });
        let response = self.send_with_retry(request, WRITE_ATTEMPTS).await?;
        Ok(response.json().await?)
    }

    pub async fn health(&self, peer: &PeerId) -> Result<HealthResponse> {
        let request = self
            .http
            .get(format!("{}{}", peer.base_url(), ENDPOINT_HEALTH));
        let response = self.send_with_retry(request, PROBE_ATTEMPTS).await?;
        let health: HealthResponse = response.json().await?;
        if !health.alive {
            anyhow::bail!("{} reported itself as not alive", peer);
        }
        Ok(health)
    }

    pub async fn notify_member(&self, peer: &PeerId, newcomer: &PeerId) -> Result<()> {
        let request = self
            .http
            .post(format!("{}{}", peer.base_url(), ENDPOINT_NOTIFY_MEMBER))
            .json(&NotifyMemberRequest {
                peer: newcomer.clone(),
            });
        let response = self.send_with_retry(request, WRITE_ATTEMPTS).await?;
        let ack: AckResponse = response.json().await?;
        if !ack.ack {
            anyhow::bail!("{} refused member notification", peer);
        }
        Ok(())
    }

    pub async fn retrieve(&self, peer: &PeerId, key: Key) -> Result<Option<String>> {
        let request = self
            .http
            .get(format!("{}{}/{}", peer.base_url(), ENDPOINT_RETRIEVE, key));
        let response = self.send_with_retry(request, PROBE_ATTEMPTS).await?;
        let result: RetrieveResponse = response.json().await?;
        Ok(result.payload)
    }

    pub async fn storage_info(&self, peer: &PeerId) -> Result<u64> {
        let request = self
            .http
            .get(format!("{}{}", peer.base_url(), ENDPOINT_STORAGE_INFO));
        let response = self.send_with_retry(request, PROBE_ATTEMPTS).await?;
        let info: StorageInfoResponse = response.json().await?;
        Ok(info.total_bytes)
    }

    pub async fn replicated_write(&self, peer: &PeerId, key: Key, payload: &str) -> Result<()> {
        let request = self
            .http
            .post(format!("{}{}", peer.base_url(), ENDPOINT_REPLICATED_WRITE))
            .json(&ReplicatedWriteRequest {
                command: encode_replicated_write(key, payload),
            });
        let response = self.send_with_retry(request, WRITE_ATTEMPTS).await?;
        let ack: AckResponse = response.json().await?;
        if !ack.ack {
            anyhow::bail!("{} rejected replicated write for key {}", peer, key);
        }
        Ok(())
    }
}
