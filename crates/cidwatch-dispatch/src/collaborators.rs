//! Downstream services called for each identifier.
//!
//! Both collaborators report failure in their response rather than as an
//! `Err`: a request that never got a response has `status == 0` and an
//! `error` describing why. The fan-out records whatever comes back.

use std::time::Duration;

use async_trait::async_trait;
use cidwatch_core::Identifier;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use crate::preview;

/// Characters of an error body kept in an outcome.
const ERROR_BODY_CHARS: usize = 300;

const USER_AGENT: &str = concat!("cidwatch/", env!("CARGO_PKG_VERSION"));

/// Result of one pin request.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PinResponse {
    /// HTTP status, `0` when no response arrived.
    pub status: u16,
    /// Decoded JSON body, when there was one.
    pub body: Option<Value>,
    /// Failure description.
    pub error: Option<String>,
}

/// Result of one gateway fetch.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status, `0` when no response arrived.
    pub status: u16,
    /// Body bytes read before stopping.
    pub size_bytes: u64,
    /// Failure description.
    pub error: Option<String>,
}

/// Submits pin requests to a storage-pinning service.
#[async_trait]
pub trait PinService: Send + Sync {
    /// Ask the service to pin `cid`.
    async fn pin(&self, cid: &Identifier, credential: &str, timeout: Duration) -> PinResponse;

    /// Where pins go, for outcome records.
    fn endpoint(&self) -> &str;
}

/// Times a GET against a gateway URL, discarding the body.
#[async_trait]
pub trait GatewayFetcher: Send + Sync {
    /// Fetch `url`, counting body bytes.
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResponse;
}

// ─────────────────────────────────────────────────────────────────────────────
// Pinata
// ─────────────────────────────────────────────────────────────────────────────

/// Pin-by-CID client backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct PinataClient {
    client: reqwest::Client,
    endpoint: String,
}

impl PinataClient {
    /// Client posting to `endpoint`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl PinService for PinataClient {
    async fn pin(&self, cid: &Identifier, credential: &str, timeout: Duration) -> PinResponse {
        let result = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&serde_json::json!({ "cid": cid }))
            .timeout(timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return PinResponse {
                    status: 0,
                    body: None,
                    error: Some(format!("pin request failed: {e}")),
                };
            }
        };

        let status = response.status();
        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => {
                return PinResponse {
                    status: status.as_u16(),
                    body: None,
                    error: Some(format!("failed to read pin response: {e}")),
                };
            }
        };
        let body = serde_json::from_str::<Value>(&text).ok();
        let error = (!status.is_success()).then(|| preview(&text, ERROR_BODY_CHARS));
        debug!(cid = %cid, status = status.as_u16(), "pin response");

        PinResponse {
            status: status.as_u16(),
            body,
            error,
        }
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateways
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway fetcher backed by `reqwest`; stops reading after `max_bytes`.
#[derive(Clone, Debug)]
pub struct ReqwestGatewayFetcher {
    client: reqwest::Client,
    max_bytes: u64,
}

impl ReqwestGatewayFetcher {
    /// Fetcher with a body read cap.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(USER_AGENT)
                .build()
                .unwrap_or_default(),
            max_bytes,
        }
    }
}

#[async_trait]
impl GatewayFetcher for ReqwestGatewayFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> FetchResponse {
        let result = self
            .client
            .get(url)
            .header(
                reqwest::header::ACCEPT,
                "image/*,application/octet-stream;q=0.9,*/*;q=0.8",
            )
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .header(reqwest::header::PRAGMA, "no-cache")
            .timeout(timeout)
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                return FetchResponse {
                    status: 0,
                    size_bytes: 0,
                    error: Some(format!("request failed: {e}")),
                };
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return FetchResponse {
                status: status.as_u16(),
                size_bytes: 0,
                error: Some(preview(&body, ERROR_BODY_CHARS)),
            };
        }

        let mut size_bytes: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(chunk) => {
                    size_bytes = size_bytes.saturating_add(chunk.len() as u64);
                    if size_bytes >= self.max_bytes {
                        debug!(url, size_bytes, "read cap reached");
                        break;
                    }
                }
                Err(e) => {
                    return FetchResponse {
                        status: status.as_u16(),
                        size_bytes,
                        error: Some(format!("body read failed: {e}")),
                    };
                }
            }
        }

        FetchResponse {
            status: status.as_u16(),
            size_bytes,
            error: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
