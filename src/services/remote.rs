//! Remote Data Client
//!
//! Thin, memoized wrapper around reqwest for the WoRMS and Marine Regions
//! REST services. Every GET is classified into one of three outcomes:
//!
//! - **Success**: HTTP 200, body returned
//! - **Empty**: HTTP 204, the service explicitly has nothing for this query
//! - **Error**: anything else (logged with the response body)
//!
//! HTTP 429 is retried exactly once after a fixed backoff. The memo sits
//! below that policy: only Success and Empty are remembered, so a
//! rate-limited or failed URL is tried again on the next call.

use bytes::Bytes;
use dashmap::DashMap;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the remote data client
#[derive(Debug, Clone)]
pub struct RemoteClientConfig {
    /// Timeout applied to every outbound request (default: 30 seconds)
    pub request_timeout: Duration,
    /// Wait before the single retry after HTTP 429 (default: 2 seconds)
    pub rate_limit_backoff: Duration,
    pub user_agent: String,
}

impl Default for RemoteClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            rate_limit_backoff: Duration::from_secs(2),
            user_agent: format!("invasive-checker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Transport-level failure talking to an upstream service
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16, body: String },

    #[error("Request to {url} failed: {reason}")]
    Network { url: String, reason: String },

    #[error("Failed to read body from {url}: {reason}")]
    Body { url: String, reason: String },

    #[error("Malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// Classified result of a GET
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    Success(Bytes),
    Empty,
    Error(TransportError),
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Decode a Success body as JSON. Empty maps to `None`.
    pub fn json<T: DeserializeOwned>(self, url: &str) -> Result<Option<T>, TransportError> {
        match self {
            FetchOutcome::Success(body) => serde_json::from_slice(&body)
                .map(Some)
                .map_err(|e| TransportError::Malformed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }),
            FetchOutcome::Empty => Ok(None),
            FetchOutcome::Error(e) => Err(e),
        }
    }
}

#[derive(Debug, Default)]
struct ClientStats {
    requests: AtomicU64,
    memo_hits: AtomicU64,
    rate_limited: AtomicU64,
}

/// Snapshot of client counters
#[derive(Debug, Clone, Serialize)]
pub struct RemoteClientStats {
    /// Requests that actually went over the network (retries included)
    pub requests: u64,
    pub memo_hits: u64,
    pub rate_limited: u64,
    pub memo_entries: usize,
}

/// Memoizing HTTP client shared by all resolvers
pub struct RemoteClient {
    http_client: reqwest::Client,
    config: RemoteClientConfig,
    memo: DashMap<String, FetchOutcome>,
    stats: ClientStats,
}

impl RemoteClient {
    pub fn new(config: RemoteClientConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            config,
            memo: DashMap::new(),
            stats: ClientStats::default(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(RemoteClientConfig::default())
    }

    pub fn config(&self) -> &RemoteClientConfig {
        &self.config
    }

    /// GET with memoization. Identical URLs hit the network once per process
    /// unless the memo is cleared or the first attempt failed.
    pub async fn fetch(&self, url: &str) -> FetchOutcome {
        if let Some(hit) = self.memo.get(url) {
            self.stats.memo_hits.fetch_add(1, Ordering::Relaxed);
            debug!(url = %url, "Remote fetch served from memo");
            return hit.clone();
        }

        let outcome = self.fetch_fresh(url).await;
        if !matches!(outcome, FetchOutcome::Error(_)) {
            self.memo.insert(url.to_string(), outcome.clone());
        }
        outcome
    }

    /// GET without consulting or filling the memo. Used by layers that keep
    /// their own expiring cache.
    pub async fn fetch_fresh(&self, url: &str) -> FetchOutcome {
        let mut attempt = self.send(url).await;

        if matches!(attempt, Ok((StatusCode::TOO_MANY_REQUESTS, _))) {
            self.stats.rate_limited.fetch_add(1, Ordering::Relaxed);
            warn!(
                url = %url,
                backoff_ms = self.config.rate_limit_backoff.as_millis() as u64,
                "Rate limited by upstream, retrying once"
            );
            tokio::time::sleep(self.config.rate_limit_backoff).await;
            attempt = self.send(url).await;
        }

        match attempt {
            Ok((status, body)) => classify(url, status, body),
            Err(e) => {
                warn!(url = %url, error = %e, "Remote fetch failed");
                FetchOutcome::Error(e)
            }
        }
    }

    /// Memoized GET decoded as JSON. A body that fails to decode is dropped
    /// from the memo so the next call goes back to the network.
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, TransportError> {
        let decoded = self.fetch(url).await.json(url);
        if matches!(decoded, Err(TransportError::Malformed { .. })) {
            self.memo.remove(url);
        }
        decoded
    }

    /// Un-memoized GET decoded as JSON
    pub async fn fetch_json_fresh<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> Result<Option<T>, TransportError> {
        self.fetch_fresh(url).await.json(url)
    }

    /// Drop every memoized response, returning how many were held
    pub fn clear_memo(&self) -> usize {
        let count = self.memo.len();
        self.memo.clear();
        count
    }

    pub fn stats(&self) -> RemoteClientStats {
        RemoteClientStats {
            requests: self.stats.requests.load(Ordering::Relaxed),
            memo_hits: self.stats.memo_hits.load(Ordering::Relaxed),
            rate_limited: self.stats.rate_limited.load(Ordering::Relaxed),
            memo_entries: self.memo.len(),
        }
    }

    async fn send(&self, url: &str) -> Result<(StatusCode, Bytes), TransportError> {
        self.stats.requests.fetch_add(1, Ordering::Relaxed);
        debug!(url = %url, "GET");

        let response = self
            .http_client
            .get(url)
            .header("Accept", "application/json, application/ld+json")
            .send()
            .await
            .map_err(|e| TransportError::Network {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| TransportError::Body {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Ok((status, body))
    }
}

impl Default for RemoteClient {
    fn default() -> Self {
        Self::with_defaults()
    }
}

fn classify(url: &str, status: StatusCode, body: Bytes) -> FetchOutcome {
    match status {
        StatusCode::OK => FetchOutcome::Success(body),
        StatusCode::NO_CONTENT => {
            debug!(url = %url, "No content");
            FetchOutcome::Empty
        }
        other => {
            let text = String::from_utf8_lossy(&body).into_owned();
            warn!(url = %url, status = other.as_u16(), body = %text, "Unexpected upstream response");
            FetchOutcome::Error(TransportError::Status {
                url: url.to_string(),
                status: other.as_u16(),
                body: text,
            })
        }
    }
}
