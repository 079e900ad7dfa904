//! HTTP client for talking to the peer instance
//!
//! Every call carries a short absolute timeout and is attempted exactly
//! once. A missed call is corrected by the next scheduled cycle, so there
//! is no retry loop here.

use reqwest::Client;
use std::time::Duration;

use super::api::HealthReport;
use super::sync::{SyncResponse, SyncSnapshot};

/// Default per-request timeout
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Client Configuration
// ============================================================================

/// Configuration for the peer client
#[derive(Debug, Clone)]
pub struct PeerClientConfig {
    /// Peer base URL, without a trailing slash
    pub peer_url: String,

    /// Request timeout
    pub timeout: Duration,
}

impl PeerClientConfig {
    /// Create a new client config
    pub fn new(peer_url: impl Into<String>) -> Self {
        let peer_url: String = peer_url.into();
        Self {
            peer_url: peer_url.trim_end_matches('/').to_string(),
            timeout: DEFAULT_PEER_TIMEOUT,
        }
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ============================================================================
// Peer Client
// ============================================================================

/// Client for the peer's control plane
#[derive(Debug, Clone)]
pub struct PeerClient {
    config: PeerClientConfig,
    http_client: Client,
}

impl PeerClient {
    /// Create a new peer client
    pub fn new(config: PeerClientConfig) -> Result<Self, ClientError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ClientError::Init(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    /// Peer base URL
    pub fn peer_url(&self) -> &str {
        &self.config.peer_url
    }

    /// Fetch the peer's `/health` report
    pub async fn health(&self) -> Result<HealthReport, ClientError> {
        let url = format!("{}/health", self.config.peer_url);

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(ClientError::Http {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        response
            .json::<HealthReport>()
            .await
            .map_err(|e| ClientError::Parse(e.to_string()))
    }

    /// Push a snapshot to the peer's `/sync`
    ///
    /// An `active_skip` or `error` answer is returned as a normal response;
    /// only transport problems and undecodable bodies are errors. The peer
    /// answers `error` with a non-2xx status, so the body is decoded
    /// regardless of status when it parses.
    pub async fn push_sync(&self, snapshot: &SyncSnapshot) -> Result<SyncResponse, ClientError> {
        let url = format!("{}/sync", self.config.peer_url);

        let response = self
            .http_client
            .post(&url)
            .json(snapshot)
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(ClientError::from_reqwest)?;

        match serde_json::from_slice::<SyncResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(_) if !status.is_success() => Err(ClientError::Http {
                status: status.as_u16(),
                message: String::from_utf8_lossy(&body).into_owned(),
            }),
            Err(e) => Err(ClientError::Parse(e.to_string())),
        }
    }
}

// ============================================================================
// Client Errors
// ============================================================================

/// Peer client errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(String),

    /// Peer did not answer in time
    #[error("Peer request timed out")]
    Timeout,

    /// Connection or transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status
    #[error("HTTP error ({status}): {message}")]
    Http { status: u16, message: String },

    /// Body did not decode
    #[error("Parse error: {0}")]
    Parse(String),
}

impl ClientError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
