//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use crate::moderation::{LogLimits, DEFAULT_MAX_ACTIONS, DEFAULT_RETAINED_ACTIONS};

use super::sync::{DEFAULT_SYNC_ACTIONS, DEFAULT_SYNC_WARNINGS};

const DEFAULT_BIND: ([u8; 4], u16) = ([0, 0, 0, 0], 5000);

/// Longest takeover grace period accepted, one day
pub const MAX_TAKEOVER_GRACE_SECS: u64 = 86_400;

/// Configuration for the HA coordinator of one instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HaConfig {
    /// Control-plane bind address
    pub bind_address: SocketAddr,

    /// Peer base URL; `None` on an instance with nobody to watch
    pub peer_url: Option<String>,

    /// Period of the health/sync cycle in seconds
    pub heartbeat_interval_secs: u64,

    /// Heartbeat age after which a standby takes over, in seconds
    pub takeover_grace_secs: u64,

    /// Per-request timeout for peer calls in milliseconds
    pub peer_timeout_ms: u64,

    /// Action-log ceiling
    pub max_actions: usize,

    /// Actions kept after the ceiling is exceeded
    pub retained_actions: usize,

    /// Actions included in each sync push
    pub sync_action_limit: usize,

    /// Warnings included in each sync push
    pub sync_warning_limit: usize,

    /// Enable CORS for the control plane
    pub enable_cors: bool,

    /// Enable request logging
    pub enable_request_logging: bool,
}

impl Default for HaConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(DEFAULT_BIND),
            peer_url: None,
            heartbeat_interval_secs: 30,
            takeover_grace_secs: 60,
            peer_timeout_ms: 5_000,
            max_actions: DEFAULT_MAX_ACTIONS,
            retained_actions: DEFAULT_RETAINED_ACTIONS,
            sync_action_limit: DEFAULT_SYNC_ACTIONS,
            sync_warning_limit: DEFAULT_SYNC_WARNINGS,
            enable_cors: true,
            enable_request_logging: true,
        }
    }
}

impl HaConfig {
    /// Create a new config builder
    pub fn builder() -> HaConfigBuilder {
        HaConfigBuilder::default()
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn takeover_grace(&self) -> Duration {
        Duration::from_secs(self.takeover_grace_secs)
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    /// Action-log limits for the moderation store
    pub fn log_limits(&self) -> LogLimits {
        LogLimits::new(self.max_actions, self.retained_actions)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.heartbeat_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "heartbeat_interval_secs".to_string(),
                reason: "Interval must be at least 1 second".to_string(),
            });
        }

        if self.takeover_grace_secs <= self.heartbeat_interval_secs {
            return Err(ConfigError::InvalidValue {
                field: "takeover_grace_secs".to_string(),
                reason: "Grace period must be greater than interval".to_string(),
            });
        }

        if self.takeover_grace_secs > MAX_TAKEOVER_GRACE_SECS {
            return Err(ConfigError::InvalidValue {
                field: "takeover_grace_secs".to_string(),
                reason: format!("Grace period cannot exceed {MAX_TAKEOVER_GRACE_SECS} seconds"),
            });
        }

        if self.peer_timeout_ms == 0 || self.peer_timeout() >= self.heartbeat_interval() {
            return Err(ConfigError::InvalidValue {
                field: "peer_timeout_ms".to_string(),
                reason: "Timeout must be non-zero and shorter than the interval".to_string(),
            });
        }

        if self.max_actions == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_actions".to_string(),
                reason: "Must keep at least 1 action".to_string(),
            });
        }

        if self.retained_actions > self.max_actions {
            return Err(ConfigError::InvalidValue {
                field: "retained_actions".to_string(),
                reason: "Retained size cannot exceed the ceiling".to_string(),
            });
        }

        if let Some(peer) = &self.peer_url {
            validate_peer_url(peer)?;
        }

        Ok(())
    }
}

/// Peer URLs must be absolute http(s) URLs
pub fn validate_peer_url(peer: &str) -> Result<(), ConfigError> {
    let parsed = url::Url::parse(peer).map_err(|e| ConfigError::InvalidValue {
        field: "peer_url".to_string(),
        reason: format!("Invalid URL '{peer}': {e}"),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::InvalidValue {
            field: "peer_url".to_string(),
            reason: format!("Unsupported scheme '{other}'"),
        }),
    }
}

/// Builder for HaConfig
#[derive(Debug, Default)]
pub struct HaConfigBuilder {
    bind_address: Option<SocketAddr>,
    peer_url: Option<String>,
    heartbeat_interval_secs: Option<u64>,
    takeover_grace_secs: Option<u64>,
    peer_timeout_ms: Option<u64>,
    max_actions: Option<usize>,
    retained_actions: Option<usize>,
    sync_action_limit: Option<usize>,
    sync_warning_limit: Option<usize>,
    enable_cors: Option<bool>,
    enable_request_logging: Option<bool>,
}

impl HaConfigBuilder {
    /// Set bind address
    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = Some(addr);
        self
    }

    /// Set bind address from string
    pub fn bind_address_str(mut self, addr: &str) -> Result<Self, ConfigError> {
        self.bind_address = Some(addr.parse().map_err(|_| ConfigError::InvalidValue {
            field: "bind_address".to_string(),
            reason: format!("Invalid address: {addr}"),
        })?);
        Ok(self)
    }

    /// Set peer base URL
    pub fn peer_url(mut self, url: impl Into<String>) -> Self {
        self.peer_url = Some(url.into());
        self
    }

    pub fn heartbeat_interval_secs(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = Some(secs);
        self
    }

    pub fn takeover_grace_secs(mut self, secs: u64) -> Self {
        self.takeover_grace_secs = Some(secs);
        self
    }

    pub fn peer_timeout_ms(mut self, ms: u64) -> Self {
        self.peer_timeout_ms = Some(ms);
        self
    }

    /// Set action-log ceiling and retained size
    pub fn action_log(mut self, max: usize, retained: usize) -> Self {
        self.max_actions = Some(max);
        self.retained_actions = Some(retained);
        self
    }

    /// Set snapshot sizes
    pub fn sync_limits(mut self, actions: usize, warnings: usize) -> Self {
        self.sync_action_limit = Some(actions);
        self.sync_warning_limit = Some(warnings);
        self
    }

    /// Enable/disable CORS
    pub fn enable_cors(mut self, enable: bool) -> Self {
        self.enable_cors = Some(enable);
        self
    }

    /// Enable/disable request logging
    pub fn enable_request_logging(mut self, enable: bool) -> Self {
        self.enable_request_logging = Some(enable);
        self
    }

    /// Build the config
    pub fn build(self) -> Result<HaConfig, ConfigError> {
        let defaults = HaConfig::default();
        let config = HaConfig {
            bind_address: self.bind_address.unwrap_or(defaults.bind_address),
            peer_url: self.peer_url.map(|u| u.trim_end_matches('/').to_string()),
            heartbeat_interval_secs: self
                .heartbeat_interval_secs
                .unwrap_or(defaults.heartbeat_interval_secs),
            takeover_grace_secs: self
                .takeover_grace_secs
                .unwrap_or(defaults.takeover_grace_secs),
            peer_timeout_ms: self.peer_timeout_ms.unwrap_or(defaults.peer_timeout_ms),
            max_actions: self.max_actions.unwrap_or(defaults.max_actions),
            retained_actions: self.retained_actions.unwrap_or(defaults.retained_actions),
            sync_action_limit: self.sync_action_limit.unwrap_or(defaults.sync_action_limit),
            sync_warning_limit: self
                .sync_warning_limit
                .unwrap_or(defaults.sync_warning_limit),
            enable_cors: self.enable_cors.unwrap_or(defaults.enable_cors),
            enable_request_logging: self
                .enable_request_logging
                .unwrap_or(defaults.enable_request_logging),
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Failed to read config file: {0}")]
    Io(String),

    #[error("Failed to parse config file: {0}")]
    Parse(String),
}
