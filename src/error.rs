//! Unified error handling for the banbot crate
//!
//! Domain errors stay in their modules; [`Error`] wraps them for code that
//! crosses module boundaries.
//!
//! # Architecture
//!
//! - [`BanbotErrorTrait`] - Common interface implemented by the error types
//! - [`ErrorCategory`] - Classification of errors for handling strategies
//! - [`Error`] - Unified error enum wrapping all domain-specific errors
//!
//! # Usage
//!
//! ```rust,ignore
//! use banbot::error::{BanbotErrorTrait, Error};
//!
//! fn handle_error(err: Error) {
//!     if err.is_recoverable() {
//!         tracing::warn!("next cycle will retry: {err}");
//!     } else {
//!         tracing::error!("fatal: {err}");
//!     }
//! }
//! ```

use std::io;
use thiserror::Error;

pub use crate::coordinator::client::ClientError;
pub use crate::coordinator::config::ConfigError;
pub use crate::coordinator::server::ServerError;
pub use crate::moderation::DurationError;
pub use crate::platform::PlatformError;
pub use crate::registry::RegistryError;

/// Common trait for banbot error types
pub trait BanbotErrorTrait: std::error::Error {
    /// Whether a later attempt can succeed without operator action
    fn is_recoverable(&self) -> bool;

    /// Error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Peer unreachable, timeout, transport failure
    Network,
    /// Startup misconfiguration
    Config,
    /// Snapshot ingest or decode failures
    Sync,
    /// Messaging-platform rejections
    Platform,
    /// Bad user input (durations, command names)
    Validation,
    /// Other/unknown errors
    Other,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Config => "config",
            Self::Sync => "sync",
            Self::Platform => "platform",
            Self::Validation => "validation",
            Self::Other => "other",
        }
    }
}

impl BanbotErrorTrait for ClientError {
    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Init(_))
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Init(_) => ErrorCategory::Config,
            Self::Timeout | Self::Network(_) | Self::Http { .. } => ErrorCategory::Network,
            Self::Parse(_) => ErrorCategory::Sync,
        }
    }
}

impl BanbotErrorTrait for PlatformError {
    fn is_recoverable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    fn category(&self) -> ErrorCategory {
        ErrorCategory::Platform
    }
}

/// Unified error type for the banbot crate
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration errors; fatal at startup
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Peer client errors
    #[error("Peer error: {0}")]
    Client(#[from] ClientError),

    /// Control-plane server errors
    #[error("Server error: {0}")]
    Server(#[from] ServerError),

    /// Custom command registry errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Duration parsing errors
    #[error("Duration error: {0}")]
    Duration(#[from] DurationError),

    /// Messaging platform errors
    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{context}")]
    Other {
        context: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl BanbotErrorTrait for Error {
    fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Client(e) => e.is_recoverable(),
            Self::Server(e) => matches!(e, ServerError::Serve(_)),
            Self::Registry(_) | Self::Duration(_) => false,
            Self::Platform(e) => e.is_recoverable(),
            Self::Io(_) => true,
            Self::Json(_) => true,
            Self::Other { .. } => false,
        }
    }

    fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Client(e) => e.category(),
            Self::Server(ServerError::Config(_)) => ErrorCategory::Config,
            Self::Server(_) | Self::Io(_) => ErrorCategory::Network,
            Self::Registry(_) | Self::Duration(_) => ErrorCategory::Validation,
            Self::Platform(_) => ErrorCategory::Platform,
            Self::Json(_) => ErrorCategory::Sync,
            Self::Other { .. } => ErrorCategory::Other,
        }
    }
}

impl Error {
    /// Create a configuration error for a missing field
    pub fn missing(field: impl Into<String>) -> Self {
        Self::Config(ConfigError::MissingField {
            field: field.into(),
        })
    }

    /// Create a generic error with context
    pub fn other(context: impl Into<String>) -> Self {
        Self::Other {
            context: context.into(),
            source: None,
        }
    }

    /// Create a generic error with context and source
    pub fn with_source(
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Other {
            context: context.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;
