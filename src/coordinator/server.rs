//! Control-plane server
//!
//! Binds the HTTP router, publishes the startup presence and owns the
//! health loop for the lifetime of the process.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::Context;

use super::api::create_router;
use super::client::ClientError;
use super::config::{ConfigError, HaConfig};
use super::health::HealthMonitor;

// ============================================================================
// App State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Per-instance stores and role
    pub context: Context,

    /// Configuration
    pub config: Arc<HaConfig>,
}

impl AppState {
    pub fn new(context: Context, config: HaConfig) -> Self {
        Self {
            context,
            config: Arc::new(config),
        }
    }
}

// ============================================================================
// Control Plane Server
// ============================================================================

/// HTTP control plane plus the background health loop
pub struct ControlPlaneServer {
    state: AppState,
    monitor: Arc<HealthMonitor>,
}

impl ControlPlaneServer {
    /// Create a new server
    pub fn new(context: Context, config: HaConfig) -> Result<Self, ServerError> {
        config.validate()?;

        let monitor = Arc::new(HealthMonitor::new(context.clone(), &config)?);
        let state = AppState::new(context, config);

        Ok(Self { state, monitor })
    }

    /// Get the application state
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Health monitor driving the background loop
    pub fn monitor(&self) -> Arc<HealthMonitor> {
        self.monitor.clone()
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let mut router = create_router(self.state.clone());

        if self.state.config.enable_cors {
            router = router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE]),
            );
        }

        if self.state.config.enable_request_logging {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn start_with_shutdown(
        &self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let addr = self.state.config.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("{addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Serve on an already-bound listener
    ///
    /// Publishes the startup presence, starts the health loop, and stops
    /// the loop once the HTTP server has drained.
    pub async fn serve(
        &self,
        listener: TcpListener,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Bind(e.to_string()))?;
        let ctx = &self.state.context;

        tracing::info!(
            addr = %local,
            role = %ctx.role(),
            activity = ctx.role.activity().label(),
            "Control plane listening"
        );

        ctx.role.announce().await;

        let (stop_tx, stop_rx) = watch::channel(false);
        let health_loop = self.monitor.clone().spawn(stop_rx);

        let result = axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Serve(e.to_string()));

        stop_tx.send_replace(true);
        if let Err(e) = health_loop.await {
            tracing::error!(error = %e, "Health loop task failed");
        }

        tracing::info!("Control plane shutdown complete");
        result
    }

    /// Get server info
    pub fn info(&self) -> ServerInfo {
        let config = &self.state.config;
        ServerInfo {
            bind_address: config.bind_address,
            role: self.state.context.role().to_string(),
            peer_url: config.peer_url.clone(),
            heartbeat_interval_secs: config.heartbeat_interval_secs,
            takeover_grace_secs: config.takeover_grace_secs,
            cors_enabled: config.enable_cors,
        }
    }
}

/// Server information
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub bind_address: SocketAddr,
    pub role: String,
    pub peer_url: Option<String>,
    pub heartbeat_interval_secs: u64,
    pub takeover_grace_secs: u64,
    pub cors_enabled: bool,
}

impl ServerInfo {
    /// Format as display string
    pub fn display(&self) -> String {
        format!(
            "BanBot Control Plane\n\
             {:-<40}\n\
             Bind Address: {}\n\
             Role: {}\n\
             Peer: {}\n\
             Heartbeat Interval: {}s\n\
             Takeover Grace: {}s\n\
             CORS: {}",
            "",
            self.bind_address,
            self.role.to_uppercase(),
            self.peer_url.as_deref().unwrap_or("none"),
            self.heartbeat_interval_secs,
            self.takeover_grace_secs,
            if self.cors_enabled { "enabled" } else { "disabled" },
        )
    }
}

// ============================================================================
// Server Errors
// ============================================================================

/// Server errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Initialization error: {0}")]
    Init(#[from] ClientError),

    #[error("Failed to bind: {0}")]
    Bind(String),

    #[error("Server error: {0}")]
    Serve(String),
}

// ============================================================================
// Tests
// ============================================================================
