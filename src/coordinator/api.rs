//! Control-plane HTTP handlers
//!
//! Every route answers regardless of activity so the peer can always read
//! this instance's health. Only `POST /sync` mutates state.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /` | liveness with role/activity echo |
//! | `GET /health` | heartbeat signal read by the peer |
//! | `GET /ping` | liveness plus gateway latency |
//! | `GET /stats` | counters and store sizes |
//! | `GET /commands` | custom command metadata |
//! | `GET /history` | recent local history plus the peer mirror |
//! | `GET /metrics` | Prometheus text |
//! | `POST /sync` | peer snapshot ingest |

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{DeoppedUser, ModerationAction, Stats, UserId, Warning};

use super::role::Role;
use super::server::AppState;
use super::sync::{self, PeerMirror, SyncStatus};

// ============================================================================
// Response Types
// ============================================================================

/// `GET /` body
#[derive(Debug, Serialize, Deserialize)]
pub struct HomeResponse {
    pub message: String,
    pub role: Role,
    pub active: bool,
    pub uptime: f64,
}

/// `GET /health` body; doubles as the heartbeat read by the peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub role: Role,
    pub is_active: bool,
    pub upstream_connected: bool,
    /// Time this report was produced
    pub last_heartbeat: DateTime<Utc>,
    pub uptime: f64,
    pub guild_count: usize,
    pub custom_command_count: usize,
}

/// `GET /ping` body
#[derive(Debug, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub role: Role,
    pub active: bool,
    pub latency_ms: Option<u64>,
}

/// `GET /stats` body
#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    pub stats: Stats,
    pub custom_command_count: usize,
    pub total_actions: usize,
    pub role: Role,
}

/// One entry of `GET /commands`; the response body is not exposed
#[derive(Debug, Serialize, Deserialize)]
pub struct CommandSummary {
    pub description: String,
    pub usage_count: u64,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

/// `GET /history` body
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub role: Role,
    pub actions: Vec<ModerationAction>,
    pub warnings: Vec<Warning>,
    pub deopped: Vec<DeoppedUser>,
    pub peer: Option<PeerMirror>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the control-plane router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/ping", get(ping))
        .route("/stats", get(get_stats))
        .route("/commands", get(list_commands))
        .route("/history", get(get_history))
        .route("/metrics", get(get_metrics))
        .route("/sync", post(ingest_sync))
        .with_state(state)
}

// ============================================================================
// Liveness Handlers
// ============================================================================

async fn home(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_api_request("/", 200);
    let ctx = &state.context;

    Json(HomeResponse {
        message: "BanBot HA is alive!".to_string(),
        role: ctx.role(),
        active: ctx.is_active_instance(),
        uptime: ctx.uptime_secs(),
    })
}

/// Build the health report served at `/health`
pub async fn health_report(state: &AppState) -> HealthReport {
    let ctx = &state.context;

    HealthReport {
        role: ctx.role(),
        is_active: ctx.is_active_instance(),
        upstream_connected: ctx.upstream.is_connected(),
        last_heartbeat: Utc::now(),
        uptime: ctx.uptime_secs(),
        guild_count: ctx.upstream.guild_count(),
        custom_command_count: ctx.custom_command_count().await,
    }
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_api_request("/health", 200);
    Json(health_report(&state).await)
}

async fn ping(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_api_request("/ping", 200);
    let ctx = &state.context;

    Json(PingResponse {
        status: "pong".to_string(),
        role: ctx.role(),
        active: ctx.is_active_instance(),
        latency_ms: ctx.upstream.latency_ms(),
    })
}

// ============================================================================
// Read Handlers
// ============================================================================

async fn get_stats(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_api_request("/stats", 200);
    let ctx = &state.context;

    let total_actions = ctx.moderation.read().await.actions().len();
    let custom_command_count = ctx.custom_command_count().await;
    let stats = ctx.stats().await;

    Json(StatsResponse {
        stats,
        custom_command_count,
        total_actions,
        role: ctx.role(),
    })
}

async fn list_commands(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_api_request("/commands", 200);

    let commands = state.context.commands.read().await;
    let body: BTreeMap<String, CommandSummary> = commands
        .list()
        .into_iter()
        .map(|cmd| {
            (
                cmd.name.clone(),
                CommandSummary {
                    description: cmd.description.clone(),
                    usage_count: cmd.usage_count,
                    created_by: cmd.created_by,
                    created_at: cmd.created_at,
                },
            )
        })
        .collect();

    Json(body)
}

async fn get_history(State(state): State<AppState>) -> impl IntoResponse {
    crate::metrics::record_api_request("/history", 200);
    let ctx = &state.context;

    let (actions, warnings, deopped) = {
        let log = ctx.moderation.read().await;
        let mut deopped: Vec<DeoppedUser> = log.deopped().values().cloned().collect();
        deopped.sort_by_key(|d| d.timestamp);
        (
            log.recent_actions(state.config.sync_action_limit),
            log.recent_warnings(state.config.sync_warning_limit),
            deopped,
        )
    };
    let peer = ctx.peer_mirror.read().await.clone();

    Json(HistoryResponse {
        role: ctx.role(),
        actions,
        warnings,
        deopped,
        peer,
    })
}

async fn get_metrics() -> Response {
    match crate::metrics::encode_metrics() {
        Ok(text) => {
            crate::metrics::record_api_request("/metrics", 200);
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
                text,
            )
                .into_response()
        }
        Err(e) => {
            crate::metrics::record_api_request("/metrics", 500);
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

// ============================================================================
// Sync Handler
// ============================================================================

/// Ingest a peer snapshot
///
/// The raw body is taken so that a malformed payload still gets a JSON
/// `{"status":"error"}` answer instead of the framework's rejection.
async fn ingest_sync(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let response = sync::ingest(&state.context, &body).await;

    let status = match response.status {
        SyncStatus::Success | SyncStatus::ActiveSkip => StatusCode::OK,
        SyncStatus::Error => StatusCode::BAD_REQUEST,
    };
    crate::metrics::record_api_request("/sync", status.as_u16());

    (status, Json(response))
}

// ============================================================================
// Tests
// ============================================================================
