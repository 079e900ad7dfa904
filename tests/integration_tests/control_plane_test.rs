//! Control-plane integration tests
//!
//! Drives the axum router in-process:
//! 1. Liveness and health reporting
//! 2. Sync ingest guard on an ACTIVE instance
//! 3. First-writer-wins merge on a STANDBY instance

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use banbot::coordinator::api::{create_router, HealthReport};
use banbot::coordinator::{Role, SyncResponse, SyncStatus};
use banbot::models::CustomCommand;

use super::fixtures::{SYNC_WITH_OTHER_RULES, SYNC_WITH_RULES};
use crate::common::create_state;

async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn post_sync(router: Router, body: &str) -> (StatusCode, SyncResponse) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

// ============================================================================
// Read Endpoint Tests
// ============================================================================

#[tokio::test]
async fn test_endpoints_answer_on_standby() {
    let state = create_state(Role::Secondary);
    let router = create_router(state);

    for uri in ["/", "/ping", "/health", "/stats", "/commands", "/history"] {
        let (status, _) = get_json(router.clone(), uri).await;
        assert_eq!(status, StatusCode::OK, "{uri} should answer on standby");
    }
}

#[tokio::test]
async fn test_health_is_heartbeat() {
    let state = create_state(Role::Primary);
    state.context.upstream.set_connected(true);
    state.context.upstream.set_guild_count(3);
    state
        .context
        .add_custom_command(CustomCommand::new("rules", "Rules", "Be nice", 1))
        .await
        .unwrap();

    let before = chrono::Utc::now();
    let (status, body) = get_json(create_router(state), "/health").await;
    assert_eq!(status, StatusCode::OK);

    let report: HealthReport = serde_json::from_value(body).unwrap();
    assert_eq!(report.role, Role::Primary);
    assert!(report.is_active);
    assert!(report.upstream_connected);
    assert_eq!(report.guild_count, 3);
    assert_eq!(report.custom_command_count, 1);
    assert!(report.last_heartbeat >= before);
}

#[tokio::test]
async fn test_ping_reports_latency_only_when_connected() {
    let state = create_state(Role::Primary);
    state.context.upstream.set_latency_ms(Some(42));

    let (_, body) = get_json(create_router(state.clone()), "/ping").await;
    assert_eq!(body["status"], "pong");
    assert!(body["latency_ms"].is_null());

    state.context.upstream.set_connected(true);
    let (_, body) = get_json(create_router(state), "/ping").await;
    assert_eq!(body["latency_ms"], 42);
}

#[tokio::test]
async fn test_commands_hide_response_text() {
    let state = create_state(Role::Primary);
    state
        .context
        .add_custom_command(CustomCommand::new("secret", "Mod notes", "do not leak", 9))
        .await
        .unwrap();

    let (_, body) = get_json(create_router(state), "/commands").await;
    assert_eq!(body["secret"]["description"], "Mod notes");
    assert_eq!(body["secret"]["created_by"], 9);
    assert!(!body.to_string().contains("do not leak"));
}

// ============================================================================
// Sync Ingest Tests
// ============================================================================

#[tokio::test]
async fn test_active_instance_skips_ingest() {
    let state = create_state(Role::Primary);
    let (status, response) = post_sync(create_router(state.clone()), SYNC_WITH_RULES).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(response.status, SyncStatus::ActiveSkip);
    assert_eq!(state.context.custom_command_count().await, 0);
    assert_eq!(state.context.stats().await.bans, 0);
    assert!(state.context.peer_mirror.read().await.is_none());
}

#[tokio::test]
async fn test_standby_merge_is_first_writer_wins() {
    let state = create_state(Role::Secondary);
    let router = create_router(state.clone());

    let (status, first) = post_sync(router.clone(), SYNC_WITH_RULES).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first.status, SyncStatus::Success);
    assert_eq!(first.inserted, vec!["rules".to_string()]);

    let (_, second) = post_sync(router, SYNC_WITH_OTHER_RULES).await;
    assert_eq!(second.status, SyncStatus::Success);
    assert!(second.inserted.is_empty());

    let commands = state.context.commands.read().await;
    let rules = commands.get("rules").unwrap();
    assert_eq!(rules.description, "Server rules");
    assert_eq!(rules.created_by, 7);
}

#[tokio::test]
async fn test_standby_stats_are_overridden() {
    let state = create_state(Role::Secondary);
    state.context.count_command().await;

    let (_, response) = post_sync(create_router(state.clone()), SYNC_WITH_RULES).await;
    assert_eq!(response.status, SyncStatus::Success);

    let stats = state.context.stats().await;
    assert_eq!(stats.bans, 4);
    assert_eq!(stats.commands_used, 20);
}

#[tokio::test]
async fn test_sync_without_stats_keeps_counters() {
    let state = create_state(Role::Secondary);
    let router = create_router(state.clone());

    post_sync(router.clone(), SYNC_WITH_RULES).await;
    let (_, response) = post_sync(router, SYNC_WITH_OTHER_RULES).await;
    assert_eq!(response.status, SyncStatus::Success);

    let stats = state.context.stats().await;
    assert_eq!(stats.bans, 4);
    assert_eq!(stats.commands_used, 20);
}

#[tokio::test]
async fn test_history_exposes_peer_mirror() {
    let state = create_state(Role::Secondary);
    let router = create_router(state);

    post_sync(router.clone(), SYNC_WITH_RULES).await;

    let (status, body) = get_json(router, "/history").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "secondary");
    assert_eq!(body["peer"]["actions"][0]["user_id"], 42);
    assert_eq!(body["peer"]["warnings"][0]["reason"], "caps");
}

#[tokio::test]
async fn test_promoted_instance_stops_ingesting() {
    let state = create_state(Role::Secondary);
    let router = create_router(state.clone());

    state.context.role.become_active().await;

    let (_, response) = post_sync(router, SYNC_WITH_RULES).await;
    assert_eq!(response.status, SyncStatus::ActiveSkip);
    assert_eq!(state.context.custom_command_count().await, 0);
}
