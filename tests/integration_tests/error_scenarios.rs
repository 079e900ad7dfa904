//! Error scenario integration tests
//!
//! Tests failure modes the health loop and the control plane absorb:
//! 1. Network timeouts
//! 2. Connection failures
//! 3. Malformed sync payloads
//! 4. HTTP error responses from the peer

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use banbot::coordinator::api::create_router;
use banbot::coordinator::{
    ClientError, HaConfig, HealthMonitor, PeerClient, PeerClientConfig, Role, SyncOutcome,
    SyncResponse, SyncStatus,
};
use banbot::error::{BanbotErrorTrait, ErrorCategory};

use super::fixtures::{health_body, MALFORMED_SYNC};
use crate::common::{create_context, create_state};

// ============================================================================
// Network Error Tests
// ============================================================================

#[tokio::test]
async fn test_timeout_handling() {
    let mock_server = MockServer::start().await;

    // Longer than the client timeout
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(health_body(&chrono::Utc::now().to_rfc3339(), true))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let client = PeerClient::new(
        PeerClientConfig::new(mock_server.uri()).with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let err = client.health().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout));
    assert!(err.is_recoverable());
    assert_eq!(err.category(), ErrorCategory::Network);
}

#[tokio::test]
async fn test_slow_peer_counts_as_unhealthy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let config = HaConfig::builder()
        .peer_url(mock_server.uri())
        .peer_timeout_ms(200)
        .build()
        .unwrap();
    let monitor = HealthMonitor::new(create_context(Role::Secondary), &config).unwrap();
    let before = monitor.last_peer_heartbeat().await;

    assert!(!monitor.check_peer_health().await);
    assert_eq!(monitor.last_peer_heartbeat().await, before);
}

#[tokio::test]
async fn test_connection_refused_cycle_completes() {
    let config = HaConfig::builder()
        .peer_url("http://127.0.0.1:9")
        .build()
        .unwrap();
    let ctx = create_context(Role::Secondary);
    let monitor = HealthMonitor::new(ctx.clone(), &config).unwrap();

    let report = monitor.run_cycle().await;
    assert!(!report.peer_healthy);
    assert!(!report.took_over);
    assert_eq!(report.sync, SyncOutcome::Failed);
    assert!(!ctx.is_active_instance());
}

#[tokio::test]
async fn test_http_error_without_json_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&mock_server)
        .await;

    let config = HaConfig::builder()
        .peer_url(mock_server.uri())
        .build()
        .unwrap();
    let monitor = HealthMonitor::new(create_context(Role::Primary), &config).unwrap();
    assert_eq!(monitor.sync_data().await, SyncOutcome::Failed);
}

// ============================================================================
// Malformed Payload Tests
// ============================================================================

#[tokio::test]
async fn test_malformed_sync_is_rejected_without_mutation() {
    let state = create_state(Role::Secondary);
    let router = create_router(state.clone());

    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync")
                .header("content-type", "application/json")
                .body(Body::from(MALFORMED_SYNC))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: SyncResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.status, SyncStatus::Error);
    assert!(body.error.is_some());

    assert_eq!(state.context.custom_command_count().await, 0);
    assert_eq!(state.context.stats().await, Default::default());
    assert!(state.context.peer_mirror.read().await.is_none());
}

#[tokio::test]
async fn test_wrong_shape_is_rejected() {
    let state = create_state(Role::Secondary);
    let response = create_router(state.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/sync")
                .body(Body::from(r#"{"custom_commands": ["not", "a", "map"]}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.context.custom_command_count().await, 0);
}

#[tokio::test]
async fn test_unknown_route() {
    let response = create_router(create_state(Role::Primary))
        .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
