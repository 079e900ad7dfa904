//! Failover and replication tests
//!
//! Tests the interaction between a primary and a secondary instance:
//! 1. Heartbeat tracking against a mock peer
//! 2. Takeover after the grace period
//! 3. Custom command replication between two live control planes

use chrono::{Duration as ChronoDuration, Utc};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use banbot::context::Context;
use banbot::coordinator::api::{create_router, HealthReport};
use banbot::coordinator::{AppState, HaConfig, HealthMonitor, Role, SyncOutcome};
use banbot::dispatch::{AdminList, CommandDispatcher, Guild, Invocation, Member};
use banbot::models::CustomCommand;
use banbot::platform::LogOnlyPlatform;

use super::fixtures::health_body;
use crate::common::create_context;

/// Nothing listens on the discard port
const UNREACHABLE_PEER: &str = "http://127.0.0.1:9";

fn monitor_for(ctx: Context, peer: &str) -> HealthMonitor {
    let config = HaConfig::builder()
        .peer_url(peer)
        .peer_timeout_ms(1000)
        .build()
        .unwrap();
    HealthMonitor::new(ctx, &config).unwrap()
}

/// Serve a control plane on an ephemeral port until the sender is dropped
async fn spawn_control_plane(ctx: Context) -> (SocketAddr, oneshot::Sender<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_router(AppState::new(ctx, HaConfig::default()));
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    });

    (addr, tx)
}

// ============================================================================
// Heartbeat Tests
// ============================================================================

#[tokio::test]
async fn test_healthy_peer_advances_heartbeat() {
    let mock_server = MockServer::start().await;
    let reported = Utc::now() + ChronoDuration::seconds(5);

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(health_body(&reported.to_rfc3339(), true)))
        .mount(&mock_server)
        .await;

    let monitor = monitor_for(create_context(Role::Secondary), &mock_server.uri());

    assert!(monitor.check_peer_health().await);
    assert!(monitor.peer_active());
    assert_eq!(
        monitor.last_peer_heartbeat().await.timestamp_millis(),
        reported.timestamp_millis()
    );
}

#[tokio::test]
async fn test_failed_check_leaves_heartbeat() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let monitor = monitor_for(create_context(Role::Secondary), &mock_server.uri());
    let before = monitor.last_peer_heartbeat().await;

    assert!(!monitor.check_peer_health().await);
    assert_eq!(monitor.last_peer_heartbeat().await, before);
}

#[tokio::test]
async fn test_garbage_health_body_is_unhealthy() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&mock_server)
        .await;

    let monitor = monitor_for(create_context(Role::Secondary), &mock_server.uri());
    assert!(!monitor.check_peer_health().await);
}

// ============================================================================
// Takeover Tests
// ============================================================================

#[tokio::test]
async fn test_takeover_after_61_seconds_of_silence() {
    let ctx = create_context(Role::Secondary);
    let monitor = monitor_for(ctx.clone(), UNREACHABLE_PEER);

    let start = monitor.last_peer_heartbeat().await;
    let report = monitor
        .run_cycle_at(start + ChronoDuration::seconds(61))
        .await;

    assert!(!report.peer_healthy);
    assert!(report.took_over);
    assert_eq!(report.sync, SyncOutcome::Failed);
    assert!(ctx.is_active_instance());

    // /health on the promoted instance now reports active
    let (addr, _stop) = spawn_control_plane(ctx).await;
    let report: HealthReport = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(report.role, Role::Secondary);
    assert!(report.is_active);
}

#[tokio::test]
async fn test_live_peer_prevents_takeover() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(health_body(&Utc::now().to_rfc3339(), true)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/sync"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "active_skip"})))
        .mount(&mock_server)
        .await;

    let ctx = create_context(Role::Secondary);
    let monitor = monitor_for(ctx.clone(), &mock_server.uri());

    let report = monitor.run_cycle().await;
    assert!(report.peer_healthy);
    assert!(!report.took_over);
    assert_eq!(report.sync, SyncOutcome::PeerActive);
    assert!(!ctx.is_active_instance());
}

// ============================================================================
// Sync Push Tests
// ============================================================================

#[tokio::test]
async fn test_sync_push_carries_commands() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sync"))
        .and(body_partial_json(serde_json::json!({
            "custom_commands": {"rules": {"name": "rules"}}
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"status": "success", "inserted": ["rules"]})),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let ctx = create_context(Role::Primary);
    ctx.add_custom_command(CustomCommand::new("rules", "Rules", "Be nice", 1))
        .await
        .unwrap();

    let monitor = monitor_for(ctx, &mock_server.uri());
    assert_eq!(monitor.sync_data().await, SyncOutcome::Accepted);
}

#[tokio::test]
async fn test_rejected_sync_is_absorbed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sync"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"status": "error", "error": "bad"})),
        )
        .mount(&mock_server)
        .await;

    let monitor = monitor_for(create_context(Role::Primary), &mock_server.uri());
    assert_eq!(monitor.sync_data().await, SyncOutcome::Rejected);
}

// ============================================================================
// Two-Instance Scenario
// ============================================================================

#[tokio::test]
async fn test_rules_command_survives_failover() {
    // B: secondary on standby, serving its control plane
    let b_ctx = create_context(Role::Secondary);
    let (b_addr, _stop_b) = spawn_control_plane(b_ctx.clone()).await;

    // A: active primary with a custom command, pushing to B
    let a_ctx = create_context(Role::Primary);
    a_ctx
        .add_custom_command(CustomCommand::new("rules", "Server rules", "Be nice, {user}", 7))
        .await
        .unwrap();
    let a_monitor = monitor_for(a_ctx, &format!("http://{b_addr}"));

    let report = a_monitor.run_cycle().await;
    assert!(report.peer_healthy);
    assert!(!a_monitor.peer_active());
    assert_eq!(report.sync, SyncOutcome::Accepted);

    // A's command reached B's registry, but B still answers nothing
    let dispatcher = CommandDispatcher::new(
        b_ctx.clone(),
        Arc::new(LogOnlyPlatform),
        AdminList::default(),
    );
    let guild = Guild {
        id: 1,
        name: "guild".to_string(),
        owner_id: 1,
    };
    let invocation = Invocation::new(Member::new(50, "dave"), "rules").in_guild(guild);
    assert!(dispatcher.dispatch(&invocation).await.is_none());

    // A goes away; B takes over after the grace period
    let b_monitor = monitor_for(b_ctx.clone(), UNREACHABLE_PEER);
    let start = b_monitor.last_peer_heartbeat().await;
    let report = b_monitor
        .run_cycle_at(start + ChronoDuration::seconds(61))
        .await;
    assert!(report.took_over);

    let reply = dispatcher.dispatch(&invocation).await.unwrap();
    assert_eq!(reply.title, "Be nice, dave");
}
