//! Prometheus metrics for the HA coordinator
//!
//! This module provides metrics tracking for:
//! - Failure detection: peer health checks and takeovers
//! - Replication: outbound sync pushes and inbound sync ingests
//! - Control plane: API requests by endpoint and status
//! - Moderation: enforcement actions by kind
//!
//! # Usage
//!
//! Call `init_metrics()` at application startup to register all metrics.
//! If initialization fails, metrics operations become no-ops.

use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};
use std::sync::OnceLock;

// ============================================================================
// Metrics Storage
// ============================================================================

/// Container for all HA metrics
struct HaMetrics {
    peer_health_checks: CounterVec,
    takeovers: Counter,
    sync_push: CounterVec,
    sync_ingest: CounterVec,
    instance_active: Gauge,
    moderation_actions: CounterVec,
    api_requests: CounterVec,
}

/// Global storage for HA metrics
static HA_METRICS: OnceLock<HaMetrics> = OnceLock::new();

/// Flag to track if initialization was attempted
static METRICS_INIT_ATTEMPTED: OnceLock<bool> = OnceLock::new();

// ============================================================================
// Initialization
// ============================================================================

/// Initialize all Prometheus metrics
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_metrics() -> Result<(), Box<dyn std::error::Error>> {
    if METRICS_INIT_ATTEMPTED.get().is_some() {
        return Ok(());
    }
    METRICS_INIT_ATTEMPTED.set(true).ok();

    let metrics = HaMetrics {
        peer_health_checks: register_counter_vec!(
            "banbot_peer_health_checks_total",
            "Peer health checks by result",
            &["result"]
        )?,
        takeovers: register_counter!(
            "banbot_takeovers_total",
            "Number of times this instance took over from its peer"
        )?,
        sync_push: register_counter_vec!(
            "banbot_sync_push_total",
            "Outbound sync pushes by outcome",
            &["outcome"]
        )?,
        sync_ingest: register_counter_vec!(
            "banbot_sync_ingest_total",
            "Inbound sync requests by status",
            &["status"]
        )?,
        instance_active: register_gauge!(
            "banbot_instance_active",
            "Whether this instance is ACTIVE (1) or STANDBY (0)"
        )?,
        moderation_actions: register_counter_vec!(
            "banbot_moderation_actions_total",
            "Enforcement actions recorded by kind",
            &["kind"]
        )?,
        api_requests: register_counter_vec!(
            "banbot_api_requests_total",
            "Control-plane requests by endpoint and status",
            &["endpoint", "status"]
        )?,
    };

    HA_METRICS
        .set(metrics)
        .map_err(|_| "HA metrics already initialized")?;

    tracing::info!("Prometheus metrics initialized successfully");
    Ok(())
}

/// Check if metrics have been initialized
pub fn metrics_initialized() -> bool {
    HA_METRICS.get().is_some()
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

/// Record the result of one peer health check
pub fn record_peer_health_check(healthy: bool) {
    if let Some(m) = HA_METRICS.get() {
        let result = if healthy { "healthy" } else { "unreachable" };
        m.peer_health_checks.with_label_values(&[result]).inc();
    }
}

/// Record a takeover
pub fn record_takeover() {
    if let Some(m) = HA_METRICS.get() {
        m.takeovers.inc();
    }
}

/// Record an outbound sync push
pub fn record_sync_push(outcome: &str) {
    if let Some(m) = HA_METRICS.get() {
        m.sync_push.with_label_values(&[outcome]).inc();
    }
}

/// Record an inbound sync request
pub fn record_sync_ingest(status: &str) {
    if let Some(m) = HA_METRICS.get() {
        m.sync_ingest.with_label_values(&[status]).inc();
    }
}

/// Update the activity gauge
pub fn update_activity(active: bool) {
    if let Some(m) = HA_METRICS.get() {
        m.instance_active.set(if active { 1.0 } else { 0.0 });
    }
}

/// Record an enforcement action
pub fn record_moderation_action(kind: &str) {
    if let Some(m) = HA_METRICS.get() {
        m.moderation_actions.with_label_values(&[kind]).inc();
    }
}

/// Record a control-plane request
pub fn record_api_request(endpoint: &str, status: u16) {
    let Some(m) = HA_METRICS.get() else {
        return;
    };

    let status_str = status.to_string();
    m.api_requests
        .with_label_values(&[endpoint, &status_str])
        .inc();
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ensure_metrics_initialized() {
        let _ = init_metrics();
    }

    #[test]
    fn test_init_metrics_idempotent() {
        assert!(init_metrics().is_ok());
        assert!(init_metrics().is_ok());
    }

    #[test]
    fn test_encode_metrics() {
        ensure_metrics_initialized();
        record_takeover();
        let text = encode_metrics().unwrap();
        assert!(text.contains("banbot_takeovers_total"));
    }

    #[test]
    fn test_recording_does_not_panic() {
        ensure_metrics_initialized();
        record_peer_health_check(true);
        record_peer_health_check(false);
        record_sync_push("success");
        record_sync_ingest("active_skip");
        update_activity(true);
        record_moderation_action("ban");
        record_api_request("/health", 200);
    }
}
