//! Peer failure detection and state propagation
//!
//! One cycle runs every heartbeat interval:
//!
//! ```text
//! check peer /health ──► takeover decision ──► push snapshot to peer /sync
//! ```
//!
//! The order is fixed: a standby that promotes itself does so before its
//! outbound push, so it never advertises stale standby state after taking
//! over. Cycles never overlap; the next one starts only after the previous
//! one's calls resolved or timed out. Every failure inside a cycle is
//! absorbed and logged, the next cycle is the retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::context::Context;

use super::client::{ClientError, PeerClient, PeerClientConfig};
use super::config::HaConfig;
use super::role::Role;
use super::sync::{build_snapshot, SyncStatus};

// ============================================================================
// Cycle Results
// ============================================================================

/// Outcome of one outbound sync push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// No peer configured
    NoPeer,
    /// Peer merged the snapshot
    Accepted,
    /// Peer is active and refused
    PeerActive,
    /// Peer answered with an error status
    Rejected,
    /// Transport failure or timeout
    Failed,
}

impl SyncOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoPeer => "no_peer",
            Self::Accepted => "accepted",
            Self::PeerActive => "peer_active",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// What happened during one cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub peer_healthy: bool,
    pub took_over: bool,
    pub sync: SyncOutcome,
}

// ============================================================================
// Health Monitor
// ============================================================================

/// Watches the peer and promotes this instance when the peer goes quiet
pub struct HealthMonitor {
    ctx: Context,
    client: Option<PeerClient>,
    /// Only advances on a verified health response
    last_peer_heartbeat: RwLock<DateTime<Utc>>,
    peer_active: AtomicBool,
    grace: chrono::Duration,
    interval: Duration,
    sync_action_limit: usize,
    sync_warning_limit: usize,
}

impl HealthMonitor {
    /// Create a monitor from the coordinator config
    pub fn new(ctx: Context, config: &HaConfig) -> Result<Self, ClientError> {
        let client = match &config.peer_url {
            Some(url) => Some(PeerClient::new(
                PeerClientConfig::new(url.as_str()).with_timeout(config.peer_timeout()),
            )?),
            None => None,
        };

        Ok(Self {
            ctx,
            client,
            last_peer_heartbeat: RwLock::new(Utc::now()),
            peer_active: AtomicBool::new(false),
            grace: grace_period(config.takeover_grace_secs),
            interval: config.heartbeat_interval(),
            sync_action_limit: config.sync_action_limit,
            sync_warning_limit: config.sync_warning_limit,
        })
    }

    /// Peer base URL, if one is configured
    pub fn peer_url(&self) -> Option<&str> {
        self.client.as_ref().map(PeerClient::peer_url)
    }

    /// Last heartbeat received from the peer
    pub async fn last_peer_heartbeat(&self) -> DateTime<Utc> {
        *self.last_peer_heartbeat.read().await
    }

    /// Peer's self-reported activity from the last successful check
    pub fn peer_active(&self) -> bool {
        self.peer_active.load(Ordering::SeqCst)
    }

    /// Advance the heartbeat. Older timestamps are ignored.
    pub async fn record_heartbeat(&self, at: DateTime<Utc>) {
        let mut last = self.last_peer_heartbeat.write().await;
        if at > *last {
            *last = at;
        }
    }

    /// Probe the peer's `/health`
    ///
    /// Returns `true` only on a verified 200 with a parseable body. Any
    /// failure leaves the heartbeat untouched.
    pub async fn check_peer_health(&self) -> bool {
        let Some(client) = &self.client else {
            return false;
        };

        match client.health().await {
            Ok(report) => {
                self.record_heartbeat(report.last_heartbeat).await;
                self.peer_active.store(report.is_active, Ordering::SeqCst);
                crate::metrics::record_peer_health_check(true);
                tracing::debug!(
                    peer = %client.peer_url(),
                    peer_role = %report.role,
                    peer_active = report.is_active,
                    "Peer healthy"
                );
                true
            }
            Err(e) => {
                crate::metrics::record_peer_health_check(false);
                tracing::warn!(peer = %client.peer_url(), error = %e, "Peer unreachable");
                false
            }
        }
    }

    /// Whether this instance should promote itself now
    pub async fn should_takeover(&self) -> bool {
        self.should_takeover_at(Utc::now()).await
    }

    /// Takeover decision evaluated at a given instant
    pub async fn should_takeover_at(&self, now: DateTime<Utc>) -> bool {
        if self.ctx.role() != Role::Secondary || self.ctx.is_active_instance() {
            return false;
        }
        now - self.last_peer_heartbeat().await > self.grace
    }

    /// Push a bounded snapshot to the peer
    pub async fn sync_data(&self) -> SyncOutcome {
        let Some(client) = &self.client else {
            return SyncOutcome::NoPeer;
        };

        let snapshot =
            build_snapshot(&self.ctx, self.sync_action_limit, self.sync_warning_limit).await;

        let outcome = match client.push_sync(&snapshot).await {
            Ok(response) => match response.status {
                SyncStatus::Success => {
                    tracing::debug!(
                        peer = %client.peer_url(),
                        inserted = response.inserted.len(),
                        "Sync successful"
                    );
                    SyncOutcome::Accepted
                }
                SyncStatus::ActiveSkip => {
                    tracing::debug!(peer = %client.peer_url(), "Peer is active, sync skipped");
                    SyncOutcome::PeerActive
                }
                SyncStatus::Error => {
                    tracing::warn!(
                        peer = %client.peer_url(),
                        error = response.error.as_deref().unwrap_or("unknown"),
                        "Peer rejected sync"
                    );
                    SyncOutcome::Rejected
                }
            },
            Err(e) => {
                tracing::warn!(peer = %client.peer_url(), error = %e, "Sync push failed");
                SyncOutcome::Failed
            }
        };

        crate::metrics::record_sync_push(outcome.as_str());
        outcome
    }

    /// Run one check → takeover → sync cycle
    pub async fn run_cycle(&self) -> CycleReport {
        self.run_cycle_at(Utc::now()).await
    }

    /// Run one cycle with the takeover decision evaluated at `now`
    pub async fn run_cycle_at(&self, now: DateTime<Utc>) -> CycleReport {
        let peer_healthy = self.check_peer_health().await;

        let mut took_over = false;
        if self.should_takeover_at(now).await {
            let last = self.last_peer_heartbeat().await;
            tracing::warn!(
                role = %self.ctx.role(),
                last_peer_heartbeat = %last.to_rfc3339(),
                "Peer heartbeat expired, taking over"
            );
            took_over = self.ctx.role.become_active().await;
            if took_over {
                crate::metrics::record_takeover();
            }
        }

        let sync = self.sync_data().await;

        CycleReport {
            peer_healthy,
            took_over,
            sync,
        }
    }

    /// Run cycles on the heartbeat interval until `shutdown` flips to true
    pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                interval_secs = self.interval.as_secs(),
                peer = self.peer_url().unwrap_or("none"),
                "Health loop started"
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let report = self.run_cycle().await;
                        tracing::debug!(
                            peer_healthy = report.peer_healthy,
                            took_over = report.took_over,
                            sync = report.sync.as_str(),
                            "Health cycle complete"
                        );
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            tracing::info!("Health loop stopped");
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

/// Grace as a signed duration, saturating for values chrono cannot hold
fn grace_period(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
