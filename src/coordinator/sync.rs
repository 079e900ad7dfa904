//! State replication between the two instances
//!
//! The sender pushes a bounded [`SyncSnapshot`]; the receiver merges it only
//! while on STANDBY:
//!
//! - custom commands merge by name, first writer wins
//! - counters the peer reports override local ones; absent counters stay
//! - action/warning history and the deopped map are kept as a read-only
//!   [`PeerMirror`] for display, never merged into local stores
//!
//! An ACTIVE receiver refuses with [`SyncStatus::ActiveSkip`] and touches
//! nothing. A payload that fails to parse is rejected before any store is
//! locked.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::context::Context;
use crate::models::{CustomCommand, DeoppedUser, ModerationAction, StatsUpdate, UserId, Warning};

/// Default number of actions included in a snapshot
pub const DEFAULT_SYNC_ACTIONS: usize = 100;

/// Default number of warnings included in a snapshot
pub const DEFAULT_SYNC_WARNINGS: usize = 50;

// ============================================================================
// Wire Types
// ============================================================================

/// State pushed from one instance to its peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    #[serde(default)]
    pub actions: Vec<ModerationAction>,
    #[serde(default)]
    pub warnings: Vec<Warning>,
    #[serde(default)]
    pub deopped: BTreeMap<UserId, DeoppedUser>,
    #[serde(default)]
    pub custom_commands: BTreeMap<String, CustomCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<StatsUpdate>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a sync request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Success,
    ActiveSkip,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::ActiveSkip => "active_skip",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body returned by `POST /sync`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: SyncStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inserted: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SyncResponse {
    fn new(status: SyncStatus) -> Self {
        Self {
            status,
            inserted: Vec::new(),
            error: None,
        }
    }

    pub fn active_skip() -> Self {
        Self::new(SyncStatus::ActiveSkip)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::new(SyncStatus::Error)
        }
    }
}

/// Read-only copy of the peer's history, replaced on every accepted sync
#[derive(Debug, Clone, Serialize)]
pub struct PeerMirror {
    pub actions: Vec<ModerationAction>,
    pub warnings: Vec<Warning>,
    pub deopped: BTreeMap<UserId, DeoppedUser>,
    /// Timestamp the peer stamped on the snapshot
    pub peer_timestamp: DateTime<Utc>,
    pub received_at: DateTime<Utc>,
}

// ============================================================================
// Snapshot / Ingest
// ============================================================================

/// Build the bounded snapshot pushed to the peer
pub async fn build_snapshot(ctx: &Context, max_actions: usize, max_warnings: usize) -> SyncSnapshot {
    let (actions, warnings, deopped) = {
        let log = ctx.moderation.read().await;
        (
            log.recent_actions(max_actions),
            log.recent_warnings(max_warnings),
            log.deopped()
                .iter()
                .map(|(id, d)| (*id, d.clone()))
                .collect(),
        )
    };
    let custom_commands = ctx.commands.read().await.snapshot();
    let stats = StatsUpdate::from(&*ctx.stats.read().await);

    SyncSnapshot {
        actions,
        warnings,
        deopped,
        custom_commands,
        stats: Some(stats),
        timestamp: Utc::now(),
    }
}

/// Handle an inbound sync body
pub async fn ingest(ctx: &Context, body: &[u8]) -> SyncResponse {
    if ctx.is_active_instance() {
        tracing::debug!("Active instance, skipping sync ingest");
        crate::metrics::record_sync_ingest(SyncStatus::ActiveSkip.as_str());
        return SyncResponse::active_skip();
    }

    let snapshot: SyncSnapshot = match serde_json::from_slice(body) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Sync error: malformed payload");
            crate::metrics::record_sync_ingest(SyncStatus::Error.as_str());
            return SyncResponse::error(format!("malformed payload: {e}"));
        }
    };

    let response = apply_snapshot(ctx, snapshot).await;
    crate::metrics::record_sync_ingest(response.status.as_str());
    response
}

/// Merge a parsed snapshot into a STANDBY instance
async fn apply_snapshot(ctx: &Context, snapshot: SyncSnapshot) -> SyncResponse {
    let SyncSnapshot {
        actions,
        warnings,
        deopped,
        custom_commands,
        stats,
        timestamp,
    } = snapshot;

    let report = ctx.commands.write().await.merge_from_peer(custom_commands);
    if let Some(update) = &stats {
        ctx.stats.write().await.apply(update);
    }
    *ctx.peer_mirror.write().await = Some(PeerMirror {
        actions,
        warnings,
        deopped,
        peer_timestamp: timestamp,
        received_at: Utc::now(),
    });

    tracing::debug!(
        inserted = report.inserted.len(),
        skipped = report.skipped,
        "Sync ingest applied"
    );

    SyncResponse {
        inserted: report.inserted,
        ..SyncResponse::new(SyncStatus::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::role::{Role, RoleCoordinator};
    use crate::models::Stats;
    use crate::moderation::LogLimits;
    use crate::platform::LogOnlyPlatform;
    use std::sync::Arc;

    fn context(role: Role) -> Context {
        let coord = Arc::new(RoleCoordinator::new(role, Arc::new(LogOnlyPlatform)));
        Context::new(coord, LogLimits::default())
    }

    fn payload_with_command(name: &str, description: &str) -> Vec<u8> {
        let mut snapshot = SyncSnapshot {
            actions: vec![],
            warnings: vec![],
            deopped: BTreeMap::new(),
            custom_commands: BTreeMap::new(),
            stats: Some(StatsUpdate::from(&Stats {
                bans: 9,
                ..Stats::default()
            })),
            timestamp: Utc::now(),
        };
        snapshot.custom_commands.insert(
            name.to_string(),
            CustomCommand::new(name, description, "body", 1),
        );
        serde_json::to_vec(&snapshot).unwrap()
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&SyncStatus::ActiveSkip).unwrap(), "\"active_skip\"");
        assert_eq!(SyncStatus::Success.to_string(), "success");
    }

    #[tokio::test]
    async fn test_active_instance_refuses() {
        let ctx = context(Role::Primary);
        let response = ingest(&ctx, &payload_with_command("foo", "peer")).await;

        assert_eq!(response.status, SyncStatus::ActiveSkip);
        assert_eq!(ctx.custom_command_count().await, 0);
        assert_eq!(ctx.stats().await, Stats::default());
        assert!(ctx.peer_mirror.read().await.is_none());
    }

    #[tokio::test]
    async fn test_standby_merges_first_writer_wins() {
        let ctx = context(Role::Secondary);

        let first = ingest(&ctx, &payload_with_command("foo", "original")).await;
        assert_eq!(first.status, SyncStatus::Success);
        assert_eq!(first.inserted, vec!["foo".to_string()]);

        let second = ingest(&ctx, &payload_with_command("foo", "replacement")).await;
        assert_eq!(second.status, SyncStatus::Success);
        assert!(second.inserted.is_empty());

        let commands = ctx.commands.read().await;
        assert_eq!(commands.len(), 1);
        assert_eq!(commands.get("foo").unwrap().description, "original");
    }

    #[tokio::test]
    async fn test_standby_overrides_counters() {
        let ctx = context(Role::Secondary);
        ctx.count_command().await;
        ctx.count_command().await;

        ingest(&ctx, &payload_with_command("foo", "x")).await;

        let stats = ctx.stats().await;
        assert_eq!(stats.bans, 9);
        assert_eq!(stats.commands_used, 0);
    }

    #[tokio::test]
    async fn test_malformed_payload_mutates_nothing() {
        let ctx = context(Role::Secondary);
        ctx.count_command().await;

        let response = ingest(&ctx, b"{\"custom_commands\": 12}").await;
        assert_eq!(response.status, SyncStatus::Error);
        assert!(response.error.is_some());

        let response = ingest(&ctx, b"not json").await;
        assert_eq!(response.status, SyncStatus::Error);

        assert_eq!(ctx.stats().await.commands_used, 1);
        assert!(ctx.peer_mirror.read().await.is_none());
    }

    #[tokio::test]
    async fn test_mirror_holds_peer_history() {
        let peer = context(Role::Primary);
        peer.warn(7, 1, "spam").await;
        peer.deop(8, 1, "abuse").await;
        let snapshot = build_snapshot(&peer, 100, 50).await;

        let ctx = context(Role::Secondary);
        ingest(&ctx, &serde_json::to_vec(&snapshot).unwrap()).await;

        let mirror = ctx.peer_mirror.read().await;
        let mirror = mirror.as_ref().unwrap();
        assert_eq!(mirror.warnings.len(), 1);
        assert!(mirror.deopped.contains_key(&8));

        // Local stores are untouched
        assert!(!ctx.is_deopped(8).await);
        assert!(ctx.user_warnings(7, 10).await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_is_bounded() {
        let ctx = context(Role::Primary);
        for i in 0..20 {
            ctx.warn(i, 1, "w").await;
        }

        let snapshot = build_snapshot(&ctx, 5, 3).await;
        assert_eq!(snapshot.actions.len(), 5);
        assert_eq!(snapshot.warnings.len(), 3);
        assert_eq!(snapshot.warnings[2].user_id, 19);
        assert_eq!(snapshot.stats.as_ref().unwrap().warnings, Some(20));
    }

    #[test]
    fn test_snapshot_accepts_minimal_payload() {
        let snapshot: SyncSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.custom_commands.is_empty());
        assert!(snapshot.stats.is_none());
    }

    #[tokio::test]
    async fn test_missing_stats_keeps_local_counters() {
        let ctx = context(Role::Secondary);
        ctx.count_command().await;
        ctx.count_command().await;
        ctx.stats.write().await.warnings = 1;

        let response = ingest(&ctx, br#"{"custom_commands":{}}"#).await;
        assert_eq!(response.status, SyncStatus::Success);

        let stats = ctx.stats().await;
        assert_eq!(stats.commands_used, 2);
        assert_eq!(stats.warnings, 1);
    }

    #[tokio::test]
    async fn test_partial_stats_override_only_reported_counters() {
        let ctx = context(Role::Secondary);
        ctx.count_command().await;
        ctx.count_command().await;

        let response = ingest(&ctx, br#"{"stats":{"bans":4}}"#).await;
        assert_eq!(response.status, SyncStatus::Success);

        let stats = ctx.stats().await;
        assert_eq!(stats.bans, 4);
        assert_eq!(stats.commands_used, 2);
    }
}
