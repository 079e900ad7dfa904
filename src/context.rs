//! Shared instance context
//!
//! One [`Context`] per process holds every in-memory store plus the role
//! coordinator. It is cloned into each HTTP handler, the health loop and
//! the command dispatcher; there is no ambient global state.
//!
//! Lock order when more than one store is needed:
//! moderation → commands → stats → peer mirror.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::coordinator::role::{Role, RoleCoordinator};
use crate::coordinator::sync::PeerMirror;
use crate::dispatch::BUILTIN_COMMANDS;
use crate::models::{
    ActionKind, CustomCommand, DeoppedUser, ModerationAction, Stats, UserId, Warning,
};
use crate::moderation::{LogLimits, ModerationLog};
use crate::registry::{CommandCall, CustomCommandRegistry, Invoked, RegistryError};

// ============================================================================
// Upstream Status
// ============================================================================

const NO_LATENCY: u64 = u64::MAX;

/// Gateway connectivity as reported by the messaging layer
#[derive(Debug)]
pub struct UpstreamStatus {
    connected: AtomicBool,
    guild_count: AtomicUsize,
    latency_ms: AtomicU64,
}

impl Default for UpstreamStatus {
    fn default() -> Self {
        Self {
            connected: AtomicBool::new(false),
            guild_count: AtomicUsize::new(0),
            latency_ms: AtomicU64::new(NO_LATENCY),
        }
    }
}

impl UpstreamStatus {
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn set_guild_count(&self, count: usize) {
        self.guild_count.store(count, Ordering::SeqCst);
    }

    pub fn guild_count(&self) -> usize {
        self.guild_count.load(Ordering::SeqCst)
    }

    pub fn set_latency_ms(&self, latency: Option<u64>) {
        self.latency_ms
            .store(latency.unwrap_or(NO_LATENCY), Ordering::SeqCst);
    }

    /// Gateway latency, only while connected
    pub fn latency_ms(&self) -> Option<u64> {
        if !self.is_connected() {
            return None;
        }
        match self.latency_ms.load(Ordering::SeqCst) {
            NO_LATENCY => None,
            ms => Some(ms),
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// Explicit per-instance state
#[derive(Clone)]
pub struct Context {
    pub role: Arc<RoleCoordinator>,
    pub moderation: Arc<RwLock<ModerationLog>>,
    pub commands: Arc<RwLock<CustomCommandRegistry>>,
    pub stats: Arc<RwLock<Stats>>,
    pub peer_mirror: Arc<RwLock<Option<PeerMirror>>>,
    pub upstream: Arc<UpstreamStatus>,
    pub started_at: DateTime<Utc>,
}

impl Context {
    /// Create a fresh context with empty stores
    pub fn new(role: Arc<RoleCoordinator>, limits: LogLimits) -> Self {
        Self {
            role,
            moderation: Arc::new(RwLock::new(ModerationLog::new(limits))),
            commands: Arc::new(RwLock::new(CustomCommandRegistry::new(BUILTIN_COMMANDS))),
            stats: Arc::new(RwLock::new(Stats::default())),
            peer_mirror: Arc::new(RwLock::new(None)),
            upstream: Arc::new(UpstreamStatus::default()),
            started_at: Utc::now(),
        }
    }

    /// Fixed role of this instance
    pub fn role(&self) -> Role {
        self.role.role()
    }

    /// Command admission gate
    pub fn is_active_instance(&self) -> bool {
        self.role.is_active()
    }

    /// Seconds since the context was created
    pub fn uptime_secs(&self) -> f64 {
        (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    // ------------------------------------------------------------------------
    // Moderation
    // ------------------------------------------------------------------------

    /// Append an action and count it
    pub async fn record_action(&self, action: ModerationAction) {
        let kind = action.kind;
        self.moderation.write().await.log_action(action);
        self.stats.write().await.record(kind);
        crate::metrics::record_moderation_action(kind.as_str());
    }

    /// Issue a warning and log the matching action
    pub async fn warn(&self, user: UserId, moderator: UserId, reason: &str) -> Warning {
        let warning = {
            let mut log = self.moderation.write().await;
            let warning = log.add_warning(user, moderator, reason);
            log.log_action(ModerationAction::new(user, moderator, ActionKind::Warn, reason));
            warning
        };
        self.stats.write().await.record(ActionKind::Warn);
        crate::metrics::record_moderation_action(ActionKind::Warn.as_str());
        warning
    }

    /// Revoke a user's privileges and log the matching action
    pub async fn deop(&self, user: UserId, moderator: UserId, reason: &str) -> DeoppedUser {
        let record = {
            let mut log = self.moderation.write().await;
            let record = log.deop(user, moderator, reason);
            log.log_action(ModerationAction::new(user, moderator, ActionKind::Deop, reason));
            record
        };
        self.stats.write().await.record(ActionKind::Deop);
        crate::metrics::record_moderation_action(ActionKind::Deop.as_str());
        record
    }

    /// Restore a user's privileges
    pub async fn reop(&self, user: UserId) -> Option<DeoppedUser> {
        self.moderation.write().await.reop(user)
    }

    pub async fn is_deopped(&self, user: UserId) -> bool {
        self.moderation.read().await.is_deopped(user)
    }

    pub async fn user_warnings(&self, user: UserId, limit: usize) -> Vec<Warning> {
        self.moderation.read().await.user_warnings(user, limit)
    }

    pub async fn user_actions(&self, user: UserId, limit: usize) -> Vec<ModerationAction> {
        self.moderation.read().await.user_actions(user, limit)
    }

    /// Bulk-clear warnings; the next id is 1 again
    pub async fn clear_warnings(&self) -> usize {
        self.moderation.write().await.clear_warnings()
    }

    // ------------------------------------------------------------------------
    // Custom commands
    // ------------------------------------------------------------------------

    pub async fn add_custom_command(&self, command: CustomCommand) -> Result<(), RegistryError> {
        self.commands.write().await.add(command)
    }

    pub async fn remove_custom_command(&self, name: &str) -> Result<CustomCommand, RegistryError> {
        self.commands.write().await.remove(name)
    }

    /// Run a custom command if one exists under this name
    pub async fn invoke_custom(&self, name: &str, call: &CommandCall<'_>) -> Option<Invoked> {
        let invoked = self.commands.write().await.invoke(name, call)?;
        self.stats.write().await.custom_commands_used += 1;
        Some(invoked)
    }

    pub async fn custom_command_count(&self) -> usize {
        self.commands.read().await.len()
    }

    // ------------------------------------------------------------------------
    // Counters
    // ------------------------------------------------------------------------

    /// Count one dispatched command
    pub async fn count_command(&self) {
        self.stats.write().await.commands_used += 1;
    }

    /// Copy of the counters
    pub async fn stats(&self) -> Stats {
        self.stats.read().await.clone()
    }
}
