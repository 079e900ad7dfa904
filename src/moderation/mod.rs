//! Moderation log
//!
//! In-memory record of enforcement actions, warnings and deopped users.
//! Pure data model: no I/O, no locking. Callers wrap it in whatever
//! synchronization they need (see [`crate::context::Context`]).

pub mod duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::{DeoppedUser, ModerationAction, UserId, Warning};

pub use duration::{parse_duration, DurationError, MAX_TIMEOUT_MINUTES};

/// Default ceiling for the action log
pub const DEFAULT_MAX_ACTIONS: usize = 500;

/// Default number of entries kept after truncation
pub const DEFAULT_RETAINED_ACTIONS: usize = 250;

// ============================================================================
// Log Limits
// ============================================================================

/// Size bounds for the action log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLimits {
    /// Truncation happens once the log grows past this
    pub max_actions: usize,

    /// Suffix length kept after truncation
    pub retained_actions: usize,
}

impl Default for LogLimits {
    fn default() -> Self {
        Self {
            max_actions: DEFAULT_MAX_ACTIONS,
            retained_actions: DEFAULT_RETAINED_ACTIONS,
        }
    }
}

impl LogLimits {
    /// Create limits, clamping the retained size to the ceiling
    pub fn new(max_actions: usize, retained_actions: usize) -> Self {
        Self {
            max_actions,
            retained_actions: retained_actions.min(max_actions),
        }
    }
}

// ============================================================================
// Moderation Log
// ============================================================================

/// Append-only, size-bounded moderation record
#[derive(Debug, Clone)]
pub struct ModerationLog {
    actions: Vec<ModerationAction>,
    warnings: Vec<Warning>,
    deopped: HashMap<UserId, DeoppedUser>,
    next_warning_id: u64,
    limits: LogLimits,
}

impl Default for ModerationLog {
    fn default() -> Self {
        Self::new(LogLimits::default())
    }
}

impl ModerationLog {
    /// Create an empty log
    ///
    /// Limits built by hand or deserialized are clamped the same way
    /// [`LogLimits::new`] clamps them.
    pub fn new(limits: LogLimits) -> Self {
        Self {
            actions: Vec::new(),
            warnings: Vec::new(),
            deopped: HashMap::new(),
            next_warning_id: 1,
            limits: LogLimits::new(limits.max_actions, limits.retained_actions),
        }
    }

    /// Append an action, truncating oldest-first once over the ceiling
    pub fn log_action(&mut self, action: ModerationAction) {
        self.actions.push(action);

        if self.actions.len() > self.limits.max_actions {
            let excess = self.actions.len().saturating_sub(self.limits.retained_actions);
            self.actions.drain(..excess);
            tracing::debug!(
                dropped = excess,
                retained = self.actions.len(),
                "Action log truncated"
            );
        }
    }

    /// Issue a new warning with the next id
    pub fn add_warning(
        &mut self,
        user_id: UserId,
        moderator_id: UserId,
        reason: impl Into<String>,
    ) -> Warning {
        let warning = Warning {
            id: self.next_warning_id,
            user_id,
            moderator_id,
            reason: reason.into(),
            timestamp: Utc::now(),
        };
        self.next_warning_id += 1;
        self.warnings.push(warning.clone());
        warning
    }

    /// Drop every warning and restart ids at 1
    pub fn clear_warnings(&mut self) -> usize {
        let cleared = self.warnings.len();
        self.warnings.clear();
        self.next_warning_id = 1;
        cleared
    }

    /// Id the next warning will receive
    pub fn next_warning_id(&self) -> u64 {
        self.next_warning_id
    }

    /// Most recent warnings for a user, oldest first
    pub fn user_warnings(&self, user_id: UserId, limit: usize) -> Vec<Warning> {
        let matching: Vec<&Warning> = self.warnings.iter().filter(|w| w.user_id == user_id).collect();
        let skip = matching.len().saturating_sub(limit);
        matching.into_iter().skip(skip).cloned().collect()
    }

    /// Most recent actions against a user, newest first
    pub fn user_actions(&self, user_id: UserId, limit: usize) -> Vec<ModerationAction> {
        self.actions
            .iter()
            .rev()
            .filter(|a| a.user_id == user_id)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Revoke privileges; replaces any existing record for the user
    pub fn deop(&mut self, user_id: UserId, deopped_by: UserId, reason: impl Into<String>) -> DeoppedUser {
        let record = DeoppedUser {
            user_id,
            deopped_by,
            reason: reason.into(),
            timestamp: Utc::now(),
        };
        self.deopped.insert(user_id, record.clone());
        record
    }

    /// Restore privileges. Returns the removed record if there was one.
    pub fn reop(&mut self, user_id: UserId) -> Option<DeoppedUser> {
        self.deopped.remove(&user_id)
    }

    /// Check if a user is currently restricted
    pub fn is_deopped(&self, user_id: UserId) -> bool {
        self.deopped.contains_key(&user_id)
    }

    /// The full action log, oldest first
    pub fn actions(&self) -> &[ModerationAction] {
        &self.actions
    }

    /// All warnings, oldest first
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// The deopped-user map
    pub fn deopped(&self) -> &HashMap<UserId, DeoppedUser> {
        &self.deopped
    }

    /// Last `n` actions, oldest first
    pub fn recent_actions(&self, n: usize) -> Vec<ModerationAction> {
        let skip = self.actions.len().saturating_sub(n);
        self.actions[skip..].to_vec()
    }

    /// Last `n` warnings, oldest first
    pub fn recent_warnings(&self, n: usize) -> Vec<Warning> {
        let skip = self.warnings.len().saturating_sub(n);
        self.warnings[skip..].to_vec()
    }

    /// Configured bounds
    pub fn limits(&self) -> LogLimits {
        self.limits
    }
}
