//! Role and activity state machine
//!
//! Two independent axes:
//!
//! - [`Role`] is fixed at construction and never changes.
//! - [`ActivityState`] flips between ACTIVE and STANDBY. Only an ACTIVE
//!   instance processes commands.
//!
//! Transitions are idempotent: asking for the state the instance is
//! already in does nothing and emits no event.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

use crate::platform::{Presence, PresenceSink};

// ============================================================================
// Role
// ============================================================================

/// Deployment role, assigned once at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Secondary,
}

impl Role {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }

    /// Activity an instance of this role starts in
    pub fn initial_activity(&self) -> ActivityState {
        match self {
            Self::Primary => ActivityState::Active,
            Self::Secondary => ActivityState::Standby,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            other => Err(format!("unknown role '{other}', expected primary or secondary")),
        }
    }
}

// ============================================================================
// Activity
// ============================================================================

/// Whether the instance is serving commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Active,
    Standby,
}

impl ActivityState {
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Active)
    }

    /// Upper-case label used in logs and status text
    pub fn label(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Standby => "STANDBY",
        }
    }
}

impl From<bool> for ActivityState {
    fn from(active: bool) -> Self {
        if active {
            Self::Active
        } else {
            Self::Standby
        }
    }
}

// ============================================================================
// Role Coordinator
// ============================================================================

/// Owns the role and the activity flag
pub struct RoleCoordinator {
    role: Role,
    active: AtomicBool,
    /// Serializes transitions so presence updates land in order
    transition: Mutex<()>,
    transitions: AtomicU64,
    presence: Arc<dyn PresenceSink>,
    changes: watch::Sender<ActivityState>,
}

impl fmt::Debug for RoleCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoleCoordinator")
            .field("role", &self.role)
            .field("activity", &self.activity())
            .field("transitions", &self.transition_count())
            .finish()
    }
}

impl RoleCoordinator {
    /// Create a coordinator in the role's initial activity
    pub fn new(role: Role, presence: Arc<dyn PresenceSink>) -> Self {
        let initial = role.initial_activity();
        let (changes, _) = watch::channel(initial);

        Self {
            role,
            active: AtomicBool::new(initial.is_active()),
            transition: Mutex::new(()),
            transitions: AtomicU64::new(0),
            presence,
            changes,
        }
    }

    /// Fixed role
    pub fn role(&self) -> Role {
        self.role
    }

    /// Current activity
    pub fn activity(&self) -> ActivityState {
        ActivityState::from(self.active.load(Ordering::SeqCst))
    }

    /// Command admission gate
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Number of real transitions since startup
    pub fn transition_count(&self) -> u64 {
        self.transitions.load(Ordering::SeqCst)
    }

    /// Watch activity changes
    pub fn subscribe(&self) -> watch::Receiver<ActivityState> {
        self.changes.subscribe()
    }

    /// Start serving commands. Returns `true` if the state changed.
    pub async fn become_active(&self) -> bool {
        self.transition_to(ActivityState::Active).await
    }

    /// Stop serving commands. Returns `true` if the state changed.
    pub async fn become_standby(&self) -> bool {
        self.transition_to(ActivityState::Standby).await
    }

    /// Publish the presence matching the current activity
    pub async fn announce(&self) {
        let presence = self.presence_for(self.activity());
        if let Err(e) = self.presence.set_presence(presence).await {
            tracing::warn!(error = %e, "Failed to publish presence");
        }
    }

    fn presence_for(&self, state: ActivityState) -> Presence {
        match state {
            ActivityState::Active => Presence::serving(self.role),
            ActivityState::Standby => Presence::standby(self.role),
        }
    }

    async fn transition_to(&self, target: ActivityState) -> bool {
        let _guard = self.transition.lock().await;

        if self.activity() == target {
            return false;
        }

        self.active.store(target.is_active(), Ordering::SeqCst);
        self.transitions.fetch_add(1, Ordering::SeqCst);
        self.changes.send_replace(target);
        crate::metrics::update_activity(target.is_active());

        tracing::info!(
            role = %self.role,
            activity = target.label(),
            "{} becoming {}",
            self.role.as_str().to_uppercase(),
            target.label()
        );

        // The flag already flipped; a presence failure is cosmetic
        if let Err(e) = self.presence.set_presence(self.presence_for(target)).await {
            tracing::warn!(error = %e, "Failed to publish presence after transition");
        }

        true
    }
}
