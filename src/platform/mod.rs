//! Messaging-platform boundary
//!
//! The chat gateway itself lives outside this crate. These traits are the
//! seam through which enforcement and presence updates leave the process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::UserId;

/// Result type for platform operations
pub type PlatformResult<T> = Result<T, PlatformError>;

/// Errors reported by the messaging platform
#[derive(Debug, Clone, thiserror::Error)]
pub enum PlatformError {
    /// The bot lacks the permission for this operation
    #[error("Missing permissions: {0}")]
    Forbidden(String),

    /// Target user is not in the guild
    #[error("Member not found: {0}")]
    MemberNotFound(UserId),

    /// Gateway not connected
    #[error("Platform unavailable: {0}")]
    Unavailable(String),

    /// Generic error
    #[error("Platform error: {0}")]
    Other(String),
}

// ============================================================================
// Presence
// ============================================================================

/// Online status shown next to the bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceStatus {
    Online,
    Idle,
}

/// Presence published on activity transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub status: PresenceStatus,
    pub activity: String,
}

impl Presence {
    /// Presence of an instance that serves commands
    pub fn serving(role: impl fmt::Display) -> Self {
        Self {
            status: PresenceStatus::Online,
            activity: format!("for violations | {role} ACTIVE"),
        }
    }

    /// Presence of an instance on standby
    pub fn standby(role: impl fmt::Display) -> Self {
        Self {
            status: PresenceStatus::Idle,
            activity: format!("in standby | {role} BACKUP"),
        }
    }
}

/// Receives presence updates
#[async_trait]
pub trait PresenceSink: Send + Sync {
    /// Publish the new presence
    async fn set_presence(&self, presence: Presence) -> PlatformResult<()>;
}

// ============================================================================
// Enforcement
// ============================================================================

/// Enforcement calls into the messaging platform
#[async_trait]
pub trait ModerationPlatform: Send + Sync {
    /// Ban a member
    async fn ban(&self, user: UserId, reason: &str) -> PlatformResult<()>;

    /// Kick a member
    async fn kick(&self, user: UserId, reason: &str) -> PlatformResult<()>;

    /// Time a member out
    async fn timeout(&self, user: UserId, minutes: u32, reason: &str) -> PlatformResult<()>;

    /// Delete recent messages in the current channel
    async fn purge(&self, channel: Option<u64>, amount: u32) -> PlatformResult<u32>;
}

/// Platform that only logs what it would have done
///
/// Used when the process runs without a gateway attached, and in tests.
#[derive(Debug, Default, Clone)]
pub struct LogOnlyPlatform;

#[async_trait]
impl PresenceSink for LogOnlyPlatform {
    async fn set_presence(&self, presence: Presence) -> PlatformResult<()> {
        tracing::info!(status = ?presence.status, activity = %presence.activity, "Presence updated");
        Ok(())
    }
}

#[async_trait]
impl ModerationPlatform for LogOnlyPlatform {
    async fn ban(&self, user: UserId, reason: &str) -> PlatformResult<()> {
        tracing::info!(user, reason, "ban");
        Ok(())
    }

    async fn kick(&self, user: UserId, reason: &str) -> PlatformResult<()> {
        tracing::info!(user, reason, "kick");
        Ok(())
    }

    async fn timeout(&self, user: UserId, minutes: u32, reason: &str) -> PlatformResult<()> {
        tracing::info!(user, minutes, reason, "timeout");
        Ok(())
    }

    async fn purge(&self, channel: Option<u64>, amount: u32) -> PlatformResult<u32> {
        tracing::info!(?channel, amount, "purge");
        Ok(amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presence_text() {
        let active = Presence::serving("secondary");
        assert_eq!(active.status, PresenceStatus::Online);
        assert_eq!(active.activity, "for violations | secondary ACTIVE");

        let standby = Presence::standby("primary");
        assert_eq!(standby.status, PresenceStatus::Idle);
        assert_eq!(standby.activity, "in standby | primary BACKUP");
    }

    #[tokio::test]
    async fn test_log_only_platform() {
        let platform = LogOnlyPlatform;
        assert!(platform.ban(1, "spam").await.is_ok());
        assert_eq!(platform.purge(None, 5).await.unwrap(), 5);
        assert!(platform.set_presence(Presence::serving("primary")).await.is_ok());
    }
}
