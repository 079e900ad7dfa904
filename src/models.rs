// Core data structures for the moderation service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform user identifier (snowflake)
pub type UserId = u64;

/// Kind of enforcement recorded in the moderation log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Ban,
    Kick,
    Timeout,
    Warn,
    Deop,
}

impl ActionKind {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ban => "ban",
            Self::Kick => "kick",
            Self::Timeout => "timeout",
            Self::Warn => "warn",
            Self::Deop => "deop",
        }
    }

    /// Get all kinds
    pub fn all() -> Vec<Self> {
        vec![Self::Ban, Self::Kick, Self::Timeout, Self::Warn, Self::Deop]
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single enforcement action. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationAction {
    pub user_id: UserId,
    pub moderator_id: UserId,
    #[serde(rename = "action")]
    pub kind: ActionKind,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
    /// Duration in minutes (timeouts only)
    #[serde(default)]
    pub duration: Option<u32>,
}

impl ModerationAction {
    /// Create an action stamped with the current time
    pub fn new(
        user_id: UserId,
        moderator_id: UserId,
        kind: ActionKind,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            moderator_id,
            kind,
            reason: reason.into(),
            timestamp: Utc::now(),
            duration: None,
        }
    }

    /// Attach a duration in minutes
    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration = Some(minutes);
        self
    }
}

/// A warning issued to a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub id: u64,
    pub user_id: UserId,
    pub moderator_id: UserId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// A user whose moderation privileges were revoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeoppedUser {
    pub user_id: UserId,
    pub deopped_by: UserId,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

/// A user-defined command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomCommand {
    pub name: String,
    pub description: String,
    /// Response template; supports `{user}`, `{guild}` and `{args}`
    pub response: String,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub usage_count: u64,
}

impl CustomCommand {
    /// Create a new command with zero usage
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        response: impl Into<String>,
        created_by: UserId,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            response: response.into(),
            created_by,
            created_at: Utc::now(),
            usage_count: 0,
        }
    }

    /// Substitute placeholders in the response template
    pub fn render(&self, user: &str, guild: Option<&str>, args: &[String]) -> String {
        self.response
            .replace("{user}", user)
            .replace("{guild}", guild.unwrap_or("DM"))
            .replace("{args}", &args.join(" "))
    }
}

/// Aggregate counters
///
/// Both instances count independently; a sync overrides the counters the
/// peer reports and leaves the rest alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stats {
    pub bans: u64,
    pub kicks: u64,
    pub timeouts: u64,
    pub warnings: u64,
    pub deops: u64,
    pub commands_used: u64,
    pub custom_commands_used: u64,
}

impl Stats {
    /// Count one enforcement of the given kind
    pub fn record(&mut self, kind: ActionKind) {
        let counter = match kind {
            ActionKind::Ban => &mut self.bans,
            ActionKind::Kick => &mut self.kicks,
            ActionKind::Timeout => &mut self.timeouts,
            ActionKind::Warn => &mut self.warnings,
            ActionKind::Deop => &mut self.deops,
        };
        *counter += 1;
    }

    /// Total enforcement actions counted
    pub fn total_enforcements(&self) -> u64 {
        self.bans + self.kicks + self.timeouts + self.warnings + self.deops
    }

    /// Override every counter present in `update`
    pub fn apply(&mut self, update: &StatsUpdate) {
        let pairs = [
            (&mut self.bans, update.bans),
            (&mut self.kicks, update.kicks),
            (&mut self.timeouts, update.timeouts),
            (&mut self.warnings, update.warnings),
            (&mut self.deops, update.deops),
            (&mut self.commands_used, update.commands_used),
            (&mut self.custom_commands_used, update.custom_commands_used),
        ];
        for (counter, value) in pairs {
            if let Some(v) = value {
                *counter = v;
            }
        }
    }
}

/// Counters as carried by a sync payload; absent keys stay untouched
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatsUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bans: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kicks: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeouts: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warnings: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deops: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commands_used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_commands_used: Option<u64>,
}

impl From<&Stats> for StatsUpdate {
    fn from(stats: &Stats) -> Self {
        Self {
            bans: Some(stats.bans),
            kicks: Some(stats.kicks),
            timeouts: Some(stats.timeouts),
            warnings: Some(stats.warnings),
            deops: Some(stats.deops),
            commands_used: Some(stats.commands_used),
            custom_commands_used: Some(stats.custom_commands_used),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_kind_serialization() {
        let json = serde_json::to_string(&ActionKind::Timeout).unwrap();
        assert_eq!(json, "\"timeout\"");

        let parsed: ActionKind = serde_json::from_str("\"deop\"").unwrap();
        assert_eq!(parsed, ActionKind::Deop);
    }

    #[test]
    fn test_action_wire_field_name() {
        let action = ModerationAction::new(1, 2, ActionKind::Ban, "spam");
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["action"], "ban");
        assert!(value["duration"].is_null());
    }

    #[test]
    fn test_stats_record() {
        let mut stats = Stats::default();
        stats.record(ActionKind::Ban);
        stats.record(ActionKind::Ban);
        stats.record(ActionKind::Warn);

        assert_eq!(stats.bans, 2);
        assert_eq!(stats.warnings, 1);
        assert_eq!(stats.kicks, 0);
        assert_eq!(stats.total_enforcements(), 3);
    }

    #[test]
    fn test_stats_tolerates_missing_and_extra_fields() {
        let stats: Stats =
            serde_json::from_str(r#"{"bans": 4, "start_time": "2024-01-01T00:00:00Z"}"#).unwrap();
        assert_eq!(stats.bans, 4);
        assert_eq!(stats.kicks, 0);
    }

    #[test]
    fn test_stats_apply_overrides_only_present_counters() {
        let mut stats = Stats {
            kicks: 3,
            commands_used: 2,
            ..Stats::default()
        };

        let partial: StatsUpdate = serde_json::from_str(r#"{"bans": 4}"#).unwrap();
        stats.apply(&partial);
        assert_eq!(stats.bans, 4);
        assert_eq!(stats.kicks, 3);
        assert_eq!(stats.commands_used, 2);

        let full = StatsUpdate::from(&Stats::default());
        stats.apply(&full);
        assert_eq!(stats, Stats::default());
    }

    #[test]
    fn test_custom_command_render() {
        let cmd = CustomCommand::new("greet", "Say hi", "Hi {user} in {guild}: {args}", 7);
        let args = vec!["a".to_string(), "b".to_string()];

        assert_eq!(cmd.render("alice", Some("Guild"), &args), "Hi alice in Guild: a b");
        assert_eq!(cmd.render("bob", None, &[]), "Hi bob in DM: ");
    }
}
