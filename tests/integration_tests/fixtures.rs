//! Test fixtures for integration tests
//!
//! Sample wire payloads as a peer would send them

/// Sync body carrying one custom command and peer counters
pub const SYNC_WITH_RULES: &str = r#"{
    "actions": [
        {
            "user_id": 42,
            "moderator_id": 7,
            "action": "ban",
            "reason": "spam",
            "timestamp": "2024-01-15T14:30:00Z"
        }
    ],
    "warnings": [
        {
            "id": 1,
            "user_id": 43,
            "moderator_id": 7,
            "reason": "caps",
            "timestamp": "2024-01-15T14:31:00Z"
        }
    ],
    "deopped": {},
    "custom_commands": {
        "rules": {
            "name": "rules",
            "description": "Server rules",
            "response": "Be nice, {user}",
            "created_by": 7,
            "created_at": "2024-01-15T14:00:00Z",
            "usage_count": 3
        }
    },
    "stats": {
        "bans": 4,
        "kicks": 2,
        "timeouts": 0,
        "warnings": 1,
        "deops": 0,
        "commands_used": 20,
        "custom_commands_used": 3
    },
    "timestamp": "2024-01-15T14:32:00Z"
}"#;

/// Same command name with a different definition
pub const SYNC_WITH_OTHER_RULES: &str = r#"{
    "custom_commands": {
        "rules": {
            "name": "rules",
            "description": "Replaced rules",
            "response": "No rules",
            "created_by": 99,
            "created_at": "2024-02-01T00:00:00Z"
        }
    },
    "timestamp": "2024-02-01T00:00:00Z"
}"#;

/// Not JSON at all
pub const MALFORMED_SYNC: &str = "{ this is not json";

/// Health body reported by a live, active primary
pub fn health_body(last_heartbeat: &str, is_active: bool) -> serde_json::Value {
    serde_json::json!({
        "role": "primary",
        "is_active": is_active,
        "upstream_connected": true,
        "last_heartbeat": last_heartbeat,
        "uptime": 120.5,
        "guild_count": 3,
        "custom_command_count": 1
    })
}
