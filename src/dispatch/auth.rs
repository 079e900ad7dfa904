//! Authorization predicates for moderation commands

use serde::{Deserialize, Serialize};

use crate::models::UserId;

/// Guild-level permission bits relevant to moderation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub ban_members: bool,
    pub kick_members: bool,
    pub moderate_members: bool,
    pub manage_messages: bool,
}

impl Permissions {
    /// Every moderation permission
    pub fn all() -> Self {
        Self {
            ban_members: true,
            kick_members: true,
            moderate_members: true,
            manage_messages: true,
        }
    }
}

/// A guild member as resolved by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: UserId,
    /// Account name, matched against the admin allow-list
    pub name: String,
    pub display_name: String,
    #[serde(default)]
    pub permissions: Permissions,
    /// Position of the member's highest role; higher outranks lower
    #[serde(default)]
    pub top_role: u32,
}

impl Member {
    pub fn new(id: UserId, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id,
            display_name: name.clone(),
            name,
            permissions: Permissions::default(),
            top_role: 0,
        }
    }

    pub fn with_permissions(mut self, permissions: Permissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_top_role(mut self, position: u32) -> Self {
        self.top_role = position;
        self
    }
}

/// The guild a command was issued in
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guild {
    pub id: u64,
    pub name: String,
    pub owner_id: UserId,
}

/// What a permission check is for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Ban,
    Kick,
    Timeout,
    Warn,
    Cleanup,
    /// Anything else; only admins pass
    General,
}

// ============================================================================
// Predicates
// ============================================================================

/// Admin allow-list, matched case-insensitively by account name
#[derive(Debug, Clone, Default)]
pub struct AdminList {
    names: Vec<String>,
}

impl AdminList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| n.as_ref().trim().to_lowercase())
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    /// Named-admin clause
    pub fn is_named_admin(&self, member: &Member) -> bool {
        let name = member.name.to_lowercase();
        self.names.iter().any(|n| *n == name)
    }

    /// Guild-owner clause
    pub fn is_guild_owner(member: &Member, guild: Option<&Guild>) -> bool {
        guild.is_some_and(|g| g.owner_id == member.id)
    }

    /// Admin if either clause holds
    pub fn is_admin(&self, member: &Member, guild: Option<&Guild>) -> bool {
        let named_admin = self.is_named_admin(member);
        let guild_owner = Self::is_guild_owner(member, guild);
        named_admin || guild_owner
    }

    /// Whether the member may perform `action`
    pub fn has_permission(&self, member: &Member, guild: Option<&Guild>, action: Action) -> bool {
        if self.is_admin(member, guild) {
            return true;
        }

        let perms = member.permissions;
        match action {
            Action::Ban => perms.ban_members,
            Action::Kick => perms.kick_members,
            Action::Timeout => perms.moderate_members,
            Action::Warn => true,
            Action::Cleanup => perms.manage_messages,
            Action::General => false,
        }
    }
}
