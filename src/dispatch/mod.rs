//! Command dispatch
//!
//! Entry point for chat commands handed over by the gateway layer. Lookup
//! order is custom commands first, then built-ins. A STANDBY instance
//! returns no reply and touches nothing; only the ACTIVE instance of the
//! pair answers.

pub mod auth;

use serde::Serialize;
use std::sync::Arc;

use crate::context::Context;
use crate::models::{ActionKind, CustomCommand, ModerationAction};
use crate::moderation::{parse_duration, MAX_TIMEOUT_MINUTES};
use crate::platform::{ModerationPlatform, PlatformError};
use crate::registry::{CommandCall, RegistryError};

pub use auth::{Action, AdminList, Guild, Member, Permissions};

/// Names owned by built-in commands; custom commands cannot use them
pub const BUILTIN_COMMANDS: &[&str] = &[
    "help", "h", "ping", "stats", "hastatus", "ban", "kick", "timeout", "warn", "warnings",
    "deop", "reop", "cleanup", "addcmd", "delcmd", "listcmds",
];

const DEFAULT_REASON: &str = "No reason provided";
const DEFAULT_CLEANUP: u32 = 10;
const MAX_CLEANUP: u32 = 100;
const LIST_LIMIT: usize = 10;
const WARNINGS_SHOWN: usize = 5;

// ============================================================================
// Invocation / Reply
// ============================================================================

/// A parsed command as delivered by the gateway
#[derive(Debug, Clone)]
pub struct Invocation {
    pub author: Member,
    /// `None` for direct messages
    pub guild: Option<Guild>,
    pub channel_id: Option<u64>,
    /// Command name without prefix
    pub command: String,
    /// Member resolved from the first mention, if any
    pub target: Option<Member>,
    /// Remaining arguments, mention excluded
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(author: Member, command: impl Into<String>) -> Self {
        Self {
            author,
            guild: None,
            channel_id: None,
            command: command.into(),
            target: None,
            args: Vec::new(),
        }
    }

    pub fn in_guild(mut self, guild: Guild) -> Self {
        self.guild = Some(guild);
        self
    }

    pub fn in_channel(mut self, channel_id: u64) -> Self {
        self.channel_id = Some(channel_id);
        self
    }

    pub fn with_target(mut self, target: Member) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Arguments joined from `skip` onward, or the default reason
    fn reason(&self, skip: usize) -> String {
        let joined = self.args.iter().skip(skip).cloned().collect::<Vec<_>>().join(" ");
        if joined.trim().is_empty() {
            DEFAULT_REASON.to_string()
        } else {
            joined
        }
    }
}

/// Reply colour class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Success,
    Info,
    Warning,
    Error,
}

/// Message sent back to the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub tone: Tone,
    pub title: String,
    pub lines: Vec<String>,
}

impl Reply {
    pub fn new(tone: Tone, title: impl Into<String>) -> Self {
        Self {
            tone,
            title: title.into(),
            lines: Vec::new(),
        }
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(Tone::Error, title)
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Title followed by the lines
    pub fn text(&self) -> String {
        std::iter::once(self.title.as_str())
            .chain(self.lines.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Routes commands to custom or built-in handlers
pub struct CommandDispatcher {
    ctx: Context,
    platform: Arc<dyn ModerationPlatform>,
    admins: AdminList,
    max_timeout_minutes: u32,
}

impl CommandDispatcher {
    pub fn new(ctx: Context, platform: Arc<dyn ModerationPlatform>, admins: AdminList) -> Self {
        Self {
            ctx,
            platform,
            admins,
            max_timeout_minutes: MAX_TIMEOUT_MINUTES,
        }
    }

    /// Lower the timeout cap below the platform maximum
    pub fn with_max_timeout(mut self, minutes: u32) -> Self {
        self.max_timeout_minutes = minutes.min(MAX_TIMEOUT_MINUTES);
        self
    }

    pub fn max_timeout_minutes(&self) -> u32 {
        self.max_timeout_minutes
    }

    pub fn is_admin(&self, member: &Member, guild: Option<&Guild>) -> bool {
        self.admins.is_admin(member, guild)
    }

    /// Active, not deopped, in a guild, and permitted
    pub async fn is_authorized(&self, inv: &Invocation, action: Action) -> bool {
        self.ctx.is_active_instance()
            && !self.ctx.is_deopped(inv.author.id).await
            && inv.guild.is_some()
            && self
                .admins
                .has_permission(&inv.author, inv.guild.as_ref(), action)
    }

    /// Handle one command. `None` means nothing is sent back.
    pub async fn dispatch(&self, inv: &Invocation) -> Option<Reply> {
        if !self.ctx.is_active_instance() {
            return None;
        }

        self.ctx.count_command().await;
        let name = inv.command.trim().to_lowercase();

        let call = CommandCall {
            user: &inv.author.display_name,
            guild: inv.guild.as_ref().map(|g| g.name.as_str()),
            args: &inv.args,
        };
        if let Some(invoked) = self.ctx.invoke_custom(&name, &call).await {
            return Some(Reply::new(Tone::Info, invoked.response));
        }

        let reply = match name.as_str() {
            "help" | "h" => self.help(),
            "ping" => self.ping(),
            "stats" => self.stats().await,
            "hastatus" => self.hastatus().await,
            "ban" => self.ban_or_kick(inv, ActionKind::Ban).await,
            "kick" => self.ban_or_kick(inv, ActionKind::Kick).await,
            "timeout" => self.timeout(inv).await,
            "warn" => self.warn(inv).await,
            "warnings" => self.warnings(inv).await,
            "deop" => self.deop(inv).await,
            "reop" => self.reop(inv).await,
            "cleanup" => self.cleanup(inv).await,
            "addcmd" => self.add_command(inv).await,
            "delcmd" => self.delete_command(inv).await,
            "listcmds" => self.list_commands().await,
            _ => {
                tracing::debug!(command = %name, "Unknown command");
                return None;
            }
        };

        Some(reply)
    }

    fn instance_label(&self) -> String {
        format!(
            "{} {}",
            self.ctx.role().as_str().to_uppercase(),
            self.ctx.role.activity().label()
        )
    }

    // ------------------------------------------------------------------------
    // Info
    // ------------------------------------------------------------------------

    fn help(&self) -> Reply {
        Reply::new(Tone::Info, "BanBot HA Commands")
            .line(format!("Instance: {}", self.instance_label()))
            .line("Moderation: ban, kick, timeout <1m|1h|1d>, warn, deop, reop")
            .line("Info: stats, warnings, hastatus, ping, cleanup [1-100]")
            .line("Custom: addcmd <name> <description> <response>, delcmd <name>, listcmds")
    }

    fn ping(&self) -> Reply {
        let latency = match self.ctx.upstream.latency_ms() {
            Some(ms) => format!("{ms}ms"),
            None => "n/a".to_string(),
        };
        Reply::new(Tone::Success, "Pong!")
            .line(format!("Instance: {}", self.instance_label()))
            .line(format!("Latency: {latency}"))
    }

    async fn stats(&self) -> Reply {
        let stats = self.ctx.stats().await;
        let uptime = format_uptime(self.ctx.uptime_secs());

        Reply::new(Tone::Info, "BanBot HA Stats")
            .line(format!("Instance: {}", self.instance_label()))
            .line(format!("Uptime: {uptime}"))
            .line(format!("Guilds: {}", self.ctx.upstream.guild_count()))
            .line(format!("Commands: {}", stats.commands_used))
            .line(format!(
                "Bans: {} | Kicks: {} | Timeouts: {} | Warnings: {} | Deops: {}",
                stats.bans, stats.kicks, stats.timeouts, stats.warnings, stats.deops
            ))
            .line(format!(
                "Custom commands: {} ({} uses)",
                self.ctx.custom_command_count().await,
                stats.custom_commands_used
            ))
    }

    async fn hastatus(&self) -> Reply {
        let ready = if self.ctx.upstream.is_connected() { "yes" } else { "no" };
        Reply::new(Tone::Info, "HA Status")
            .line(format!("This instance: {}", self.instance_label()))
            .line(format!("Gateway ready: {ready}"))
            .line(format!("Transitions: {}", self.ctx.role.transition_count()))
            .line(format!("Uptime: {}", format_uptime(self.ctx.uptime_secs())))
            .line(format!(
                "Custom commands: {}",
                self.ctx.custom_command_count().await
            ))
    }

    // ------------------------------------------------------------------------
    // Enforcement
    // ------------------------------------------------------------------------

    /// Self-targets and equal-or-higher roles are off limits for non-admins
    fn invalid_target(&self, inv: &Invocation, target: &Member) -> bool {
        target.id == inv.author.id
            || (target.top_role >= inv.author.top_role
                && !self.is_admin(&inv.author, inv.guild.as_ref()))
    }

    async fn ban_or_kick(&self, inv: &Invocation, kind: ActionKind) -> Reply {
        let action = if kind == ActionKind::Ban { Action::Ban } else { Action::Kick };
        if !self.is_authorized(inv, action).await {
            return Reply::error("Access Denied");
        }
        let Some(target) = &inv.target else {
            return Reply::error("Member Not Found");
        };
        if self.invalid_target(inv, target) {
            return Reply::error("Invalid Target");
        }

        let reason = inv.reason(0);
        let platform_reason = format!("By {}: {}", inv.author.name, reason);
        let result = match kind {
            ActionKind::Ban => self.platform.ban(target.id, &platform_reason).await,
            _ => self.platform.kick(target.id, &platform_reason).await,
        };
        if let Err(e) = result {
            return platform_failure(e);
        }

        self.ctx
            .record_action(ModerationAction::new(target.id, inv.author.id, kind, reason.clone()))
            .await;

        let title = if kind == ActionKind::Ban { "User Banned" } else { "User Kicked" };
        Reply::new(Tone::Warning, title)
            .line(format!("User: {}", target.display_name))
            .line(format!("By: {}", inv.author.display_name))
            .line(format!("Reason: {reason}"))
    }

    async fn timeout(&self, inv: &Invocation) -> Reply {
        if !self.is_authorized(inv, Action::Timeout).await {
            return Reply::error("Access Denied");
        }
        let Some(target) = &inv.target else {
            return Reply::error("Member Not Found");
        };
        let Some(raw) = inv.args.first() else {
            return Reply::error("Invalid Duration").line("Use format: 1m, 1h, 1d");
        };

        let minutes = match parse_duration(raw) {
            Ok(m) if m > self.max_timeout_minutes => {
                return Reply::error("Duration Too Long")
                    .line(format!("Max {} minutes", self.max_timeout_minutes));
            }
            Ok(m) => m,
            Err(e) => return Reply::error("Invalid Duration").line(e.to_string()),
        };

        let reason = inv.reason(1);
        let platform_reason = format!("By {}: {}", inv.author.name, reason);
        if let Err(e) = self
            .platform
            .timeout(target.id, minutes, &platform_reason)
            .await
        {
            return platform_failure(e);
        }

        self.ctx
            .record_action(
                ModerationAction::new(target.id, inv.author.id, ActionKind::Timeout, reason.clone())
                    .with_duration(minutes),
            )
            .await;

        Reply::new(Tone::Warning, "User Timed Out")
            .line(format!("User: {}", target.display_name))
            .line(format!("Duration: {raw}"))
            .line(format!("Reason: {reason}"))
    }

    async fn warn(&self, inv: &Invocation) -> Reply {
        if !self.is_authorized(inv, Action::Warn).await {
            return Reply::error("Access Denied");
        }
        let Some(target) = &inv.target else {
            return Reply::error("Member Not Found");
        };
        if target.id == inv.author.id {
            return Reply::error("Can't warn yourself");
        }

        let reason = inv.reason(0);
        let warning = self.ctx.warn(target.id, inv.author.id, &reason).await;
        let total = self.ctx.user_warnings(target.id, LIST_LIMIT).await.len();

        Reply::new(Tone::Warning, "User Warned")
            .line(format!("User: {}", target.display_name))
            .line(format!("Warning #{} (Total: {total})", warning.id))
            .line(format!("Reason: {reason}"))
    }

    async fn warnings(&self, inv: &Invocation) -> Reply {
        let member = inv.target.as_ref().unwrap_or(&inv.author);
        let warnings = self.ctx.user_warnings(member.id, LIST_LIMIT).await;

        let mut reply = Reply::new(Tone::Warning, format!("Warnings for {}", member.display_name));
        if warnings.is_empty() {
            return reply.line("No warnings found");
        }

        reply = reply.line(format!("Total: {}", warnings.len()));
        for w in warnings.iter().take(WARNINGS_SHOWN) {
            reply = reply.line(format!(
                "#{}: {} ({})",
                w.id,
                w.reason,
                w.timestamp.format("%Y-%m-%d")
            ));
        }
        reply
    }

    async fn deop(&self, inv: &Invocation) -> Reply {
        if !self.is_admin(&inv.author, inv.guild.as_ref()) {
            return Reply::error("Admin Only");
        }
        let Some(target) = &inv.target else {
            return Reply::error("Member Not Found");
        };
        if target.id == inv.author.id {
            return Reply::error("Can't deop yourself");
        }

        let reason = inv.reason(0);
        self.ctx.deop(target.id, inv.author.id, &reason).await;

        Reply::new(Tone::Error, "User Deopped")
            .line(format!("User: {}", target.display_name))
            .line(format!("By: {}", inv.author.display_name))
            .line(format!("Reason: {reason}"))
    }

    async fn reop(&self, inv: &Invocation) -> Reply {
        if !self.is_admin(&inv.author, inv.guild.as_ref()) {
            return Reply::error("Admin Only");
        }
        let Some(target) = &inv.target else {
            return Reply::error("Member Not Found");
        };
        if self.ctx.reop(target.id).await.is_none() {
            return Reply::error("User not deopped");
        }

        Reply::new(Tone::Success, "User Reopped")
            .line(format!("User: {}", target.display_name))
            .line(format!("By: {}", inv.author.display_name))
    }

    async fn cleanup(&self, inv: &Invocation) -> Reply {
        if !self.is_authorized(inv, Action::Cleanup).await {
            return Reply::error("Access Denied");
        }

        let amount = match inv.args.first() {
            None => DEFAULT_CLEANUP,
            Some(raw) => match raw.parse::<u32>() {
                Ok(n) => n,
                Err(_) => return Reply::error("Amount 1-100 only"),
            },
        };
        if !(1..=MAX_CLEANUP).contains(&amount) {
            return Reply::error("Amount 1-100 only");
        }

        match self.platform.purge(inv.channel_id, amount).await {
            Ok(deleted) => {
                Reply::new(Tone::Success, "Cleanup").line(format!("Deleted {deleted} messages"))
            }
            Err(e) => platform_failure(e),
        }
    }

    // ------------------------------------------------------------------------
    // Custom commands
    // ------------------------------------------------------------------------

    async fn add_command(&self, inv: &Invocation) -> Reply {
        if !self.is_admin(&inv.author, inv.guild.as_ref()) {
            return Reply::error("Admin Only");
        }
        if inv.args.len() < 3 {
            return Reply::error("Usage").line("addcmd <name> <description> <response>");
        }

        let response = inv.args[2..].join(" ");
        let command = CustomCommand::new(
            inv.args[0].as_str(),
            inv.args[1].as_str(),
            response.as_str(),
            inv.author.id,
        );

        match self.ctx.add_custom_command(command).await {
            Ok(()) => {
                let preview: String = response.chars().take(100).collect();
                let preview = if response.chars().count() > 100 {
                    format!("{preview}...")
                } else {
                    preview
                };
                Reply::new(Tone::Success, "Custom Command Added")
                    .line(format!("Name: {}", inv.args[0].to_lowercase()))
                    .line(format!("Description: {}", inv.args[1]))
                    .line(format!("Response Preview: {preview}"))
                    .line("Use placeholders: {user}, {guild}, {args}")
            }
            Err(e @ RegistryError::Reserved(_)) => {
                Reply::error("Reserved Name").line(e.to_string())
            }
            Err(e @ RegistryError::InvalidName(_)) => Reply::error("Invalid Name")
                .line(e.to_string())
                .line("Names are a single word"),
            Err(e) => Reply::error("Command already exists").line(e.to_string()),
        }
    }

    async fn delete_command(&self, inv: &Invocation) -> Reply {
        if !self.is_admin(&inv.author, inv.guild.as_ref()) {
            return Reply::error("Admin Only");
        }
        let Some(name) = inv.args.first() else {
            return Reply::error("Usage").line("delcmd <name>");
        };

        match self.ctx.remove_custom_command(name).await {
            Ok(removed) => Reply::new(Tone::Warning, "Custom Command Deleted")
                .line(format!("Name: {}", removed.name))
                .line(format!("Usage Count: {}", removed.usage_count)),
            Err(_) => Reply::error("Command not found"),
        }
    }

    async fn list_commands(&self) -> Reply {
        let commands = self.ctx.commands.read().await;
        if commands.is_empty() {
            return Reply::new(Tone::Info, "No Custom Commands")
                .line("No custom commands have been added yet.");
        }

        let total = commands.len();
        let mut reply =
            Reply::new(Tone::Info, "Custom Commands").line(format!("Total: {total} commands"));
        for cmd in commands.list().into_iter().take(LIST_LIMIT) {
            reply = reply.line(format!(
                "{}: {} (uses: {})",
                cmd.name, cmd.description, cmd.usage_count
            ));
        }
        if total > LIST_LIMIT {
            reply = reply.line(format!("Showing {LIST_LIMIT}/{total} commands"));
        }
        reply
    }
}

fn platform_failure(e: PlatformError) -> Reply {
    tracing::warn!(error = %e, "Platform rejected enforcement");
    match e {
        PlatformError::Forbidden(_) => Reply::error("No Permission"),
        PlatformError::MemberNotFound(_) => Reply::error("Member Not Found"),
        other => Reply::error("Platform Error").line(other.to_string()),
    }
}

fn format_uptime(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}d {}h", total / 86_400, (total % 86_400) / 3_600)
}

// ============================================================================
// Tests
// ============================================================================
