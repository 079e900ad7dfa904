//! Configuration management for banbot
//!
//! Loads settings from environment variables or a TOML file and decides
//! this process's role. The role is fixed for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::context::Context;
use crate::coordinator::config::{validate_peer_url, ConfigError, HaConfig};
use crate::coordinator::role::Role;
use crate::dispatch::{AdminList, CommandDispatcher};
use crate::platform::ModerationPlatform;
use crate::moderation::{MAX_TIMEOUT_MINUTES, DEFAULT_MAX_ACTIONS, DEFAULT_RETAINED_ACTIONS};

/// Port a PRIMARY binds when `PORT` is unset
pub const DEFAULT_PRIMARY_PORT: u16 = 5000;

/// Port a SECONDARY binds when `BANBOT_SECONDARY_PORT` is unset
pub const DEFAULT_SECONDARY_PORT: u16 = 5001;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Role, port and peer
    #[serde(default)]
    pub instance: InstanceConfig,

    /// Gateway credentials and admin list
    #[serde(default)]
    pub discord: DiscordConfig,

    /// Failover and replication tuning
    #[serde(default)]
    pub ha: HaSettings,

    /// Moderation limits
    #[serde(default)]
    pub moderation: ModerationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Role assignment for this process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceConfig {
    pub role: Role,
    pub port: u16,
    /// Peer base URL; required for a SECONDARY
    #[serde(default)]
    pub peer_url: Option<String>,
}

impl Default for InstanceConfig {
    fn default() -> Self {
        Self {
            role: Role::Primary,
            port: DEFAULT_PRIMARY_PORT,
            peer_url: None,
        }
    }
}

/// Gateway configuration
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token; never serialized back out
    #[serde(default, skip_serializing)]
    pub token: String,

    /// Account names with admin rights
    #[serde(default)]
    pub admin_users: Vec<String>,
}

impl fmt::Debug for DiscordConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscordConfig")
            .field("token", &if self.token.is_empty() { "<unset>" } else { "<redacted>" })
            .field("admin_users", &self.admin_users)
            .finish()
    }
}

/// Failover and replication tuning
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HaSettings {
    pub heartbeat_interval_secs: u64,
    pub takeover_grace_secs: u64,
    pub peer_timeout_ms: u64,
    pub max_actions: usize,
    pub retained_actions: usize,
    pub sync_action_limit: usize,
    pub sync_warning_limit: usize,
    pub enable_cors: bool,
    pub enable_request_logging: bool,
}

impl Default for HaSettings {
    fn default() -> Self {
        let ha = HaConfig::default();
        Self {
            heartbeat_interval_secs: ha.heartbeat_interval_secs,
            takeover_grace_secs: ha.takeover_grace_secs,
            peer_timeout_ms: ha.peer_timeout_ms,
            max_actions: DEFAULT_MAX_ACTIONS,
            retained_actions: DEFAULT_RETAINED_ACTIONS,
            sync_action_limit: ha.sync_action_limit,
            sync_warning_limit: ha.sync_warning_limit,
            enable_cors: ha.enable_cors,
            enable_request_logging: ha.enable_request_logging,
        }
    }
}

/// Moderation limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    pub max_timeout_days: u32,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            max_timeout_days: 28,
        }
    }
}

impl ModerationConfig {
    pub fn max_timeout_minutes(&self) -> u32 {
        self.max_timeout_days.saturating_mul(24 * 60)
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: String::from("info"),
            format: String::from("text"),
        }
    }
}

impl LoggingConfig {
    /// `EnvFilter` directives for this level; `verbose` forces debug
    pub fn filter_directives(&self, verbose: bool) -> String {
        if verbose {
            String::from("banbot=debug,info")
        } else {
            format!("banbot={},warn", self.level)
        }
    }

    /// Output format, with an explicit override taking precedence
    pub fn effective_format<'a>(&'a self, overridden: Option<&'a str>) -> &'a str {
        overridden.unwrap_or(self.format.as_str())
    }
}

// ============================================================================
// Loading
// ============================================================================

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let instance = determine_role(&get)?;

        let admin_users = get("BANBOT_ADMIN_USERS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let mut ha = HaSettings::default();
        if let Some(v) = get("BANBOT_HEARTBEAT_INTERVAL") {
            ha.heartbeat_interval_secs = parse_var("BANBOT_HEARTBEAT_INTERVAL", &v)?;
        }
        if let Some(v) = get("BANBOT_TAKEOVER_GRACE") {
            ha.takeover_grace_secs = parse_var("BANBOT_TAKEOVER_GRACE", &v)?;
        }
        if let Some(v) = get("BANBOT_PEER_TIMEOUT_MS") {
            ha.peer_timeout_ms = parse_var("BANBOT_PEER_TIMEOUT_MS", &v)?;
        }

        let mut moderation = ModerationConfig::default();
        if let Some(v) = get("BANBOT_MAX_TIMEOUT_DAYS") {
            moderation.max_timeout_days = parse_var("BANBOT_MAX_TIMEOUT_DAYS", &v)?;
        }

        let logging = LoggingConfig {
            level: get("BANBOT_LOG_LEVEL").unwrap_or_else(|| String::from("info")),
            format: get("BANBOT_LOG_FORMAT").unwrap_or_else(|| String::from("text")),
        };

        Ok(Self {
            instance,
            discord: DiscordConfig {
                token: get("DISCORD_TOKEN").unwrap_or_default(),
                admin_users,
            },
            ha,
            moderation,
            logging,
        })
    }

    /// Load configuration from a TOML file
    ///
    /// `DISCORD_TOKEN` from the environment fills in a missing token so the
    /// secret can stay out of the file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;

        let mut config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(format!("{}: {e}", path.display())))?;

        if config.discord.token.is_empty() {
            if let Ok(token) = std::env::var("DISCORD_TOKEN") {
                config.discord.token = token;
            }
        }

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.discord.token.trim().is_empty() {
            return Err(ConfigError::MissingField {
                field: "DISCORD_TOKEN".to_string(),
            });
        }

        match (&self.instance.role, &self.instance.peer_url) {
            (Role::Secondary, None) => {
                return Err(ConfigError::MissingField {
                    field: "peer_url".to_string(),
                });
            }
            (_, Some(url)) => validate_peer_url(url)?,
            _ => {}
        }

        if self.moderation.max_timeout_minutes() == 0
            || self.moderation.max_timeout_minutes() > MAX_TIMEOUT_MINUTES
        {
            return Err(ConfigError::InvalidValue {
                field: "max_timeout_days".to_string(),
                reason: "Must be between 1 and 28 days".to_string(),
            });
        }

        if !matches!(
            self.logging.level.as_str(),
            "trace" | "debug" | "info" | "warn" | "error"
        ) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("Unknown level '{}'", self.logging.level),
            });
        }

        if !matches!(self.logging.format.as_str(), "text" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format".to_string(),
                reason: format!("Unknown format '{}', expected text or json", self.logging.format),
            });
        }

        self.ha_config().map(|_| ())
    }

    /// Coordinator config derived from these settings
    pub fn ha_config(&self) -> Result<HaConfig, ConfigError> {
        let ha = &self.ha;
        let mut builder = HaConfig::builder()
            .bind_address(([0, 0, 0, 0], self.instance.port).into())
            .heartbeat_interval_secs(ha.heartbeat_interval_secs)
            .takeover_grace_secs(ha.takeover_grace_secs)
            .peer_timeout_ms(ha.peer_timeout_ms)
            .action_log(ha.max_actions, ha.retained_actions)
            .sync_limits(ha.sync_action_limit, ha.sync_warning_limit)
            .enable_cors(ha.enable_cors)
            .enable_request_logging(ha.enable_request_logging);

        if let Some(url) = &self.instance.peer_url {
            builder = builder.peer_url(url.as_str());
        }

        builder.build()
    }

    /// Admin allow-list from `discord.admin_users`
    pub fn admin_list(&self) -> AdminList {
        AdminList::new(&self.discord.admin_users)
    }

    /// Command dispatcher carrying the configured admins and timeout cap
    pub fn dispatcher(
        &self,
        ctx: Context,
        platform: Arc<dyn ModerationPlatform>,
    ) -> CommandDispatcher {
        CommandDispatcher::new(ctx, platform, self.admin_list())
            .with_max_timeout(self.moderation.max_timeout_minutes())
    }
}

/// Decide role, port and peer from deployment variables
///
/// - `BANBOT_ROLE` forces the role when set.
/// - Otherwise `RAILWAY_ENVIRONMENT` being set means PRIMARY.
/// - Anything else is a SECONDARY.
fn determine_role<F>(get: &F) -> Result<InstanceConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let role = match get("BANBOT_ROLE") {
        Some(forced) => forced
            .parse::<Role>()
            .map_err(|reason| ConfigError::InvalidValue {
                field: "BANBOT_ROLE".to_string(),
                reason,
            })?,
        None if get("RAILWAY_ENVIRONMENT").is_some() => Role::Primary,
        None => Role::Secondary,
    };

    match role {
        Role::Primary => Ok(InstanceConfig {
            role,
            port: match get("PORT") {
                Some(v) => parse_var("PORT", &v)?,
                None => DEFAULT_PRIMARY_PORT,
            },
            peer_url: get("BANBOT_PEER_URL"),
        }),
        Role::Secondary => Ok(InstanceConfig {
            role,
            port: match get("BANBOT_SECONDARY_PORT") {
                Some(v) => parse_var("BANBOT_SECONDARY_PORT", &v)?,
                None => DEFAULT_SECONDARY_PORT,
            },
            peer_url: get("BANBOT_PEER_URL").or_else(|| get("RAILWAY_URL")),
        }),
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field: key.to_string(),
        reason: format!("cannot parse '{value}'"),
    })
}
