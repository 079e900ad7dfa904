//! banbot - Moderation bot with primary/secondary failover
//!
//! Two instances of the same process share one logical moderation service.
//! The PRIMARY serves commands; the SECONDARY stands by, watches the
//! primary's heartbeat, and takes over when it goes quiet.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Process configuration and role determination
//! - [`models`] - Core data structures (actions, warnings, commands)
//! - [`moderation`] - Bounded moderation log and duration parsing
//! - [`registry`] - Custom command registry
//! - [`platform`] - Messaging-platform seams (enforcement, presence)
//! - [`context`] - Shared state handed to handlers and the health loop
//! - [`dispatch`] - Command gate, authorization and built-in handlers
//! - [`coordinator`] - Role state machine, health monitor, control plane
//! - [`metrics`] - Prometheus metrics
//!
//! # Example
//!
//! ```no_run
//! use banbot::config::Config;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!     println!("running as {}", config.instance.role);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod coordinator;
pub mod dispatch;
pub mod error;
pub mod metrics;
pub mod models;
pub mod moderation;
pub mod platform;
pub mod registry;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::context::Context;
    pub use crate::coordinator::{
        ActivityState, ControlPlaneServer, HaConfig, HealthMonitor, Role, RoleCoordinator,
    };
    pub use crate::dispatch::{CommandDispatcher, Invocation, Reply};
    pub use crate::error::{BanbotErrorTrait, Error, ErrorCategory, Result};
    pub use crate::models::{ActionKind, CustomCommand, ModerationAction, Stats, UserId};
}

// Direct re-exports for convenience
pub use models::{
    ActionKind, CustomCommand, DeoppedUser, ModerationAction, Stats, StatsUpdate, UserId, Warning,
};
