//! High-availability coordinator for a pair of bot instances
//!
//! Each instance runs the same coordinator. A PRIMARY starts ACTIVE, a
//! SECONDARY starts on STANDBY and watches the primary's `/health`. When
//! the primary's heartbeat is older than the grace period, the secondary
//! promotes itself.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────── instance ────────────────┐        ┌──── peer ────┐
//! │                                          │        │              │
//! │  ┌──────────────┐    ┌────────────────┐  │  GET   │              │
//! │  │ HealthMonitor│───►│  PeerClient    │──┼──/health──►           │
//! │  │ check →      │    │  (5s timeout,  │──┼──/sync───►            │
//! │  │ takeover →   │    │   no retries)  │  │  POST  │              │
//! │  │ sync         │    └────────────────┘  │        │              │
//! │  └──────┬───────┘                        │        │              │
//! │         │ become_active                  │        │              │
//! │  ┌──────▼────────┐   ┌────────────────┐  │        │              │
//! │  │RoleCoordinator│   │ Control plane  │◄─┼────────┤ HealthMonitor│
//! │  │ role+activity │   │ /, /health,    │  │        │              │
//! │  └───────────────┘   │ /ping, /stats, │  │        │              │
//! │                      │ /commands,     │  │        │              │
//! │                      │ /history,      │  │        │              │
//! │                      │ /metrics, /sync│  │        │              │
//! │                      └────────────────┘  │        │              │
//! └──────────────────────────────────────────┘        └──────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use banbot::coordinator::{ControlPlaneServer, HaConfig};
//!
//! let server = ControlPlaneServer::new(context, HaConfig::default())?;
//! server.start_with_shutdown(shutdown_signal()).await?;
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod health;
pub mod role;
pub mod server;
pub mod sync;

// Re-export main types
pub use api::HealthReport;
pub use client::{ClientError, PeerClient, PeerClientConfig};
pub use config::{ConfigError, HaConfig};
pub use health::{CycleReport, HealthMonitor, SyncOutcome};
pub use role::{ActivityState, Role, RoleCoordinator};
pub use server::{AppState, ControlPlaneServer, ServerError};
pub use sync::{PeerMirror, SyncResponse, SyncSnapshot, SyncStatus};
