//! Common test utilities

use std::sync::Arc;

use banbot::context::Context;
use banbot::coordinator::{AppState, HaConfig, Role, RoleCoordinator};
use banbot::platform::LogOnlyPlatform;

/// Build a fresh context for the given role
pub fn create_context(role: Role) -> Context {
    let coordinator = Arc::new(RoleCoordinator::new(role, Arc::new(LogOnlyPlatform)));
    Context::new(coordinator, HaConfig::default().log_limits())
}

/// Router state with default coordinator config
#[allow(dead_code)]
pub fn create_state(role: Role) -> AppState {
    AppState::new(create_context(role), HaConfig::default())
}
