//! Integration tests module
//!
//! End-to-end tests for the banbot coordinator:
//! - Control-plane endpoints and the sync ingest guard
//! - Failover between two instances
//! - Error handling and recovery scenarios

pub mod control_plane_test;
pub mod error_scenarios;
pub mod failover_test;
pub mod fixtures;
