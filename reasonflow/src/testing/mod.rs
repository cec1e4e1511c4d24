//! Testing utilities for reasonflow pipelines.
//!
//! This module provides:
//! - Mock agents covering success, failure, flakiness and contract breaches
//! - Context and registry fixtures
//! - Assertions over pipeline runs and audit logs

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{
    assert_attempts, assert_key_empty, assert_keys_populated, assert_run_failed,
    assert_run_succeeded, assert_step_status,
};
pub use fixtures::{empty_context, registry_of, seeded_context, EMPTY_SESSION_ID};
pub use mocks::{
    ContractBreakingAgent, FailingAgent, FlakyAgent, PanickingAgent, StubAgent, TrespassingAgent,
};
