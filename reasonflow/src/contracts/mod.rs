//! Contract validation for agent steps.
//!
//! This module provides:
//! - Precondition and postcondition checks against a context
//! - Namespace isolation checks over a before/after diff
//! - A snapshot of an agent's declared contract

mod checks;

pub use checks::{
    check_namespace_isolation, check_postconditions, check_preconditions, declared_namespaces,
    missing_keys, namespace_violations, AgentContract,
};
