use crate::agent::Agent;
use crate::context::{ContextDiff, ContextKey, Namespace, ReasoningContext};
use crate::errors::ReasonflowError;
use std::collections::BTreeSet;

/// An agent's declared contract, captured once per step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentContract {
    /// The agent id.
    pub agent_id: String,
    /// Keys that must be non-empty before execution.
    pub preconditions: Vec<String>,
    /// Keys that must be non-empty after execution.
    pub postconditions: Vec<String>,
}

impl AgentContract {
    /// Captures the contract an agent declares.
    #[must_use]
    pub fn of(agent: &dyn Agent) -> Self {
        Self {
            agent_id: agent.agent_id().to_string(),
            preconditions: agent.preconditions(),
            postconditions: agent.postconditions(),
        }
    }

    /// Namespaces the agent may write.
    #[must_use]
    pub fn writable_namespaces(&self) -> BTreeSet<Namespace> {
        declared_namespaces(&self.postconditions)
    }

    /// See [`check_preconditions`].
    ///
    /// # Errors
    ///
    /// Returns `PreconditionViolation` for the first missing key.
    pub fn check_preconditions(&self, ctx: &ReasoningContext) -> Result<(), ReasonflowError> {
        check_preconditions(&self.agent_id, &self.preconditions, ctx)
    }

    /// See [`check_postconditions`].
    ///
    /// # Errors
    ///
    /// Returns `PostconditionViolation` for the first missing key.
    pub fn check_postconditions(&self, ctx: &ReasoningContext) -> Result<(), ReasonflowError> {
        check_postconditions(&self.agent_id, &self.postconditions, ctx)
    }

    /// See [`check_namespace_isolation`].
    ///
    /// # Errors
    ///
    /// Returns `NamespaceViolation` for the first undeclared write.
    pub fn check_isolation(&self, diff: &ContextDiff) -> Result<(), ReasonflowError> {
        check_namespace_isolation(&self.agent_id, &self.postconditions, diff)
    }
}

/// Returns the keys that do not resolve to a non-empty value, in order.
#[must_use]
pub fn missing_keys<'a>(keys: &'a [String], ctx: &ReasoningContext) -> Vec<&'a str> {
    keys.iter()
        .filter(|key| !ctx.has_value(key))
        .map(String::as_str)
        .collect()
}

/// Checks that every required key is populated.
///
/// # Errors
///
/// Returns `PreconditionViolation` naming the first missing key.
pub fn check_preconditions(
    agent_id: &str,
    keys: &[String],
    ctx: &ReasoningContext,
) -> Result<(), ReasonflowError> {
    match missing_keys(keys, ctx).first() {
        Some(key) => Err(ReasonflowError::PreconditionViolation {
            agent_id: agent_id.to_string(),
            key: (*key).to_string(),
        }),
        None => Ok(()),
    }
}

/// Checks that every promised key is populated.
///
/// The agent reporting success does not matter here; only the context does.
///
/// # Errors
///
/// Returns `PostconditionViolation` naming the first missing key.
pub fn check_postconditions(
    agent_id: &str,
    keys: &[String],
    ctx: &ReasoningContext,
) -> Result<(), ReasonflowError> {
    match missing_keys(keys, ctx).first() {
        Some(key) => Err(ReasonflowError::PostconditionViolation {
            agent_id: agent_id.to_string(),
            key: (*key).to_string(),
        }),
        None => Ok(()),
    }
}

/// Collects the namespaces referenced by a list of keys.
///
/// Keys that do not parse, or that point at metadata, contribute nothing.
#[must_use]
pub fn declared_namespaces(keys: &[String]) -> BTreeSet<Namespace> {
    keys.iter()
        .filter_map(|key| ContextKey::parse(key).ok())
        .filter_map(|key| key.namespace())
        .collect()
}

/// Returns the changed keys whose root is not one of `allowed`.
///
/// `version` and `metadata.*` changes are always violations.
#[must_use]
pub fn namespace_violations(diff: &ContextDiff, allowed: &BTreeSet<Namespace>) -> Vec<String> {
    diff.changes
        .keys()
        .filter(|key| {
            let root = key.split('.').next().unwrap_or(key);
            !root
                .parse::<Namespace>()
                .is_ok_and(|ns| allowed.contains(&ns))
        })
        .cloned()
        .collect()
}

/// Fails if the diff touches anything outside the postcondition namespaces.
///
/// # Errors
///
/// Returns `NamespaceViolation` naming the first offending key.
pub fn check_namespace_isolation(
    agent_id: &str,
    postconditions: &[String],
    diff: &ContextDiff,
) -> Result<(), ReasonflowError> {
    let allowed = declared_namespaces(postconditions);
    match namespace_violations(diff, &allowed).into_iter().next() {
        Some(key) => Err(ReasonflowError::NamespaceViolation {
            agent_id: agent_id.to_string(),
            key,
        }),
        None => Ok(()),
    }
}
