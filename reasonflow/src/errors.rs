//! Error types for the reasonflow orchestrator.
//!
//! Configuration problems are reported as [`PipelineValidationError`] and are
//! fatal before a pipeline ever runs. Everything that can go wrong while a run
//! is in flight is a [`ReasonflowError`] variant, classified by [`ErrorKind`]
//! so callers can match on the class instead of the message text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Coarse classification of a [`ReasonflowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The pipeline document is invalid.
    Configuration,
    /// Agent registration or lookup failed.
    Registration,
    /// An agent broke its declared contract.
    Contract,
    /// An agent returned an error.
    Execution,
    /// A step exceeded its time budget.
    Timeout,
    /// The run was cancelled by the caller.
    Cancellation,
    /// Context encoding or decoding failed.
    Serialization,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::Registration => write!(f, "registration"),
            Self::Contract => write!(f, "contract"),
            Self::Execution => write!(f, "execution"),
            Self::Timeout => write!(f, "timeout"),
            Self::Cancellation => write!(f, "cancellation"),
            Self::Serialization => write!(f, "serialization"),
        }
    }
}

/// The main error type for reasonflow operations.
#[derive(Debug, Clone, Error)]
pub enum ReasonflowError {
    /// The pipeline specification failed validation.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// An agent could not be registered.
    #[error("{0}")]
    Registration(#[from] RegistrationError),

    /// A pipeline step names an agent that was never registered.
    #[error("no agent registered for step: {agent_id}")]
    UnknownAgent {
        /// The step id without an implementation.
        agent_id: String,
    },

    /// A required context key was missing before the agent ran.
    #[error("precondition violation: agent {agent_id} requires {key}")]
    PreconditionViolation {
        /// The agent whose precondition failed.
        agent_id: String,
        /// The missing key.
        key: String,
    },

    /// The agent returned without populating a promised key.
    #[error("postcondition violation: agent {agent_id} did not populate {key}")]
    PostconditionViolation {
        /// The agent that broke its contract.
        agent_id: String,
        /// The key left empty.
        key: String,
    },

    /// The agent wrote outside the namespaces it declared.
    #[error("namespace violation: agent {agent_id} wrote {key} outside its declared namespaces")]
    NamespaceViolation {
        /// The offending agent.
        agent_id: String,
        /// The key written without authorization.
        key: String,
    },

    /// The agent itself reported a failure.
    #[error("agent {agent_id} failed: {message}")]
    AgentFailed {
        /// The failing agent.
        agent_id: String,
        /// The error reported by the agent.
        message: String,
    },

    /// The step exhausted its time budget.
    #[error("agent {agent_id} timed out after {timeout_ms}ms")]
    Timeout {
        /// The agent that timed out.
        agent_id: String,
        /// The configured budget in milliseconds.
        timeout_ms: u64,
    },

    /// The run was cancelled.
    #[error("pipeline cancelled: {reason}")]
    Cancelled {
        /// The cancellation reason.
        reason: String,
    },

    /// A parallel run completed but some branches failed.
    #[error("parallel run finished with failed agents: {}", failed.join(", "))]
    PartialFailure {
        /// Ids of the steps that ended `Failed`.
        failed: Vec<String>,
    },

    /// A dotted context key could not be parsed or written.
    #[error("invalid context key: {key}")]
    InvalidKey {
        /// The rejected key.
        key: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ReasonflowError {
    /// Returns the error class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Configuration,
            Self::Registration(_) | Self::UnknownAgent { .. } => ErrorKind::Registration,
            Self::PreconditionViolation { .. }
            | Self::PostconditionViolation { .. }
            | Self::NamespaceViolation { .. } => ErrorKind::Contract,
            Self::AgentFailed { .. } | Self::PartialFailure { .. } | Self::InvalidKey { .. } => {
                ErrorKind::Execution
            }
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled { .. } => ErrorKind::Cancellation,
            Self::Serialization(_) => ErrorKind::Serialization,
        }
    }

    /// Returns true for timeouts and cancellations, which callers may want
    /// to treat as "retry the whole run".
    #[must_use]
    pub fn is_timeout_or_cancellation(&self) -> bool {
        matches!(self.kind(), ErrorKind::Timeout | ErrorKind::Cancellation)
    }

    /// Returns the agent id the error is attributed to, if any.
    #[must_use]
    pub fn agent_id(&self) -> Option<&str> {
        match self {
            Self::UnknownAgent { agent_id }
            | Self::PreconditionViolation { agent_id, .. }
            | Self::PostconditionViolation { agent_id, .. }
            | Self::NamespaceViolation { agent_id, .. }
            | Self::AgentFailed { agent_id, .. }
            | Self::Timeout { agent_id, .. } => Some(agent_id),
            Self::Registration(err) => Some(err.agent_id()),
            _ => None,
        }
    }

    pub(crate) fn agent_failed(agent_id: &str, err: &anyhow::Error) -> Self {
        Self::AgentFailed {
            agent_id: agent_id.to_string(),
            message: format!("{err:#}"),
        }
    }
}

impl From<serde_json::Error> for ReasonflowError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Metadata about a configuration error for better diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "PIPELINE-006-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: BTreeMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: BTreeMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }
}

/// Which validation rule a pipeline document broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// The document could not be parsed at all.
    Parse,
    /// Mode is not sequential, parallel or conditional.
    InvalidMode,
    /// The step list is empty.
    NoAgents,
    /// Two steps share an id.
    DuplicateAgent,
    /// A dependency names an undefined step.
    UnknownDependency,
    /// A step lists itself as a dependency.
    SelfDependency,
    /// The dependency graph has a cycle.
    CircularDependency,
    /// A timeout string does not parse.
    InvalidTimeout,
    /// A timeout parses to zero or a negative duration.
    NonPositiveTimeout,
    /// A condition is not a valid `namespace.field` key.
    InvalidContextKey,
    /// Two steps in one parallel level write the same namespace.
    OverlappingNamespaces,
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The rule that was broken.
    pub kind: ValidationErrorKind,
    /// The error message.
    pub message: String,
    /// The agents involved in the error.
    pub agents: Vec<String>,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(kind: ValidationErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            agents: Vec::new(),
            error_info: None,
        }
    }

    /// Sets the agents involved.
    #[must_use]
    pub fn with_agents(mut self, agents: Vec<String>) -> Self {
        self.agents = agents;
        self
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }

    pub(crate) fn parse(detail: impl fmt::Display) -> Self {
        Self::new(
            ValidationErrorKind::Parse,
            format!("invalid pipeline document: {detail}"),
        )
    }

    pub(crate) fn invalid_mode(mode: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidMode,
            format!("invalid execution mode: {mode}"),
        )
        .with_error_info(
            ContractErrorInfo::new("PIPELINE-001-MODE", "Unsupported execution mode")
                .with_fix_hint("Use one of: sequential, parallel, conditional."),
        )
    }

    pub(crate) fn no_agents() -> Self {
        Self::new(ValidationErrorKind::NoAgents, "no agents configured").with_error_info(
            ContractErrorInfo::new("PIPELINE-002-EMPTY", "Cannot run an empty pipeline")
                .with_fix_hint("Add at least one agent step to the pipeline."),
        )
    }

    pub(crate) fn duplicate_agent(id: &str) -> Self {
        Self::new(
            ValidationErrorKind::DuplicateAgent,
            format!("duplicate agent ID: {id}"),
        )
        .with_agents(vec![id.to_string()])
        .with_error_info(ContractErrorInfo::new(
            "PIPELINE-003-DUPLICATE",
            format!("Agent '{id}' is declared more than once"),
        ))
    }

    pub(crate) fn unknown_dependency(id: &str, dep: &str) -> Self {
        Self::new(
            ValidationErrorKind::UnknownDependency,
            format!("agent {id} depends on unknown agent: {dep}"),
        )
        .with_agents(vec![id.to_string(), dep.to_string()])
        .with_error_info(
            ContractErrorInfo::new(
                "PIPELINE-004-MISSING_DEP",
                format!("Dependency '{dep}' not found"),
            )
            .with_fix_hint("Check the depends_on list for typos."),
        )
    }

    pub(crate) fn self_dependency(id: &str) -> Self {
        Self::new(
            ValidationErrorKind::SelfDependency,
            format!("agent {id} cannot depend on itself"),
        )
        .with_agents(vec![id.to_string()])
    }

    pub(crate) fn invalid_timeout(value: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidTimeout,
            format!("invalid timeout format: {value}"),
        )
        .with_error_info(
            ContractErrorInfo::new("PIPELINE-007-TIMEOUT", "Timeout does not parse")
                .with_fix_hint("Use values like 500ms, 30s, 1m30s."),
        )
    }

    pub(crate) fn non_positive_timeout(value: &str) -> Self {
        Self::new(
            ValidationErrorKind::NonPositiveTimeout,
            format!("timeout must be positive: {value}"),
        )
    }

    pub(crate) fn invalid_context_key(id: &str, key: &str) -> Self {
        Self::new(
            ValidationErrorKind::InvalidContextKey,
            format!("invalid context key: {key}"),
        )
        .with_agents(vec![id.to_string()])
        .with_error_info(
            ContractErrorInfo::new("PIPELINE-008-KEY", format!("Condition '{key}' is malformed"))
                .with_context_entry("agent", id)
                .with_fix_hint(
                    "Conditions are namespace.field keys, e.g. reasoning.intents.",
                ),
        )
    }

    pub(crate) fn overlapping_namespaces(a: &str, b: &str, level: usize, namespace: &str) -> Self {
        Self::new(
            ValidationErrorKind::OverlappingNamespaces,
            format!("agents {a} and {b} in level {level} both write namespace: {namespace}"),
        )
        .with_agents(vec![a.to_string(), b.to_string()])
        .with_error_info(
            ContractErrorInfo::new(
                "PIPELINE-009-OVERLAP",
                "Concurrent agents declare overlapping postcondition namespaces",
            )
            .with_fix_hint("Add a depends_on edge between the two agents so they run in different levels."),
        )
    }
}

/// Error raised when a cycle is detected in the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "circular dependency detected involving agent: {} (cycle: {})",
    cycle_path.first().map_or("", String::as_str),
    cycle_path.join(" -> ")
)]
pub struct CycleDetectedError {
    /// The path of agents forming the cycle; first and last entries are equal.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PipelineValidationError {
    fn from(err: CycleDetectedError) -> Self {
        Self::new(ValidationErrorKind::CircularDependency, err.to_string())
            .with_agents(err.cycle_path.clone())
            .with_error_info(
                ContractErrorInfo::new(
                    "PIPELINE-006-CYCLE",
                    format!("Pipeline contains a dependency cycle: {}", err.cycle_path.join(" -> ")),
                )
                .with_fix_hint("Remove one of the dependencies in the cycle to break it."),
            )
    }
}

/// Errors raised while registering agents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// An agent with this id is already registered.
    #[error("duplicate agent registration: {agent_id}")]
    Duplicate {
        /// The repeated id.
        agent_id: String,
    },

    /// The agent reported an empty id.
    #[error("agent id cannot be empty")]
    EmptyId,

    /// A declared pre/postcondition is not a valid context key.
    #[error("agent {agent_id} declares invalid contract key: {key}")]
    InvalidContractKey {
        /// The agent declaring the key.
        agent_id: String,
        /// The malformed key.
        key: String,
    },
}

impl RegistrationError {
    /// Returns the agent id involved.
    #[must_use]
    pub fn agent_id(&self) -> &str {
        match self {
            Self::Duplicate { agent_id } | Self::InvalidContractKey { agent_id, .. } => agent_id,
            Self::EmptyId => "",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("agent", "intent");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint.as_deref(), Some("Fix this by doing that"));
        assert_eq!(info.context.get("agent").map(String::as_str), Some("intent"));
    }

    #[test]
    fn test_validation_messages_match_contract_prefixes() {
        assert_eq!(
            PipelineValidationError::invalid_mode("batch").to_string(),
            "invalid execution mode: batch"
        );
        assert_eq!(PipelineValidationError::no_agents().to_string(), "no agents configured");
        assert_eq!(
            PipelineValidationError::duplicate_agent("a").to_string(),
            "duplicate agent ID: a"
        );
        assert_eq!(
            PipelineValidationError::unknown_dependency("a", "b").to_string(),
            "agent a depends on unknown agent: b"
        );
        assert_eq!(
            PipelineValidationError::self_dependency("a").to_string(),
            "agent a cannot depend on itself"
        );
        assert_eq!(
            PipelineValidationError::invalid_timeout("abc").to_string(),
            "invalid timeout format: abc"
        );
        assert_eq!(
            PipelineValidationError::non_positive_timeout("0s").to_string(),
            "timeout must be positive: 0s"
        );
    }

    #[test]
    fn test_cycle_detected_error() {
        let err = CycleDetectedError::new(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
            "a".to_string(),
        ]);

        let message = err.to_string();
        assert!(message.starts_with("circular dependency detected involving agent: a"));
        assert!(message.contains("a -> b -> c -> a"));

        let validation: PipelineValidationError = err.into();
        assert_eq!(validation.kind, ValidationErrorKind::CircularDependency);
        assert_eq!(validation.agents.len(), 4);
        assert_eq!(
            validation.error_info.map(|i| i.code),
            Some("PIPELINE-006-CYCLE".to_string())
        );
    }

    #[test]
    fn test_error_kinds() {
        let timeout = ReasonflowError::Timeout {
            agent_id: "slow".to_string(),
            timeout_ms: 10,
        };
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert!(timeout.is_timeout_or_cancellation());
        assert_eq!(timeout.agent_id(), Some("slow"));

        let contract = ReasonflowError::PostconditionViolation {
            agent_id: "intent".to_string(),
            key: "reasoning.intents".to_string(),
        };
        assert_eq!(contract.kind(), ErrorKind::Contract);
        assert!(!contract.is_timeout_or_cancellation());

        let config: ReasonflowError = PipelineValidationError::no_agents().into();
        assert_eq!(config.kind(), ErrorKind::Configuration);
        assert_eq!(config.agent_id(), None);
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::Duplicate {
            agent_id: "intent".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate agent registration: intent");
        assert_eq!(err.agent_id(), "intent");
    }
}
