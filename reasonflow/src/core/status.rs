//! Agent step status and execution mode enums.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The lifecycle state of one pipeline step.
///
/// `Pending -> Running -> {Success, Failed}`, with `Skipped` reachable from
/// `Pending` when a dependency failed, a condition was unmet, the step is
/// disabled or the run was cancelled before the step started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Not started yet.
    #[default]
    Pending,
    /// Currently executing.
    Running,
    /// Completed and satisfied its contract.
    Success,
    /// Exhausted its attempts or hit a fatal error.
    Failed,
    /// Never executed.
    Skipped,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl AgentStatus {
    /// Returns true if the status represents a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failed | Self::Skipped)
    }

    /// Returns true if the step completed successfully.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Returns true if the step failed.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed)
    }

    /// Returns true if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running | Self::Skipped)
                | (Self::Running, Self::Success | Self::Failed)
        )
    }
}

/// How the scheduler walks the steps of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Declaration order, one at a time.
    #[default]
    Sequential,
    /// Dependency levels, steps within a level run concurrently.
    Parallel,
    /// Declaration order, each step gated by its conditions.
    Conditional,
}

impl ExecutionMode {
    /// Parses a mode name, returning `None` for unknown modes.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "sequential" => Some(Self::Sequential),
            "parallel" => Some(Self::Parallel),
            "conditional" => Some(Self::Conditional),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Parallel => write!(f, "parallel"),
            Self::Conditional => write!(f, "conditional"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_status_display() {
        assert_eq!(AgentStatus::Success.to_string(), "success");
        assert_eq!(AgentStatus::Failed.to_string(), "failed");
        assert_eq!(AgentStatus::Skipped.to_string(), "skipped");
    }

    #[test]
    fn test_agent_status_is_terminal() {
        assert!(AgentStatus::Success.is_terminal());
        assert!(AgentStatus::Skipped.is_terminal());
        assert!(AgentStatus::Failed.is_terminal());
        assert!(!AgentStatus::Pending.is_terminal());
        assert!(!AgentStatus::Running.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(AgentStatus::Pending.can_transition_to(AgentStatus::Running));
        assert!(AgentStatus::Pending.can_transition_to(AgentStatus::Skipped));
        assert!(AgentStatus::Running.can_transition_to(AgentStatus::Failed));
        assert!(!AgentStatus::Running.can_transition_to(AgentStatus::Skipped));
        assert!(!AgentStatus::Success.can_transition_to(AgentStatus::Running));
    }

    #[test]
    fn test_agent_status_serialize() {
        let json = serde_json::to_string(&AgentStatus::Success).unwrap();
        assert_eq!(json, r#""success""#);

        let deserialized: AgentStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, AgentStatus::Success);
    }

    #[test]
    fn test_execution_mode_parse() {
        assert_eq!(ExecutionMode::parse("parallel"), Some(ExecutionMode::Parallel));
        assert_eq!(ExecutionMode::parse("Parallel"), None);
        assert_eq!(ExecutionMode::Conditional.to_string(), "conditional");
    }
}
