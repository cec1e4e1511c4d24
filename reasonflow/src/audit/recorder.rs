use crate::context::{
    AgentMetrics, AgentRunRecord, ContextDiff, DiagnosticError, DiagnosticWarning, LlmUsage,
    ReasoningContext, Severity,
};
use crate::core::AgentStatus;
use crate::errors::{ErrorKind, ReasonflowError};
use chrono::Utc;

/// Everything one step produced for the audit trail.
#[derive(Debug, Clone)]
pub struct StepAudit {
    /// The step id.
    pub agent_id: String,
    /// Final status of the step.
    pub status: AgentStatus,
    /// One record per attempt, in order.
    pub records: Vec<AgentRunRecord>,
    /// Diff of the successful attempt, tagged with the agent.
    pub diff: Option<ContextDiff>,
    /// Error that ended the step, if it failed.
    pub error: Option<ReasonflowError>,
    /// Wall time across all attempts.
    pub duration_ms: f64,
    /// `llm.usage` accrued by the step.
    pub usage: LlmUsage,
}

/// Why a step was skipped without running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipCause {
    /// A condition key was absent or empty.
    ConditionUnmet {
        /// The first unmet key.
        key: String,
    },
    /// A dependency failed or was itself skipped.
    DependencyBlocked {
        /// The blocking dependency.
        dependency: String,
    },
    /// The run was cancelled before the step started.
    Cancelled,
}

impl SkipCause {
    /// Returns the human-readable reason stored in the record.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::ConditionUnmet { key } => format!("condition not met: {key}"),
            Self::DependencyBlocked { dependency } => {
                format!("dependency did not succeed: {dependency}")
            }
            Self::Cancelled => "run cancelled".to_string(),
        }
    }

    fn warns(&self) -> bool {
        !matches!(self, Self::ConditionUnmet { .. })
    }
}

fn severity_of(err: &ReasonflowError) -> Severity {
    match err.kind() {
        ErrorKind::Contract => Severity::Critical,
        ErrorKind::Cancellation => Severity::Warning,
        _ => Severity::Error,
    }
}

/// Appends a step's records, diff, diagnostics and metrics to `ctx`.
pub fn record_step(ctx: &mut ReasoningContext, step: StepAudit) {
    let StepAudit {
        agent_id,
        status,
        records,
        diff,
        error,
        duration_ms,
        usage,
    } = step;

    ctx.audit.agent_runs.extend(records);
    if let Some(diff) = diff {
        ctx.audit.diffs.push(diff);
    }
    if let Some(err) = &error {
        ctx.diagnostics.errors.push(DiagnosticError {
            agent_id: agent_id.clone(),
            message: err.to_string(),
            severity: severity_of(err),
        });
    }

    ctx.diagnostics.performance.agent_metrics.insert(
        agent_id,
        AgentMetrics {
            duration_ms,
            llm_calls: usage.calls,
            status,
            tokens: usage.total_tokens,
            cost: usage.cost,
        },
    );
}

/// Records a step that never ran: a zero-duration `skipped` record with
/// attempt 0, plus a warning unless the skip came from an unmet condition.
pub fn record_skip(ctx: &mut ReasoningContext, agent_id: &str, cause: &SkipCause) {
    let now = Utc::now();
    let reason = cause.reason();

    ctx.audit.agent_runs.push(AgentRunRecord {
        agent_id: agent_id.to_string(),
        attempt: 0,
        start_time: now,
        end_time: now,
        duration_ms: 0.0,
        status: AgentStatus::Skipped,
        keys_written: Vec::new(),
        error: Some(reason.clone()),
    });
    if cause.warns() {
        ctx.diagnostics.warnings.push(DiagnosticWarning {
            agent_id: agent_id.to_string(),
            message: format!("skipped: {reason}"),
        });
    }
    ctx.diagnostics.performance.agent_metrics.insert(
        agent_id.to_string(),
        AgentMetrics {
            status: AgentStatus::Skipped,
            ..AgentMetrics::default()
        },
    );
}

/// Stamps the run's total duration.
pub fn finish_run(ctx: &mut ReasoningContext, total_duration_ms: f64) {
    ctx.diagnostics.performance.total_duration_ms = total_duration_ms;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::empty_context;

    fn record(agent_id: &str, attempt: u32, status: AgentStatus) -> AgentRunRecord {
        let now = Utc::now();
        AgentRunRecord {
            agent_id: agent_id.to_string(),
            attempt,
            start_time: now,
            end_time: now,
            duration_ms: 1.5,
            status,
            keys_written: Vec::new(),
            error: None,
        }
    }

    #[test]
    fn test_record_successful_step() {
        let mut ctx = empty_context();
        record_step(
            &mut ctx,
            StepAudit {
                agent_id: "intent".to_string(),
                status: AgentStatus::Success,
                records: vec![record("intent", 1, AgentStatus::Success)],
                diff: Some(ContextDiff::default().attributed_to("intent")),
                error: None,
                duration_ms: 1.5,
                usage: LlmUsage {
                    calls: 2,
                    total_tokens: 40,
                    cost: 0.01,
                    ..LlmUsage::default()
                },
            },
        );

        assert_eq!(ctx.audit.agent_runs.len(), 1);
        assert_eq!(ctx.audit.diffs[0].agent_id.as_deref(), Some("intent"));
        assert!(ctx.diagnostics.errors.is_empty());
        let metrics = &ctx.diagnostics.performance.agent_metrics["intent"];
        assert_eq!(metrics.llm_calls, 2);
        assert_eq!(metrics.tokens, 40);
        assert_eq!(metrics.status, AgentStatus::Success);
    }

    #[test]
    fn test_record_failed_step() {
        let mut ctx = empty_context();
        let err = ReasonflowError::PostconditionViolation {
            agent_id: "s".to_string(),
            key: "reasoning.summary".to_string(),
        };
        record_step(
            &mut ctx,
            StepAudit {
                agent_id: "s".to_string(),
                status: AgentStatus::Failed,
                records: vec![record("s", 1, AgentStatus::Failed), record("s", 2, AgentStatus::Failed)],
                diff: None,
                error: Some(err),
                duration_ms: 3.0,
                usage: LlmUsage::default(),
            },
        );

        assert_eq!(ctx.audit.attempts_for("s"), 2);
        assert!(ctx.audit.diffs.is_empty());
        assert_eq!(ctx.diagnostics.errors[0].severity, Severity::Critical);
        assert!(ctx.diagnostics.errors[0].message.contains("reasoning.summary"));
    }

    #[test]
    fn test_record_skip() {
        let mut ctx = empty_context();
        record_skip(
            &mut ctx,
            "summary",
            &SkipCause::ConditionUnmet {
                key: "reasoning.conclusions".to_string(),
            },
        );
        record_skip(
            &mut ctx,
            "b",
            &SkipCause::DependencyBlocked {
                dependency: "a".to_string(),
            },
        );

        let skipped = ctx.audit.records_for("summary").next().unwrap();
        assert_eq!(skipped.attempt, 0);
        assert!(skipped.duration_ms.abs() < f64::EPSILON);
        assert_eq!(skipped.status, AgentStatus::Skipped);
        assert_eq!(ctx.audit.attempts_for("summary"), 0);

        assert_eq!(ctx.diagnostics.warnings.len(), 1);
        assert_eq!(ctx.diagnostics.warnings[0].agent_id, "b");
    }

    #[test]
    fn test_finish_run() {
        let mut ctx = empty_context();
        finish_run(&mut ctx, 42.0);
        assert!((ctx.diagnostics.performance.total_duration_ms - 42.0).abs() < f64::EPSILON);
    }
}
