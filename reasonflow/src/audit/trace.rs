use crate::context::ReasoningContext;
use std::fmt::Write;

/// Renders the audit trail as a human-readable execution trace, one line
/// per record.
///
/// ```text
/// trace 4f1c... session abc (3 records, 12.4ms)
///   1. intent #1 success 3.1ms [reasoning.intents]
///   2. summary skipped (condition not met: reasoning.conclusions)
/// ```
#[must_use]
pub fn render_trace(ctx: &ReasoningContext) -> String {
    let meta = ctx.metadata();
    let runs = &ctx.audit.agent_runs;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "trace {} session {} ({} records, {:.1}ms)",
        meta.trace_id(),
        meta.session_id(),
        runs.len(),
        ctx.diagnostics.performance.total_duration_ms
    );

    for (i, run) in runs.iter().enumerate() {
        let _ = write!(out, "  {}. {}", i + 1, run.agent_id);
        if run.attempt == 0 {
            let _ = write!(out, " {}", run.status);
        } else {
            let _ = write!(out, " #{} {} {:.1}ms", run.attempt, run.status, run.duration_ms);
        }
        if !run.keys_written.is_empty() {
            let _ = write!(out, " [{}]", run.keys_written.join(", "));
        }
        if let Some(error) = &run.error {
            let _ = write!(out, " ({error})");
        }
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{record_skip, SkipCause};
    use crate::context::AgentRunRecord;
    use crate::core::AgentStatus;
    use crate::testing::empty_context;
    use chrono::Utc;

    #[test]
    fn test_render_trace() {
        let mut ctx = empty_context();
        let now = Utc::now();
        ctx.audit.agent_runs.push(AgentRunRecord {
            agent_id: "intent".to_string(),
            attempt: 1,
            start_time: now,
            end_time: now,
            duration_ms: 3.12,
            status: AgentStatus::Success,
            keys_written: vec!["reasoning.intents".to_string()],
            error: None,
        });
        record_skip(
            &mut ctx,
            "summary",
            &SkipCause::ConditionUnmet {
                key: "reasoning.conclusions".to_string(),
            },
        );

        let trace = render_trace(&ctx);
        let lines: Vec<&str> = trace.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("trace trace-empty session session-empty (2 records"));
        assert_eq!(lines[1], "  1. intent #1 success 3.1ms [reasoning.intents]");
        assert_eq!(
            lines[2],
            "  2. summary skipped (condition not met: reasoning.conclusions)"
        );
    }
}
