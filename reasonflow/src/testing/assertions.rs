//! Test assertions for pipeline runs.

use crate::context::ReasoningContext;
use crate::core::AgentStatus;
use crate::pipeline::PipelineRun;

/// Asserts that the run finished without error.
pub fn assert_run_succeeded(run: &PipelineRun) {
    assert!(
        run.is_success(),
        "Expected run to succeed, got error: {:?}",
        run.error
    );
}

/// Asserts that the run finished with an error.
pub fn assert_run_failed(run: &PipelineRun) {
    assert!(run.error.is_some(), "Expected run to fail, but it succeeded");
}

/// Asserts the reported status of one step.
pub fn assert_step_status(run: &PipelineRun, agent_id: &str, expected: AgentStatus) {
    let actual = run.status_of(agent_id);
    assert_eq!(
        actual,
        Some(expected),
        "Expected step '{agent_id}' to be {expected}, got {actual:?}"
    );
}

/// Asserts how many attempts the audit log recorded for an agent.
pub fn assert_attempts(ctx: &ReasoningContext, agent_id: &str, expected: usize) {
    let actual = ctx.audit.attempts_for(agent_id);
    assert_eq!(
        actual, expected,
        "Expected {expected} attempts for '{agent_id}', got {actual}"
    );
}

/// Asserts that every key resolves to a non-empty value.
pub fn assert_keys_populated<I, S>(ctx: &ReasoningContext, keys: I)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    for key in keys {
        let key = key.as_ref();
        assert!(
            ctx.has_value(key),
            "Expected '{key}' to be populated, got {:?}",
            ctx.get(key)
        );
    }
}

/// Asserts that a key is absent or empty.
pub fn assert_key_empty(ctx: &ReasoningContext, key: &str) {
    assert!(
        !ctx.has_value(key),
        "Expected '{key}' to be empty, got {:?}",
        ctx.get(key)
    );
}
