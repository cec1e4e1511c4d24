//! Execution of a single step: attempts, retries, deadline and contracts.

use super::scheduler::SchedulerOptions;
use super::spec::AgentStepSpec;
use crate::agent::Agent;
use crate::audit::StepAudit;
use crate::cancellation::CancellationToken;
use crate::context::{AgentRunRecord, ContextDiff, LlmUsage, Namespace, ReasoningContext};
use crate::contracts::AgentContract;
use crate::core::AgentStatus;
use crate::errors::ReasonflowError;
use crate::events::{EventKind, EventSink};
use chrono::Utc;
use futures::FutureExt;
use serde_json::json;
use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Result of running one step to a terminal state.
#[derive(Debug)]
pub(crate) struct StepOutcome {
    /// The context produced by the successful attempt.
    pub output: Option<ReasoningContext>,
    /// Namespaces the step is allowed to write; used when merging branches.
    pub namespaces: BTreeSet<Namespace>,
    /// Attempts actually made.
    pub attempts: u32,
    /// Audit material, applied by the scheduler after merging.
    pub audit: StepAudit,
}

impl StepOutcome {
    pub fn status(&self) -> AgentStatus {
        self.audit.status
    }

    pub fn error(&self) -> Option<&ReasonflowError> {
        self.audit.error.as_ref()
    }

    /// Outcome for a branch task that died without reporting back.
    pub fn lost(agent_id: &str, message: &str) -> Self {
        let now = Utc::now();
        let error = ReasonflowError::AgentFailed {
            agent_id: agent_id.to_string(),
            message: message.to_string(),
        };
        Self {
            output: None,
            namespaces: BTreeSet::new(),
            attempts: 1,
            audit: StepAudit {
                agent_id: agent_id.to_string(),
                status: AgentStatus::Failed,
                records: vec![AgentRunRecord {
                    agent_id: agent_id.to_string(),
                    attempt: 1,
                    start_time: now,
                    end_time: now,
                    duration_ms: 0.0,
                    status: AgentStatus::Failed,
                    keys_written: Vec::new(),
                    error: Some(error.to_string()),
                }],
                diff: None,
                error: Some(error),
                duration_ms: 0.0,
                usage: LlmUsage::default(),
            },
        }
    }
}

/// Runs steps against agents. Cheap to clone into branch tasks.
#[derive(Clone)]
pub(crate) struct StepExecutor {
    options: SchedulerOptions,
    events: Arc<dyn EventSink>,
}

impl StepExecutor {
    pub fn new(options: SchedulerOptions, events: Arc<dyn EventSink>) -> Self {
        Self { options, events }
    }

    /// Runs `step` until it succeeds, exhausts its attempts, runs out of
    /// time, or the run is cancelled.
    ///
    /// `input` is never modified; every attempt works on its own clone.
    pub async fn execute(
        &self,
        agent: Arc<dyn Agent>,
        step: &AgentStepSpec,
        input: &ReasoningContext,
        run_token: &CancellationToken,
    ) -> StepOutcome {
        let contract = AgentContract::of(agent.as_ref());
        let started = Instant::now();
        let deadline = started + step.timeout;
        let max_attempts = step.max_attempts();

        let mut records = Vec::new();
        let mut attempts = 0;
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            if let Some(reason) = run_token.reason() {
                last_error = Some(ReasonflowError::Cancelled { reason });
                break;
            }

            attempts = attempt;
            let start_time = Utc::now();
            let attempt_started = Instant::now();
            self.events.try_emit(
                EventKind::AgentStarted,
                json!({ "agent_id": step.id, "attempt": attempt }),
            );

            let result = self
                .attempt(agent.as_ref(), &contract, step, input, deadline, run_token)
                .await;
            let duration_ms = attempt_started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok((output, diff)) => {
                    let keys_written = diff.keys();
                    records.push(AgentRunRecord {
                        agent_id: step.id.clone(),
                        attempt,
                        start_time,
                        end_time: Utc::now(),
                        duration_ms,
                        status: AgentStatus::Success,
                        keys_written: keys_written.clone(),
                        error: None,
                    });
                    debug!(agent_id = %step.id, attempt, duration_ms, "Agent completed");
                    self.events.try_emit(
                        EventKind::AgentCompleted,
                        json!({
                            "agent_id": step.id,
                            "attempt": attempt,
                            "duration_ms": duration_ms,
                            "keys_written": keys_written,
                        }),
                    );

                    let usage = output.llm.usage.since(&input.llm.usage);
                    return StepOutcome {
                        output: Some(output),
                        namespaces: contract.writable_namespaces(),
                        attempts,
                        audit: StepAudit {
                            agent_id: step.id.clone(),
                            status: AgentStatus::Success,
                            records,
                            diff: Some(diff.attributed_to(&step.id)),
                            error: None,
                            duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                            usage,
                        },
                    };
                }
                Err(err) => {
                    records.push(AgentRunRecord {
                        agent_id: step.id.clone(),
                        attempt,
                        start_time,
                        end_time: Utc::now(),
                        duration_ms,
                        status: AgentStatus::Failed,
                        keys_written: Vec::new(),
                        error: Some(err.to_string()),
                    });
                    warn!(agent_id = %step.id, attempt, error = %err, "Agent attempt failed");

                    let terminal = err.is_timeout_or_cancellation() || attempt == max_attempts;
                    last_error = Some(err);
                    if terminal {
                        break;
                    }
                    if let Err(err) = self.pause_before_retry(step, attempt, deadline, run_token).await {
                        last_error = Some(err);
                        break;
                    }
                }
            }
        }

        let error = last_error.unwrap_or_else(|| ReasonflowError::AgentFailed {
            agent_id: step.id.clone(),
            message: "no attempt was made".to_string(),
        });
        self.events.try_emit(
            EventKind::AgentFailed,
            json!({
                "agent_id": step.id,
                "attempts": attempts,
                "kind": error.kind().to_string(),
                "error": error.to_string(),
            }),
        );

        StepOutcome {
            output: None,
            namespaces: contract.writable_namespaces(),
            attempts,
            audit: StepAudit {
                agent_id: step.id.clone(),
                status: AgentStatus::Failed,
                records,
                diff: None,
                error: Some(error),
                duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                usage: LlmUsage::default(),
            },
        }
    }

    /// One attempt: preconditions, `execute` under the deadline, then
    /// postconditions and isolation.
    async fn attempt(
        &self,
        agent: &dyn Agent,
        contract: &AgentContract,
        step: &AgentStepSpec,
        input: &ReasoningContext,
        deadline: Instant,
        run_token: &CancellationToken,
    ) -> Result<(ReasoningContext, ContextDiff), ReasonflowError> {
        contract.check_preconditions(input)?;

        let step_token = run_token.child();
        let call = AssertUnwindSafe(agent.execute(&step_token, input.clone())).catch_unwind();

        let output = tokio::select! {
            biased;
            () = run_token.cancelled() => {
                let reason = run_token.reason().unwrap_or_default();
                return Err(ReasonflowError::Cancelled { reason });
            }
            () = tokio::time::sleep_until(deadline) => {
                step_token.cancel("step timeout");
                return Err(timeout_error(step));
            }
            result = call => match result {
                Ok(Ok(output)) => output,
                Ok(Err(err)) => return Err(ReasonflowError::agent_failed(&step.id, &err)),
                Err(panic) => {
                    return Err(ReasonflowError::AgentFailed {
                        agent_id: step.id.clone(),
                        message: format!("agent panicked: {}", panic_message(panic.as_ref())),
                    });
                }
            },
        };

        contract.check_postconditions(&output)?;
        let diff = input.diff(&output);
        if self.options.detect_namespace_violations {
            contract.check_isolation(&diff)?;
        }
        Ok((output, diff))
    }

    /// Waits the retry delay, never past the step's deadline.
    async fn pause_before_retry(
        &self,
        step: &AgentStepSpec,
        attempt: u32,
        deadline: Instant,
        run_token: &CancellationToken,
    ) -> Result<(), ReasonflowError> {
        let resume = (Instant::now() + self.options.retry_delay).min(deadline);
        self.events.try_emit(
            EventKind::AgentRetrying,
            json!({
                "agent_id": step.id,
                "next_attempt": attempt + 1,
                "delay_ms": u64::try_from(self.options.retry_delay.as_millis()).unwrap_or(u64::MAX),
            }),
        );
        debug!(agent_id = %step.id, next_attempt = attempt + 1, "Retrying agent");

        tokio::select! {
            () = tokio::time::sleep_until(resume) => {}
            () = run_token.cancelled() => {
                let reason = run_token.reason().unwrap_or_default();
                return Err(ReasonflowError::Cancelled { reason });
            }
        }
        if Instant::now() >= deadline {
            return Err(timeout_error(step));
        }
        Ok(())
    }
}

fn timeout_error(step: &AgentStepSpec) -> ReasonflowError {
    ReasonflowError::Timeout {
        agent_id: step.id.clone(),
        timeout_ms: u64::try_from(step.timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
