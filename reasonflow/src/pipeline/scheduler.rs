//! The scheduler: walks a validated pipeline in one of three disciplines.
//!
//! - **Sequential**: declaration order; the first failed step halts the run.
//! - **Parallel**: dependency levels run concurrently on context clones and
//!   are merged at a barrier; a failure only skips its descendants.
//! - **Conditional**: declaration order; steps whose conditions are unmet
//!   are skipped, a failed step halts the run.

use super::duration::serde_str;
use super::executor::{StepExecutor, StepOutcome};
use super::graph::DependencyGraph;
use super::spec::{AgentStepSpec, PipelineSpec};
use crate::agent::AgentRegistry;
use crate::audit::{finish_run, record_skip, record_step, SkipCause};
use crate::cancellation::CancellationToken;
use crate::context::ReasoningContext;
use crate::contracts::declared_namespaces;
use crate::core::{AgentStatus, ExecutionMode};
use crate::errors::{PipelineValidationError, ReasonflowError};
use crate::events::{EventKind, EventSink, NoOpEventSink};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Reason recorded for disabled steps.
pub const DISABLED_REASON: &str = "disabled";

/// Tunables for a [`Scheduler`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerOptions {
    /// Pause between attempts of a failing step, bounded by its timeout.
    #[serde(with = "serde_str")]
    pub retry_delay: Duration,
    /// Fail steps that change namespaces outside their postconditions.
    pub detect_namespace_violations: bool,
    /// Reject parallel pipelines whose levels hold steps writing the same
    /// namespace. When off, the later-declared step's namespace wins.
    pub enforce_level_disjointness: bool,
    /// Cap on concurrently running steps per level; 0 means no cap.
    pub max_parallelism: usize,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(100),
            detect_namespace_violations: true,
            enforce_level_disjointness: true,
            max_parallelism: 0,
        }
    }
}

impl SchedulerOptions {
    /// Sets the retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Enables or disables namespace violation detection.
    #[must_use]
    pub fn with_namespace_violation_detection(mut self, enabled: bool) -> Self {
        self.detect_namespace_violations = enabled;
        self
    }

    /// Enables or disables the per-level disjointness check.
    #[must_use]
    pub fn with_level_disjointness(mut self, enforced: bool) -> Self {
        self.enforce_level_disjointness = enforced;
        self
    }

    /// Caps the number of concurrently running steps.
    #[must_use]
    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = max;
        self
    }
}

/// Final state of one step in a run.
#[derive(Debug, Clone)]
pub struct StepReport {
    /// The step id.
    pub agent_id: String,
    /// `Pending` if the run halted before reaching the step.
    pub status: AgentStatus,
    /// Attempts made.
    pub attempts: u32,
    /// Wall time across attempts.
    pub duration_ms: f64,
    /// Error that failed the step.
    pub error: Option<ReasonflowError>,
    /// Why the step was skipped.
    pub skip_reason: Option<String>,
}

impl StepReport {
    fn pending(agent_id: &str) -> Self {
        Self {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Pending,
            attempts: 0,
            duration_ms: 0.0,
            error: None,
            skip_reason: None,
        }
    }
}

/// Everything a run produced.
///
/// The context is returned even when the run failed, so callers can see how
/// far reasoning progressed.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    /// The final context, including audit and diagnostics.
    pub context: ReasoningContext,
    /// One report per declared step, in declaration order.
    pub steps: Vec<StepReport>,
    /// The error that ended the run, if any.
    pub error: Option<ReasonflowError>,
    /// Wall time of the run.
    pub duration_ms: f64,
}

impl PipelineRun {
    /// Returns true if the run finished without error.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the report for one step.
    #[must_use]
    pub fn step(&self, agent_id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.agent_id == agent_id)
    }

    /// Returns the final status of one step.
    #[must_use]
    pub fn status_of(&self, agent_id: &str) -> Option<AgentStatus> {
        self.step(agent_id).map(|s| s.status)
    }

    /// Returns the ids of failed steps in declaration order.
    #[must_use]
    pub fn failed_agents(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.status == AgentStatus::Failed)
            .map(|s| s.agent_id.clone())
            .collect()
    }

    /// Converts the run into the final context or its error.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the run.
    pub fn into_result(self) -> Result<ReasoningContext, ReasonflowError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.context),
        }
    }
}

/// Per-run bookkeeping of step reports.
struct RunState {
    reports: Vec<StepReport>,
    index: HashMap<String, usize>,
}

impl RunState {
    fn new(spec: &PipelineSpec) -> Self {
        let mut reports = Vec::with_capacity(spec.len());
        let mut index = HashMap::new();
        for (i, step) in spec.agents().iter().enumerate() {
            let mut report = StepReport::pending(&step.id);
            if !step.enabled {
                report.status = AgentStatus::Skipped;
                report.skip_reason = Some(DISABLED_REASON.to_string());
            }
            reports.push(report);
            index.insert(step.id.clone(), i);
        }
        Self { reports, index }
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut StepReport> {
        self.index.get(id).and_then(|i| self.reports.get_mut(*i))
    }

    /// Moves a step to `next` if the status machine allows it.
    fn transition(&mut self, id: &str, next: AgentStatus) -> Option<&mut StepReport> {
        let report = self.get_mut(id)?;
        if report.status.can_transition_to(next) {
            report.status = next;
            Some(report)
        } else {
            warn!(agent_id = %id, from = %report.status, to = %next, "Ignoring illegal status change");
            None
        }
    }

    fn start(&mut self, id: &str) {
        self.transition(id, AgentStatus::Running);
    }

    fn complete(&mut self, outcome: &StepOutcome) {
        if let Some(report) = self.transition(&outcome.audit.agent_id, outcome.status()) {
            report.attempts = outcome.attempts;
            report.duration_ms = outcome.audit.duration_ms;
            report.error = outcome.error().cloned();
        }
    }

    fn skip(&mut self, id: &str, reason: String) {
        if let Some(report) = self.transition(id, AgentStatus::Skipped) {
            report.skip_reason = Some(reason);
        }
    }
}

/// Runs a validated pipeline against registered agents.
///
/// A scheduler is built once and reused for any number of runs; it holds no
/// per-run state.
pub struct Scheduler {
    spec: PipelineSpec,
    registry: AgentRegistry,
    options: SchedulerOptions,
    graph: DependencyGraph,
    levels: Vec<Vec<String>>,
    events: Arc<dyn EventSink>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("mode", &self.spec.mode())
            .field("agents", &self.spec.len())
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Creates a scheduler with default options.
    ///
    /// # Errors
    ///
    /// See [`with_options`](Self::with_options).
    pub fn new(spec: PipelineSpec, registry: AgentRegistry) -> Result<Self, ReasonflowError> {
        Self::with_options(spec, registry, SchedulerOptions::default())
    }

    /// Creates a scheduler.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAgent` if an enabled step has no registered agent, and
    /// an `OverlappingNamespaces` validation error if a parallel level holds
    /// two steps writing the same namespace while disjointness is enforced.
    pub fn with_options(
        spec: PipelineSpec,
        registry: AgentRegistry,
        options: SchedulerOptions,
    ) -> Result<Self, ReasonflowError> {
        for step in spec.enabled_agents() {
            if !registry.contains(&step.id) {
                return Err(ReasonflowError::UnknownAgent {
                    agent_id: step.id.clone(),
                });
            }
        }

        let graph = DependencyGraph::new(
            spec.agents()
                .iter()
                .map(|s| (s.id.as_str(), s.depends_on.as_slice())),
        );
        let levels = graph.levels();

        let scheduler = Self {
            spec,
            registry,
            options,
            graph,
            levels,
            events: Arc::new(NoOpEventSink),
        };
        if scheduler.spec.mode() == ExecutionMode::Parallel
            && scheduler.options.enforce_level_disjointness
        {
            scheduler.check_level_disjointness()?;
        }

        debug!(
            mode = %scheduler.spec.mode(),
            agents = scheduler.spec.len(),
            levels = scheduler.levels.len(),
            "Scheduler created"
        );
        Ok(scheduler)
    }

    /// Attaches an event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Returns the specification.
    #[must_use]
    pub fn spec(&self) -> &PipelineSpec {
        &self.spec
    }

    /// Returns the options.
    #[must_use]
    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Returns the dependency levels of every declared step.
    #[must_use]
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Returns the order in which steps are considered: declaration order
    /// for sequential and conditional mode, level by level for parallel.
    #[must_use]
    pub fn execution_order(&self) -> Vec<String> {
        match self.spec.mode() {
            ExecutionMode::Parallel => self.graph.topological_order(),
            ExecutionMode::Sequential | ExecutionMode::Conditional => {
                self.spec.agents().iter().map(|a| a.id.clone()).collect()
            }
        }
    }

    fn check_level_disjointness(&self) -> Result<(), PipelineValidationError> {
        for (level, ids) in self.levels.iter().enumerate() {
            let writers: Vec<_> = ids
                .iter()
                .filter_map(|id| self.spec.get(id))
                .filter(|step| step.enabled)
                .filter_map(|step| {
                    let agent = self.registry.get(&step.id)?;
                    Some((step.id.as_str(), declared_namespaces(&agent.postconditions())))
                })
                .collect();

            for (i, (a, a_ns)) in writers.iter().enumerate() {
                for (b, b_ns) in &writers[i + 1..] {
                    if let Some(ns) = a_ns.intersection(b_ns).next() {
                        return Err(PipelineValidationError::overlapping_namespaces(
                            a,
                            b,
                            level,
                            ns.as_str(),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    fn executor(&self) -> StepExecutor {
        StepExecutor::new(self.options.clone(), self.events.clone())
    }

    /// Runs the pipeline with a fresh cancellation token.
    pub async fn run(&self, ctx: ReasoningContext) -> PipelineRun {
        self.run_with_cancellation(ctx, &CancellationToken::new())
            .await
    }

    /// Runs the pipeline. Cancelling `cancel` aborts running steps and skips
    /// the ones not yet started.
    pub async fn run_with_cancellation(
        &self,
        ctx: ReasoningContext,
        cancel: &CancellationToken,
    ) -> PipelineRun {
        let started = Instant::now();
        let mode = self.spec.mode();
        let mut state = RunState::new(&self.spec);

        info!(
            mode = %mode,
            agents = self.spec.len(),
            session_id = %ctx.metadata().session_id(),
            "Pipeline run started"
        );
        self.events.try_emit(
            EventKind::PipelineStarted,
            json!({
                "mode": mode.to_string(),
                "agents": self.spec.len(),
                "session_id": ctx.metadata().session_id(),
            }),
        );

        let (mut ctx, error) = match mode {
            ExecutionMode::Sequential | ExecutionMode::Conditional => {
                self.run_in_order(ctx, cancel, &mut state).await
            }
            ExecutionMode::Parallel => self.run_levels(ctx, cancel, &mut state).await,
        };

        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
        finish_run(&mut ctx, duration_ms);

        match &error {
            None => info!(mode = %mode, duration_ms, "Pipeline run completed"),
            Some(err) => warn!(mode = %mode, duration_ms, error = %err, "Pipeline run failed"),
        }
        self.events.try_emit(
            EventKind::PipelineCompleted,
            json!({
                "success": error.is_none(),
                "duration_ms": duration_ms,
                "error": error.as_ref().map(ToString::to_string),
            }),
        );

        PipelineRun {
            context: ctx,
            steps: state.reports,
            error,
            duration_ms,
        }
    }

    fn skip(&self, ctx: &mut ReasoningContext, state: &mut RunState, id: &str, cause: &SkipCause) {
        let reason = cause.reason();
        debug!(agent_id = %id, reason = %reason, "Agent skipped");
        record_skip(ctx, id, cause);
        state.skip(id, reason.clone());
        self.events.try_emit(
            EventKind::AgentSkipped,
            json!({ "agent_id": id, "reason": reason }),
        );
    }

    /// Sequential and conditional discipline.
    async fn run_in_order(
        &self,
        mut ctx: ReasoningContext,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> (ReasoningContext, Option<ReasonflowError>) {
        let conditional = self.spec.mode() == ExecutionMode::Conditional;
        let executor = self.executor();
        let mut error = None;

        for step in self.spec.enabled_agents() {
            if error.is_some() {
                // Steps after a failure stay pending; after a cancellation
                // they are skipped without running.
                if cancel.is_cancelled() {
                    self.skip(&mut ctx, state, &step.id, &SkipCause::Cancelled);
                    continue;
                }
                break;
            }
            if let Some(reason) = cancel.reason() {
                error = Some(ReasonflowError::Cancelled { reason });
                self.skip(&mut ctx, state, &step.id, &SkipCause::Cancelled);
                continue;
            }

            if conditional {
                if let Some(key) = unmet_condition(step, &ctx) {
                    self.skip(&mut ctx, state, &step.id, &SkipCause::ConditionUnmet { key });
                    continue;
                }
            }

            let Some(agent) = self.registry.get(&step.id) else {
                error = Some(ReasonflowError::UnknownAgent {
                    agent_id: step.id.clone(),
                });
                continue;
            };

            state.start(&step.id);
            let mut outcome = executor.execute(agent, step, &ctx, cancel).await;
            if let Some(output) = outcome.output.take() {
                ctx = output;
            }
            state.complete(&outcome);
            error = outcome.error().cloned();
            record_step(&mut ctx, outcome.audit);
        }

        (ctx, error)
    }

    /// Parallel discipline: one barrier per dependency level.
    async fn run_levels(
        &self,
        mut ctx: ReasoningContext,
        cancel: &CancellationToken,
        state: &mut RunState,
    ) -> (ReasoningContext, Option<ReasonflowError>) {
        let executor = self.executor();
        let semaphore = (self.options.max_parallelism > 0)
            .then(|| Arc::new(Semaphore::new(self.options.max_parallelism)));
        let mut blocked: HashSet<String> = HashSet::new();
        let mut failed: Vec<String> = Vec::new();

        for (level, ids) in self.levels.iter().enumerate() {
            let mut runnable: Vec<&AgentStepSpec> = Vec::new();
            for id in ids {
                let Some(step) = self.spec.get(id) else {
                    continue;
                };
                if !step.enabled {
                    // Disabled steps pass a failure through to their dependents.
                    if step.depends_on.iter().any(|d| blocked.contains(d)) {
                        blocked.insert(step.id.clone());
                    }
                    continue;
                }
                if cancel.is_cancelled() {
                    blocked.insert(step.id.clone());
                    self.skip(&mut ctx, state, &step.id, &SkipCause::Cancelled);
                    continue;
                }
                if let Some(dep) = step.depends_on.iter().find(|d| blocked.contains(*d)) {
                    let cause = SkipCause::DependencyBlocked {
                        dependency: dep.clone(),
                    };
                    blocked.insert(step.id.clone());
                    self.skip(&mut ctx, state, &step.id, &cause);
                    continue;
                }
                runnable.push(step);
            }
            if runnable.is_empty() {
                continue;
            }
            debug!(level, agents = runnable.len(), "Running level");

            let base = Arc::new(ctx.clone());
            let mut handles = Vec::with_capacity(runnable.len());
            for step in runnable {
                state.start(&step.id);
                let Some(agent) = self.registry.get(&step.id) else {
                    handles.push((step.id.clone(), None));
                    continue;
                };
                let id = step.id.clone();
                let executor = executor.clone();
                let step = step.clone();
                let input = Arc::clone(&base);
                let token = cancel.clone();
                let semaphore = semaphore.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match semaphore {
                        Some(sem) => sem.acquire_owned().await.ok(),
                        None => None,
                    };
                    executor.execute(agent, &step, &input, &token).await
                });
                handles.push((id, Some(handle)));
            }

            let mut outcomes = Vec::with_capacity(handles.len());
            for (id, handle) in handles {
                let outcome = match handle {
                    Some(handle) => match handle.await {
                        Ok(outcome) => outcome,
                        Err(err) => StepOutcome::lost(&id, &format!("agent task failed: {err}")),
                    },
                    None => StepOutcome::lost(&id, "no agent registered"),
                };
                outcomes.push(outcome);
            }

            // Merge in declaration order, then append audit material.
            for outcome in &outcomes {
                if let Some(output) = &outcome.output {
                    for ns in &outcome.namespaces {
                        ctx.adopt_namespace(output, *ns);
                    }
                }
            }
            for outcome in outcomes {
                state.complete(&outcome);
                if outcome.status() == AgentStatus::Failed {
                    blocked.insert(outcome.audit.agent_id.clone());
                    failed.push(outcome.audit.agent_id.clone());
                }
                record_step(&mut ctx, outcome.audit);
            }
        }

        let error = if let Some(reason) = cancel.reason() {
            Some(ReasonflowError::Cancelled { reason })
        } else if failed.is_empty() {
            None
        } else {
            Some(ReasonflowError::PartialFailure { failed })
        };
        (ctx, error)
    }
}

/// Returns the first condition key that is absent or empty.
fn unmet_condition(step: &AgentStepSpec, ctx: &ReasoningContext) -> Option<String> {
    step.conditions.iter().find(|key| !ctx.has_value(key)).cloned()
}
