//! Static validation of pipeline documents.
//!
//! Rules run in a fixed order and the first failure is reported:
//!
//! 1. mode is `sequential`, `parallel` or `conditional`
//! 2. at least one step
//! 3. unique step ids
//! 4. every dependency names a declared step
//! 5. no step depends on itself
//! 6. no dependency cycle
//! 7. timeouts parse as positive durations
//! 8. conditions are well-formed context keys

use super::duration::parse_duration;
use super::graph::DependencyGraph;
use super::spec::{AgentStepSpec, PipelineConfig, PipelineSpec};
use crate::context::ContextKey;
use crate::core::ExecutionMode;
use crate::errors::PipelineValidationError;
use std::collections::HashSet;

/// Validates a document and builds the executable specification.
///
/// Validation is pure: the same document always yields the same result.
///
/// # Errors
///
/// Returns the first broken rule, with the message callers can match on.
pub fn load(config: &PipelineConfig) -> Result<PipelineSpec, PipelineValidationError> {
    let section = &config.pipeline;

    let mode = ExecutionMode::parse(&section.mode)
        .ok_or_else(|| PipelineValidationError::invalid_mode(&section.mode))?;

    if section.agents.is_empty() {
        return Err(PipelineValidationError::no_agents());
    }

    let mut seen = HashSet::new();
    for step in &section.agents {
        if !seen.insert(step.id.as_str()) {
            return Err(PipelineValidationError::duplicate_agent(&step.id));
        }
    }

    for step in &section.agents {
        for dep in &step.depends_on {
            if !seen.contains(dep.as_str()) {
                return Err(PipelineValidationError::unknown_dependency(&step.id, dep));
            }
        }
    }

    for step in &section.agents {
        if step.depends_on.contains(&step.id) {
            return Err(PipelineValidationError::self_dependency(&step.id));
        }
    }

    let graph = DependencyGraph::new(
        section
            .agents
            .iter()
            .map(|s| (s.id.as_str(), s.depends_on.as_slice())),
    );
    graph.detect_cycle()?;

    let mut agents = Vec::with_capacity(section.agents.len());
    for step in &section.agents {
        let timeout = parse_duration(&step.timeout)?;
        agents.push(AgentStepSpec {
            id: step.id.clone(),
            enabled: step.enabled,
            depends_on: step.depends_on.clone(),
            timeout,
            retry_count: step.retry,
            conditions: step.conditions.clone(),
        });
    }

    for step in &section.agents {
        for key in &step.conditions {
            if ContextKey::parse(key).is_err() {
                return Err(PipelineValidationError::invalid_context_key(&step.id, key));
            }
        }
    }

    tracing::debug!(mode = %mode, agents = agents.len(), "Pipeline specification validated");
    Ok(PipelineSpec::new(mode, agents))
}

/// Checks a document without keeping the result.
///
/// # Errors
///
/// See [`load`].
pub fn validate(config: &PipelineConfig) -> Result<(), PipelineValidationError> {
    load(config).map(|_| ())
}
