//! Pipeline documents and the validated specifications built from them.
//!
//! [`PipelineConfig`] is the raw serde model of a pipeline document:
//!
//! ```yaml
//! pipeline:
//!   mode: parallel
//!   agents:
//!     - id: intent
//!     - id: retrieval
//!       depends_on: [intent]
//!       timeout: 5s
//!       retry: 2
//! ```
//!
//! It carries unchecked strings. [`PipelineSpec`] is what
//! [`load`](super::load) produces from it once every rule has passed, and it
//! is the only form the scheduler accepts.

use super::duration::serde_str;
use super::validator;
use crate::core::ExecutionMode;
use crate::errors::PipelineValidationError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timeout applied to steps that do not declare one.
pub const DEFAULT_TIMEOUT: &str = "30s";

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> String {
    DEFAULT_TIMEOUT.to_string()
}

/// A pipeline document as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// The `pipeline:` root.
    pub pipeline: PipelineSection,
}

/// Body of the `pipeline:` root.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineSection {
    /// `sequential`, `parallel` or `conditional`.
    #[serde(default)]
    pub mode: String,
    /// Steps in declaration order.
    #[serde(default)]
    pub agents: Vec<StepConfig>,
}

/// One step as written by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Step id; also the id of the agent that runs it.
    pub id: String,
    /// Disabled steps never run.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Ids this step waits for in parallel mode.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Total budget across all attempts.
    #[serde(default = "default_timeout")]
    pub timeout: String,
    /// Additional attempts after the first failure.
    #[serde(default, alias = "retry_count")]
    pub retry: u32,
    /// Keys that must be populated for the step to run in conditional mode.
    #[serde(default)]
    pub conditions: Vec<String>,
}

impl StepConfig {
    /// Creates a step with default settings.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            depends_on: Vec::new(),
            timeout: default_timeout(),
            retry: 0,
            conditions: Vec::new(),
        }
    }

    /// Sets the dependencies.
    #[must_use]
    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the timeout string.
    #[must_use]
    pub fn with_timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = timeout.into();
        self
    }

    /// Sets the retry count.
    #[must_use]
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the run conditions.
    #[must_use]
    pub fn with_conditions<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.conditions = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Disables the step.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

impl PipelineConfig {
    /// Creates an empty document for `mode`.
    #[must_use]
    pub fn new(mode: impl Into<String>) -> Self {
        Self {
            pipeline: PipelineSection {
                mode: mode.into(),
                agents: Vec::new(),
            },
        }
    }

    /// Appends a step.
    #[must_use]
    pub fn with_step(mut self, step: StepConfig) -> Self {
        self.pipeline.agents.push(step);
        self
    }

    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` validation error if the text is not a pipeline
    /// document.
    pub fn from_yaml(text: &str) -> Result<Self, PipelineValidationError> {
        serde_yaml::from_str(text).map_err(PipelineValidationError::parse)
    }

    /// Parses a JSON document.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` validation error if the text is not a pipeline
    /// document.
    pub fn from_json(text: &str) -> Result<Self, PipelineValidationError> {
        serde_json::from_str(text).map_err(PipelineValidationError::parse)
    }

    /// Reads a document from disk. `.json` files are parsed as JSON, anything
    /// else as YAML.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` validation error if the file cannot be read or
    /// parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PipelineValidationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineValidationError::parse(format!("{}: {e}", path.display()))
        })?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        tracing::debug!(path = %path.display(), json = is_json, "Loading pipeline document");

        if is_json {
            Self::from_json(&text)
        } else {
            Self::from_yaml(&text)
        }
    }

    /// Encodes the document as YAML.
    ///
    /// # Errors
    ///
    /// Returns a `Parse` validation error if encoding fails.
    pub fn to_yaml(&self) -> Result<String, PipelineValidationError> {
        serde_yaml::to_string(self).map_err(PipelineValidationError::parse)
    }

    /// Validates the document, producing an executable specification.
    ///
    /// # Errors
    ///
    /// Returns the first rule the document breaks.
    pub fn load(&self) -> Result<PipelineSpec, PipelineValidationError> {
        validator::load(self)
    }
}

/// A validated step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentStepSpec {
    /// Step id; also the registry key of its agent.
    pub id: String,
    /// Disabled steps never run.
    pub enabled: bool,
    /// Dependencies, in declaration order.
    pub depends_on: Vec<String>,
    /// Total budget across all attempts.
    #[serde(serialize_with = "serde_str::serialize")]
    pub timeout: Duration,
    /// Additional attempts after the first failure.
    pub retry_count: u32,
    /// Keys gating the step in conditional mode.
    pub conditions: Vec<String>,
}

impl AgentStepSpec {
    /// Returns the total number of attempts the step may make.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

/// A validated pipeline: mode plus steps in declaration order.
///
/// Only [`load`](super::load) constructs one, so holding a `PipelineSpec`
/// means every validation rule has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSpec {
    mode: ExecutionMode,
    agents: Vec<AgentStepSpec>,
}

impl PipelineSpec {
    pub(crate) fn new(mode: ExecutionMode, agents: Vec<AgentStepSpec>) -> Self {
        Self { mode, agents }
    }

    /// Parses and validates a YAML document in one go.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn from_yaml(text: &str) -> Result<Self, PipelineValidationError> {
        PipelineConfig::from_yaml(text)?.load()
    }

    /// Parses and validates a JSON document in one go.
    ///
    /// # Errors
    ///
    /// Returns a parse or validation error.
    pub fn from_json(text: &str) -> Result<Self, PipelineValidationError> {
        PipelineConfig::from_json(text)?.load()
    }

    /// Returns the execution mode.
    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    /// Returns every step in declaration order.
    #[must_use]
    pub fn agents(&self) -> &[AgentStepSpec] {
        &self.agents
    }

    /// Looks up a step by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AgentStepSpec> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// Returns the enabled steps in declaration order.
    pub fn enabled_agents(&self) -> impl Iterator<Item = &AgentStepSpec> {
        self.agents.iter().filter(|a| a.enabled)
    }

    /// Returns the number of steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Always false for a validated spec.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
