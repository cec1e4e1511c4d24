//! The agent contract and the registry that owns agent instances.
//!
//! Agents are the units of work in a reasoning pipeline. The orchestrator
//! never looks inside an agent; it only calls the four contract methods.

mod registry;

pub use registry::AgentRegistry;

use crate::cancellation::CancellationToken;
use crate::context::ReasoningContext;
use async_trait::async_trait;
use std::fmt::Debug;

/// Trait for pipeline agents.
///
/// Keys returned by [`preconditions`](Self::preconditions) and
/// [`postconditions`](Self::postconditions) are dotted `namespace.field`
/// paths. Preconditions must be populated before `execute` is called;
/// postconditions must be populated when it returns, and name the only
/// namespaces the agent may write.
#[async_trait]
pub trait Agent: Send + Sync + Debug {
    /// Returns the id the agent is registered under.
    fn agent_id(&self) -> &str;

    /// Keys that must be non-empty before the agent runs.
    fn preconditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Keys the agent guarantees to populate on success.
    fn postconditions(&self) -> Vec<String> {
        Vec::new()
    }

    /// Runs the agent against its own copy of the context.
    ///
    /// # Arguments
    ///
    /// * `cancel` - Step-scoped token, cancelled on timeout or run cancellation
    /// * `ctx` - The context to enrich
    ///
    /// # Returns
    ///
    /// The enriched context, or the reason the agent could not complete.
    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext>;
}

/// A synchronous function-based agent.
pub struct FnAgent<F>
where
    F: Fn(ReasoningContext) -> anyhow::Result<ReasoningContext> + Send + Sync,
{
    id: String,
    preconditions: Vec<String>,
    postconditions: Vec<String>,
    func: F,
}

impl<F> FnAgent<F>
where
    F: Fn(ReasoningContext) -> anyhow::Result<ReasoningContext> + Send + Sync,
{
    /// Creates a new function-based agent.
    pub fn new(id: impl Into<String>, func: F) -> Self {
        Self {
            id: id.into(),
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            func,
        }
    }

    /// Declares the keys required before execution.
    #[must_use]
    pub fn requires<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preconditions = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Declares the keys populated by execution.
    #[must_use]
    pub fn provides<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.postconditions = keys.into_iter().map(Into::into).collect();
        self
    }
}

impl<F> Debug for FnAgent<F>
where
    F: Fn(ReasoningContext) -> anyhow::Result<ReasoningContext> + Send + Sync,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnAgent")
            .field("id", &self.id)
            .field("preconditions", &self.preconditions)
            .field("postconditions", &self.postconditions)
            .finish()
    }
}

#[async_trait]
impl<F> Agent for FnAgent<F>
where
    F: Fn(ReasoningContext) -> anyhow::Result<ReasoningContext> + Send + Sync,
{
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn preconditions(&self) -> Vec<String> {
        self.preconditions.clone()
    }

    fn postconditions(&self) -> Vec<String> {
        self.postconditions.clone()
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        (self.func)(ctx)
    }
}
