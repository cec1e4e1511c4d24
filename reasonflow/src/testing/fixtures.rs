//! Test fixtures for pipeline testing.

use std::sync::Arc;

use crate::agent::{Agent, AgentRegistry};
use crate::context::{ContextMetadata, ReasoningContext};

/// Session id carried by [`empty_context`].
pub const EMPTY_SESSION_ID: &str = "session-empty";

/// Returns a context with fixed metadata and every namespace empty.
#[must_use]
pub fn empty_context() -> ReasoningContext {
    ReasoningContext::new(
        ContextMetadata::new()
            .with_session_id(EMPTY_SESSION_ID)
            .with_trace_id("trace-empty"),
    )
}

/// Returns an empty context with `input` stored at `llm.cache.user_input`.
#[must_use]
pub fn seeded_context(input: impl Into<String>) -> ReasoningContext {
    let mut ctx = empty_context();
    ctx.llm
        .cache
        .insert("user_input".to_string(), serde_json::Value::String(input.into()));
    ctx
}

/// Builds a registry from a list of agents.
///
/// # Panics
///
/// Panics if any agent fails registration.
#[must_use]
pub fn registry_of(agents: Vec<Arc<dyn Agent>>) -> AgentRegistry {
    let mut registry = AgentRegistry::new();
    for agent in agents {
        let id = agent.agent_id().to_string();
        registry
            .register(agent)
            .unwrap_or_else(|e| panic!("failed to register {id}: {e}"));
    }
    registry
}
