//! Mock agents for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::agent::Agent;
use crate::cancellation::CancellationToken;
use crate::context::ReasoningContext;

/// An agent that satisfies its own postconditions with placeholder values.
///
/// For each declared postcondition the stub writes an explicit value if one
/// was configured with [`with_value`](Self::with_value), otherwise the first
/// placeholder that fits the field's type. An optional delay makes it usable
/// as a slow agent; the delay honours cancellation.
#[derive(Debug)]
pub struct StubAgent {
    id: String,
    preconditions: Vec<String>,
    postconditions: Vec<String>,
    values: BTreeMap<String, Value>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    seen_sessions: Mutex<Vec<String>>,
}

impl StubAgent {
    /// Creates a stub with no contract.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            preconditions: Vec::new(),
            postconditions: Vec::new(),
            values: BTreeMap::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            seen_sessions: Mutex::new(Vec::new()),
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

    /// Writes `value` at `key` instead of a placeholder.
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: Value) -> Self {
        self.values.insert(key.into(), value);
        self
    }

    /// Sleeps before producing output.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Returns how many times `execute` ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the session id of every context the stub received.
    #[must_use]
    pub fn seen_sessions(&self) -> Vec<String> {
        self.seen_sessions.lock().clone()
    }

    fn fill(&self, mut ctx: ReasoningContext) -> anyhow::Result<ReasoningContext> {
        for key in &self.postconditions {
            if let Some(value) = self.values.get(key) {
                ctx.set(key, value.clone())?;
            } else {
                fill_placeholder(&mut ctx, key, &self.id)?;
            }
        }
        Ok(ctx)
    }
}

#[async_trait]
impl Agent for StubAgent {
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
        cancel: &CancellationToken,
        ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen_sessions
            .lock()
            .push(ctx.metadata().session_id().to_string());

        if let Some(delay) = self.delay {
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => anyhow::bail!("{} interrupted", self.id),
            }
        }
        self.fill(ctx)
    }
}

/// Writes a type-appropriate non-empty placeholder at `key`.
///
/// Leaves already-populated keys alone.
fn fill_placeholder(ctx: &mut ReasoningContext, key: &str, id: &str) -> anyhow::Result<()> {
    if ctx.has_value(key) {
        return Ok(());
    }
    let current = ctx.get(key).unwrap_or(Value::Null);
    let candidates = match &current {
        Value::Array(items) if items.is_empty() => vec![
            json!([{}]),
            json!([id]),
            json!([{"timestamp": chrono::Utc::now(), "agent_id": id, "passed": true}]),
        ],
        Value::Object(map) if map.is_empty() => vec![json!({ id: 1.0 })],
        // A struct still at its defaults.
        Value::Object(map) => vec![Value::Object(
            map.iter()
                .map(|(field, value)| (field.clone(), populated(value, id)))
                .collect(),
        )],
        Value::String(s) if s.is_empty() => vec![json!(format!("{id}-output"))],
        Value::Null => vec![json!(format!("{id}-output")), json!({})],
        _ => return Ok(()),
    };

    for candidate in candidates {
        if ctx.set(key, candidate).is_ok() {
            return Ok(());
        }
    }
    anyhow::bail!("no placeholder fits {key}")
}

fn populated(value: &Value, id: &str) -> Value {
    match value {
        Value::Number(n) if n.is_u64() || n.is_i64() => json!(1),
        Value::Number(_) => json!(1.0),
        Value::String(s) if s.is_empty() => json!(id),
        other => other.clone(),
    }
}

/// An agent that always fails.
#[derive(Debug)]
pub struct FailingAgent {
    id: String,
    error: String,
    postconditions: Vec<String>,
    calls: AtomicUsize,
}

impl FailingAgent {
    /// Creates a new failing agent.
    #[must_use]
    pub fn new(id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            error: error.into(),
            postconditions: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Declares postconditions it will never honour.
    #[must_use]
    pub fn provides<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.postconditions = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Returns how many times `execute` ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FailingAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn postconditions(&self) -> Vec<String> {
        self.postconditions.clone()
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        _ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("{}", self.error)
    }
}

/// An agent that fails a fixed number of times, then behaves like a stub.
#[derive(Debug)]
pub struct FlakyAgent {
    inner: StubAgent,
    failures: usize,
    calls: AtomicUsize,
}

impl FlakyAgent {
    /// Creates an agent that fails the first `failures` calls.
    #[must_use]
    pub fn new(inner: StubAgent, failures: usize) -> Self {
        Self {
            inner,
            failures,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times `execute` ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for FlakyAgent {
    fn agent_id(&self) -> &str {
        self.inner.agent_id()
    }

    fn preconditions(&self) -> Vec<String> {
        self.inner.preconditions()
    }

    fn postconditions(&self) -> Vec<String> {
        self.inner.postconditions()
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            anyhow::bail!("transient failure {call}");
        }
        self.inner.execute(cancel, ctx).await
    }
}

/// An agent that declares postconditions but returns the context untouched.
#[derive(Debug)]
pub struct ContractBreakingAgent {
    id: String,
    postconditions: Vec<String>,
    calls: AtomicUsize,
}

impl ContractBreakingAgent {
    /// Creates an agent promising `keys` without writing them.
    #[must_use]
    pub fn new<I, S>(id: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.into(),
            postconditions: keys.into_iter().map(Into::into).collect(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns how many times `execute` ran.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Agent for ContractBreakingAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    fn postconditions(&self) -> Vec<String> {
        self.postconditions.clone()
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ctx)
    }
}

/// An agent that honours its contract but also writes an undeclared key.
#[derive(Debug)]
pub struct TrespassingAgent {
    inner: StubAgent,
    stray_key: String,
    stray_value: Value,
}

impl TrespassingAgent {
    /// Wraps `inner` and additionally writes `stray_value` at `stray_key`.
    #[must_use]
    pub fn new(inner: StubAgent, stray_key: impl Into<String>, stray_value: Value) -> Self {
        Self {
            inner,
            stray_key: stray_key.into(),
            stray_value,
        }
    }
}

#[async_trait]
impl Agent for TrespassingAgent {
    fn agent_id(&self) -> &str {
        self.inner.agent_id()
    }

    fn preconditions(&self) -> Vec<String> {
        self.inner.preconditions()
    }

    fn postconditions(&self) -> Vec<String> {
        self.inner.postconditions()
    }

    async fn execute(
        &self,
        cancel: &CancellationToken,
        ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        let mut ctx = self.inner.execute(cancel, ctx).await?;
        ctx.set(&self.stray_key, self.stray_value.clone())?;
        Ok(ctx)
    }
}

/// An agent that panics when executed.
#[derive(Debug)]
pub struct PanickingAgent {
    id: String,
}

impl PanickingAgent {
    /// Creates a new panicking agent.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

#[async_trait]
impl Agent for PanickingAgent {
    fn agent_id(&self) -> &str {
        &self.id
    }

    async fn execute(
        &self,
        _cancel: &CancellationToken,
        _ctx: ReasoningContext,
    ) -> anyhow::Result<ReasoningContext> {
        panic!("agent {} panicked", self.id)
    }
}
