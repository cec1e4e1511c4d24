//! Event sink trait and implementations.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, Level};

/// The progress events a run emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// `pipeline.started`
    #[serde(rename = "pipeline.started")]
    PipelineStarted,
    /// `agent.started`, once per attempt.
    #[serde(rename = "agent.started")]
    AgentStarted,
    /// `agent.completed`
    #[serde(rename = "agent.completed")]
    AgentCompleted,
    /// `agent.failed`, once the step gives up.
    #[serde(rename = "agent.failed")]
    AgentFailed,
    /// `agent.skipped`
    #[serde(rename = "agent.skipped")]
    AgentSkipped,
    /// `agent.retrying`, before each retry.
    #[serde(rename = "agent.retrying")]
    AgentRetrying,
    /// `pipeline.completed`
    #[serde(rename = "pipeline.completed")]
    PipelineCompleted,
}

impl EventKind {
    /// Returns the dotted event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PipelineStarted => "pipeline.started",
            Self::AgentStarted => "agent.started",
            Self::AgentCompleted => "agent.completed",
            Self::AgentFailed => "agent.failed",
            Self::AgentSkipped => "agent.skipped",
            Self::AgentRetrying => "agent.retrying",
            Self::PipelineCompleted => "pipeline.completed",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver of run events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Emits an event asynchronously.
    async fn emit(&self, kind: EventKind, data: Value);

    /// Emits an event without blocking.
    ///
    /// Must never panic; the scheduler calls it from inside the run.
    fn try_emit(&self, kind: EventKind, data: Value);
}

/// Discards all events. The scheduler's default.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpEventSink;

#[async_trait]
impl EventSink for NoOpEventSink {
    async fn emit(&self, _kind: EventKind, _data: Value) {}

    fn try_emit(&self, _kind: EventKind, _data: Value) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingEventSink {
    level: Level,
}

impl Default for LoggingEventSink {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingEventSink {
    /// Creates a logging sink at the given level. Anything other than
    /// `DEBUG` logs at `INFO`.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level logging sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }

    fn log_event(&self, kind: EventKind, data: &Value) {
        let agent_id = data.get("agent_id").and_then(Value::as_str).unwrap_or("-");
        if self.level == Level::DEBUG {
            debug!(event = %kind, agent_id, event_data = %data, "Event: {kind}");
        } else {
            info!(event = %kind, agent_id, event_data = %data, "Event: {kind}");
        }
    }
}

#[async_trait]
impl EventSink for LoggingEventSink {
    async fn emit(&self, kind: EventKind, data: Value) {
        self.log_event(kind, &data);
    }

    fn try_emit(&self, kind: EventKind, data: Value) {
        self.log_event(kind, &data);
    }
}

/// Keeps every event in memory, for tests and polling consumers.
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: RwLock<Vec<(EventKind, Value)>>,
}

impl CollectingEventSink {
    /// Creates a new collecting sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all collected events.
    #[must_use]
    pub fn events(&self) -> Vec<(EventKind, Value)> {
        self.events.read().clone()
    }

    /// Returns the kinds of all collected events, in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.read().iter().map(|(k, _)| *k).collect()
    }

    /// Returns the payloads of one kind of event.
    #[must_use]
    pub fn events_of(&self, kind: EventKind) -> Vec<Value> {
        self.events
            .read()
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, data)| data.clone())
            .collect()
    }

    /// Returns the kinds of the events concerning one agent.
    #[must_use]
    pub fn kinds_for(&self, agent_id: &str) -> Vec<EventKind> {
        self.events
            .read()
            .iter()
            .filter(|(_, data)| data.get("agent_id").and_then(Value::as_str) == Some(agent_id))
            .map(|(k, _)| *k)
            .collect()
    }

    /// Returns the number of collected events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    /// Returns true if no events have been collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// Clears all collected events.
    pub fn clear(&self) {
        self.events.write().clear();
    }
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, kind: EventKind, data: Value) {
        self.events.write().push((kind, data));
    }

    fn try_emit(&self, kind: EventKind, data: Value) {
        self.events.write().push((kind, data));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_noop_and_logging_sinks() {
        tokio_test::block_on(NoOpEventSink.emit(EventKind::PipelineStarted, json!({})));
        LoggingEventSink::default().try_emit(EventKind::AgentStarted, json!({"agent_id": "a"}));
        tokio_test::block_on(
            LoggingEventSink::debug().emit(EventKind::AgentCompleted, json!({"agent_id": "a"})),
        );
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::AgentRetrying.to_string(), "agent.retrying");
        assert_eq!(
            serde_json::to_value(EventKind::PipelineCompleted).unwrap(),
            json!("pipeline.completed")
        );
    }

    #[tokio::test]
    async fn test_collecting_sink() {
        let sink = CollectingEventSink::new();
        assert!(sink.is_empty());

        sink.emit(EventKind::PipelineStarted, json!({"mode": "sequential"})).await;
        sink.try_emit(EventKind::AgentStarted, json!({"agent_id": "a", "attempt": 1}));
        sink.try_emit(EventKind::AgentCompleted, json!({"agent_id": "a"}));
        sink.try_emit(EventKind::AgentStarted, json!({"agent_id": "b", "attempt": 1}));

        assert_eq!(sink.len(), 4);
        assert_eq!(sink.events_of(EventKind::AgentStarted).len(), 2);
        assert_eq!(
            sink.kinds_for("a"),
            vec![EventKind::AgentStarted, EventKind::AgentCompleted]
        );

        sink.clear();
        assert!(sink.is_empty());
    }
}
