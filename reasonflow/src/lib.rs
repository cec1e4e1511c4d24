//! # Reasonflow
//!
//! An orchestrator for multi-agent LLM reasoning pipelines.
//!
//! A pipeline document declares which agents run, in which order, under
//! which timeouts and retry budgets. Reasonflow validates the document,
//! then threads a namespaced [`ReasoningContext`](context::ReasoningContext)
//! through the agents:
//!
//! - **Contracts**: every agent declares the keys it reads and writes; both
//!   are checked around each execution
//! - **Three execution modes**: sequential, parallel by dependency level,
//!   and conditional on context keys
//! - **Audit trail**: one record per attempt plus a per-step diff, kept in
//!   the context itself
//! - **Cancellation**: cooperative, propagated to running agents
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use reasonflow::prelude::*;
//!
//! let spec = PipelineConfig::from_yaml(r#"
//! pipeline:
//!   mode: sequential
//!   agents:
//!     - id: intent
//!     - id: summary
//!       timeout: 10s
//! "#)?.load()?;
//!
//! let mut registry = AgentRegistry::new();
//! registry.register(Arc::new(IntentAgent::default()))?;
//! registry.register(Arc::new(SummaryAgent::default()))?;
//!
//! let scheduler = Scheduler::new(spec, registry)?;
//! let ctx = scheduler.run(ReasoningContext::for_session("s-1")).await.into_result()?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agent;
pub mod audit;
pub mod cancellation;
pub mod context;
pub mod contracts;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agent::{Agent, AgentRegistry, FnAgent};
    pub use crate::audit::render_trace;
    pub use crate::cancellation::CancellationToken;
    pub use crate::context::{ContextKey, ContextMetadata, Namespace, ReasoningContext};
    pub use crate::contracts::AgentContract;
    pub use crate::core::{AgentStatus, ExecutionMode};
    pub use crate::errors::{
        CycleDetectedError, PipelineValidationError, ReasonflowError, RegistrationError,
    };
    pub use crate::events::{CollectingEventSink, EventKind, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_logging, LogFormat, LoggingConfig};
    pub use crate::pipeline::{
        PipelineConfig, PipelineRun, PipelineSpec, Scheduler, SchedulerOptions, StepConfig,
    };
    pub use std::sync::Arc;
}
