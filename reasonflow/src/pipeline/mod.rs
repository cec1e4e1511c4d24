//! Pipeline documents, validation and execution.
//!
//! This module provides:
//! - YAML/JSON pipeline documents and their validated specification
//! - The dependency graph and level computation
//! - The scheduler running sequential, parallel and conditional pipelines

mod duration;
mod executor;
mod graph;
mod scheduler;
mod spec;
mod validator;


pub use duration::{format_duration, parse_duration};
pub use graph::DependencyGraph;
pub use scheduler::{PipelineRun, Scheduler, SchedulerOptions, StepReport, DISABLED_REASON};
pub use spec::{
    AgentStepSpec, PipelineConfig, PipelineSection, PipelineSpec, StepConfig, DEFAULT_TIMEOUT,
};
pub use validator::{load, validate};
