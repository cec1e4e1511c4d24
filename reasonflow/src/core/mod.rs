//! Core domain enums shared by the context model and the scheduler.

mod status;

pub use status::{AgentStatus, ExecutionMode};
