//! Logging setup for applications embedding the orchestrator.

mod logging;

pub use logging::{init_logging, LogFormat, LoggingConfig, DEFAULT_LOG_LEVEL};
