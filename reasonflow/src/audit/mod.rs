//! Audit trail and diagnostics recording.
//!
//! The scheduler collects everything a step produced in a [`StepAudit`] and
//! hands it to [`record_step`] once the step's output has been merged, so
//! concurrent branches never race on the audit namespace.

mod recorder;
mod trace;

pub use recorder::{finish_run, record_skip, record_step, SkipCause, StepAudit};
pub use trace::render_trace;
