//! Structured cancellation for pipeline runs.
//!
//! A run-scoped [`CancellationToken`] is supplied by the caller; every step
//! execution receives a child token that is additionally cancelled when the
//! step exceeds its time budget.

mod token;

pub use token::{CancelCallback, CancellationToken};
