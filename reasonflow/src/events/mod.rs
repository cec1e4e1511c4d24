//! Run event notifications.
//!
//! The scheduler reports progress through an [`EventSink`] attached to it.
//! A streaming layer can forward these events as they arrive; the audit
//! namespace of the final context carries the same information in durable
//! form.

mod sink;

pub use sink::{CollectingEventSink, EventKind, EventSink, LoggingEventSink, NoOpEventSink};
