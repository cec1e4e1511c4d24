//! The reasoning context threaded through every pipeline run.
//!
//! This module provides:
//! - The versioned, namespaced [`ReasoningContext`] with deep clone and diff
//! - Immutable run metadata
//! - Typed namespace sections and their item types
//! - Dotted `namespace.field` key parsing

mod diff;
mod keys;
mod metadata;
mod model;
mod namespaces;
#[cfg(test)]
mod context_tests;

pub use diff::{ContextDiff, FieldChange};
pub use keys::{ContextKey, Namespace, METADATA_ROOT};
pub use metadata::{ContextMetadata, DEFAULT_LOCALE};
pub use model::{is_empty_value, ReasoningContext, CONTEXT_SCHEMA_VERSION};
pub use namespaces::{
    AgentMetrics, AgentRunRecord, Alternative, Artifact, AuditNamespace, Conclusion, Confidence,
    DerivedKnowledge, DiagnosticError, DiagnosticWarning, DiagnosticsNamespace, EnrichmentNamespace,
    Entity, Fact, Hypothesis, InferenceStep, Intent, LlmDecision, LlmNamespace, LlmUsage,
    PerformanceSummary, ReasoningNamespace, Relationship, RetrievalNamespace, RetrievalPlan,
    RetrievalQuery, Severity, Summary, ValidationReport,
};
