//! Typed namespace sections of the reasoning context.
//!
//! Every struct here deserializes from partial JSON (all fields default) so
//! agents and test doubles can write minimal objects through
//! [`super::ReasoningContext::set`].

use super::diff::ContextDiff;
use crate::core::AgentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A score bounded to `[0.0, 1.0]`.
///
/// Out-of-range inputs are clamped and NaN becomes `0.0`, both on
/// construction and on deserialization.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Confidence(f64);

impl Confidence {
    /// Creates a clamped confidence value.
    #[must_use]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Returns the raw value.
    #[must_use]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl From<f64> for Confidence {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

impl From<Confidence> for f64 {
    fn from(value: Confidence) -> Self {
        value.0
    }
}

/// A classified user intent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Intent {
    /// Intent label, e.g. `question` or `comparison`.
    pub name: String,
    /// Classifier confidence.
    pub confidence: Confidence,
    /// Text spans that triggered the intent.
    pub evidence: Vec<String>,
}

/// A named entity found in the input.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    /// Surface text.
    pub text: String,
    /// Entity type.
    #[serde(rename = "type")]
    pub kind: String,
    /// Extraction confidence.
    pub confidence: Confidence,
}

/// A candidate explanation under evaluation.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Hypothesis {
    /// Stable id referenced by conclusions.
    pub id: String,
    /// The hypothesis text.
    pub statement: String,
    /// Current belief.
    pub confidence: Confidence,
    /// Ids of facts supporting it.
    pub supporting_facts: Vec<String>,
}

/// A conclusion drawn from hypotheses and facts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Conclusion {
    /// The conclusion text.
    pub statement: String,
    /// Belief in the conclusion.
    pub confidence: Confidence,
    /// Hypotheses the conclusion rests on.
    pub hypothesis_ids: Vec<String>,
}

/// A rejected or lower-ranked line of reasoning.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alternative {
    /// The alternative text.
    pub statement: String,
    /// Belief in the alternative.
    pub confidence: Confidence,
    /// Why it was not preferred.
    pub reason: String,
}

/// One link of the inference chain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceStep {
    /// Position in the chain, starting at 1.
    pub step: u32,
    /// What was assumed.
    pub premise: String,
    /// What was inferred.
    pub inference: String,
    /// Strength of the inference.
    pub confidence: Confidence,
}

/// The validated summary handed to prompt construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Summary {
    /// Summary text.
    pub text: String,
    /// Bullet points.
    pub key_points: Vec<String>,
    /// Overall confidence.
    pub confidence: Confidence,
}

/// Intents through the final summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReasoningNamespace {
    /// Detected intents.
    pub intents: Vec<Intent>,
    /// Extracted entities.
    pub entities: Vec<Entity>,
    /// Candidate hypotheses.
    pub hypotheses: Vec<Hypothesis>,
    /// Drawn conclusions.
    pub conclusions: Vec<Conclusion>,
    /// Alternatives considered.
    pub alternatives: Vec<Alternative>,
    /// Ordered inference chain.
    pub inference_chain: Vec<InferenceStep>,
    /// Named confidence scores.
    pub confidence_scores: BTreeMap<String, Confidence>,
    /// Final summary.
    pub summary: Option<Summary>,
}

/// A normalized fact.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Fact {
    /// Stable id.
    pub id: String,
    /// Fact content.
    pub content: String,
    /// Where it came from.
    pub source: String,
    /// Evidence confidence.
    pub confidence: Confidence,
}

/// Knowledge inferred from several facts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivedKnowledge {
    /// The derived statement.
    pub statement: String,
    /// Fact ids it was derived from.
    pub derived_from: Vec<String>,
    /// Derivation confidence.
    pub confidence: Confidence,
}

/// A subject-predicate-object relationship.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Relationship {
    /// Subject.
    pub subject: String,
    /// Predicate.
    pub predicate: String,
    /// Object.
    pub object: String,
    /// Relationship confidence.
    pub confidence: Confidence,
}

/// Facts, derived knowledge and relationships.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentNamespace {
    /// Normalized facts.
    pub facts: Vec<Fact>,
    /// Derived knowledge.
    pub derived_knowledge: Vec<DerivedKnowledge>,
    /// Relationships between entities.
    pub relationships: Vec<Relationship>,
}

/// A plan describing what to retrieve and from where.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalPlan {
    /// Stable id.
    pub id: String,
    /// Strategy name, e.g. `semantic` or `keyword`.
    pub strategy: String,
    /// Sources to consult.
    pub sources: Vec<String>,
    /// Lower runs first.
    pub priority: u32,
}

/// A concrete query issued against a source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalQuery {
    /// Query text.
    pub text: String,
    /// Target source.
    pub source: String,
    /// Plan the query belongs to.
    pub plan_id: Option<String>,
}

/// A retrieved document or snippet.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Artifact {
    /// Stable id.
    pub id: String,
    /// Origin of the artifact.
    pub source: String,
    /// Retrieved content.
    pub content: String,
    /// Relevance to the request.
    pub relevance: Confidence,
    /// Free-form attributes.
    pub metadata: BTreeMap<String, serde_json::Value>,
}

/// Plans, queries and artifacts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalNamespace {
    /// Retrieval plans.
    pub plans: Vec<RetrievalPlan>,
    /// Issued queries.
    pub queries: Vec<RetrievalQuery>,
    /// Retrieved artifacts.
    pub artifacts: Vec<Artifact>,
}

/// Accumulated LLM usage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmUsage {
    /// Number of completed calls.
    pub calls: u64,
    /// Prompt tokens.
    pub prompt_tokens: u64,
    /// Completion tokens.
    pub completion_tokens: u64,
    /// Total tokens.
    pub total_tokens: u64,
    /// Cost in USD.
    pub cost: f64,
}

impl LlmUsage {
    /// Returns the usage accrued since `earlier`, saturating at zero.
    #[must_use]
    pub fn since(&self, earlier: &Self) -> Self {
        Self {
            calls: self.calls.saturating_sub(earlier.calls),
            prompt_tokens: self.prompt_tokens.saturating_sub(earlier.prompt_tokens),
            completion_tokens: self.completion_tokens.saturating_sub(earlier.completion_tokens),
            total_tokens: self.total_tokens.saturating_sub(earlier.total_tokens),
            cost: (self.cost - earlier.cost).max(0.0),
        }
    }
}

/// A decision an agent took with LLM assistance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmDecision {
    /// Deciding agent.
    pub agent_id: String,
    /// What was decided.
    pub decision: String,
    /// Why.
    pub rationale: String,
}

/// Provider, model, usage and decisions.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmNamespace {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Usage counters.
    pub usage: LlmUsage,
    /// Recorded decisions.
    pub decisions: Vec<LlmDecision>,
    /// Free-form cache.
    pub cache: BTreeMap<String, serde_json::Value>,
}

/// Severity of a diagnostics entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Informational.
    Info,
    /// Degraded but usable.
    Warning,
    /// A step failed.
    #[default]
    Error,
    /// The run cannot produce a result.
    Critical,
}

/// Output of a validation agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// When the report was produced.
    pub timestamp: DateTime<Utc>,
    /// Producing agent.
    pub agent_id: String,
    /// Whether validation passed.
    pub passed: bool,
    /// Problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Fixes applied automatically.
    #[serde(default)]
    pub auto_fixes: Vec<String>,
}

/// An error surfaced by the orchestrator or an agent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticError {
    /// Attributed agent.
    pub agent_id: String,
    /// Error text.
    pub message: String,
    /// Severity.
    #[serde(default)]
    pub severity: Severity,
}

/// A non-fatal observation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiagnosticWarning {
    /// Attributed agent.
    pub agent_id: String,
    /// Warning text.
    pub message: String,
}

/// Per-agent performance numbers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentMetrics {
    /// Wall time across all attempts.
    pub duration_ms: f64,
    /// LLM calls made during the step.
    pub llm_calls: u64,
    /// Final status.
    pub status: AgentStatus,
    /// Tokens used during the step.
    pub tokens: u64,
    /// Cost accrued during the step.
    pub cost: f64,
}

/// Run-level performance summary.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceSummary {
    /// Wall time of the whole run.
    pub total_duration_ms: f64,
    /// Metrics keyed by agent id.
    pub agent_metrics: BTreeMap<String, AgentMetrics>,
}

/// Errors, warnings, validation reports and performance.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsNamespace {
    /// Recorded errors.
    pub errors: Vec<DiagnosticError>,
    /// Recorded warnings.
    pub warnings: Vec<DiagnosticWarning>,
    /// Validation reports.
    pub validation_reports: Vec<ValidationReport>,
    /// Performance summary.
    pub performance: PerformanceSummary,
}

/// One attempted (or skipped) step execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunRecord {
    /// The step id.
    pub agent_id: String,
    /// 1-based attempt number; 0 for skipped steps.
    pub attempt: u32,
    /// Attempt start.
    pub start_time: DateTime<Utc>,
    /// Attempt end.
    pub end_time: DateTime<Utc>,
    /// Attempt duration.
    pub duration_ms: f64,
    /// Outcome of the attempt.
    pub status: AgentStatus,
    /// Keys changed by the attempt.
    #[serde(default)]
    pub keys_written: Vec<String>,
    /// Error text for failed attempts, reason for skipped ones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Append-only run records and diffs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditNamespace {
    /// One record per attempt.
    pub agent_runs: Vec<AgentRunRecord>,
    /// One diff per successful step.
    pub diffs: Vec<ContextDiff>,
}

impl AuditNamespace {
    /// Returns the records of one agent, in order.
    pub fn records_for<'a>(&'a self, agent_id: &'a str) -> impl Iterator<Item = &'a AgentRunRecord> + 'a {
        self.agent_runs.iter().filter(move |r| r.agent_id == agent_id)
    }

    /// Returns how many times the agent was actually attempted.
    #[must_use]
    pub fn attempts_for(&self, agent_id: &str) -> usize {
        self.records_for(agent_id).filter(|r| r.attempt > 0).count()
    }

    /// Returns the status of the agent's latest record.
    #[must_use]
    pub fn last_status(&self, agent_id: &str) -> Option<AgentStatus> {
        self.records_for(agent_id).last().map(|r| r.status)
    }
}
