//! The shared, namespaced context threaded through a pipeline run.

use super::diff::ContextDiff;
use super::keys::{ContextKey, Namespace};
use super::metadata::ContextMetadata;
use super::namespaces::{
    AuditNamespace, DiagnosticsNamespace, EnrichmentNamespace, LlmNamespace, ReasoningNamespace,
    RetrievalNamespace,
};
use crate::errors::ReasonflowError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::LazyLock;

/// A fresh context, the reference for untouched struct-valued fields.
static PRISTINE: LazyLock<ReasoningContext> = LazyLock::new(ReasoningContext::default);

/// Current context schema version.
pub const CONTEXT_SCHEMA_VERSION: &str = "1.0";

fn default_version() -> String {
    CONTEXT_SCHEMA_VERSION.to_string()
}

/// Versioned state for one reasoning run.
///
/// `Clone` is a full deep copy: every namespace is owned data, so mutating a
/// clone never reaches the original. The engine relies on this to isolate
/// concurrent branches and to diff a step's input against its output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReasoningContext {
    #[serde(default = "default_version")]
    version: String,
    metadata: ContextMetadata,
    /// Intents through the final summary.
    #[serde(default)]
    pub reasoning: ReasoningNamespace,
    /// Facts, derived knowledge and relationships.
    #[serde(default)]
    pub enrichment: EnrichmentNamespace,
    /// Retrieval plans, queries and artifacts.
    #[serde(default)]
    pub retrieval: RetrievalNamespace,
    /// LLM provider state.
    #[serde(default)]
    pub llm: LlmNamespace,
    /// Errors, warnings and performance.
    #[serde(default)]
    pub diagnostics: DiagnosticsNamespace,
    /// Run records and diffs.
    #[serde(default)]
    pub audit: AuditNamespace,
}

impl Default for ReasoningContext {
    fn default() -> Self {
        Self::new(ContextMetadata::new())
    }
}

impl ReasoningContext {
    /// Creates an empty context with the given metadata.
    #[must_use]
    pub fn new(metadata: ContextMetadata) -> Self {
        Self {
            version: default_version(),
            metadata,
            reasoning: ReasoningNamespace::default(),
            enrichment: EnrichmentNamespace::default(),
            retrieval: RetrievalNamespace::default(),
            llm: LlmNamespace::default(),
            diagnostics: DiagnosticsNamespace::default(),
            audit: AuditNamespace::default(),
        }
    }

    /// Creates an empty context for a session.
    #[must_use]
    pub fn for_session(session_id: impl Into<String>) -> Self {
        Self::new(ContextMetadata::new().with_session_id(session_id))
    }

    /// Returns the schema version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the run metadata.
    #[must_use]
    pub fn metadata(&self) -> &ContextMetadata {
        &self.metadata
    }

    /// Encodes the context as JSON.
    ///
    /// Maps are ordered, so two equal contexts encode to equal strings.
    pub fn to_json(&self) -> Result<String, ReasonflowError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Encodes the context as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, ReasonflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decodes a context previously produced by [`Self::to_json`].
    pub fn from_json(json: &str) -> Result<Self, ReasonflowError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Returns the whole context as a JSON value.
    pub fn to_value(&self) -> Result<Value, ReasonflowError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Returns one namespace as a JSON value.
    pub fn namespace_value(&self, namespace: Namespace) -> Result<Value, ReasonflowError> {
        let value = match namespace {
            Namespace::Reasoning => serde_json::to_value(&self.reasoning)?,
            Namespace::Enrichment => serde_json::to_value(&self.enrichment)?,
            Namespace::Retrieval => serde_json::to_value(&self.retrieval)?,
            Namespace::Llm => serde_json::to_value(&self.llm)?,
            Namespace::Diagnostics => serde_json::to_value(&self.diagnostics)?,
            Namespace::Audit => serde_json::to_value(&self.audit)?,
        };
        Ok(value)
    }

    /// Resolves a dotted key such as `reasoning.intents` or
    /// `llm.cache.prompt`. Returns `None` for malformed or absent keys.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let key = ContextKey::parse(key).ok()?;
        self.resolve(&key)
    }

    /// Resolves an already parsed key.
    #[must_use]
    pub fn resolve(&self, key: &ContextKey) -> Option<Value> {
        let root = match key.namespace() {
            Some(ns) => self.namespace_value(ns).ok()?,
            None => serde_json::to_value(&self.metadata).ok()?,
        };

        let mut current = &root;
        for segment in key.path() {
            current = match current {
                Value::Object(map) => map.get(segment)?,
                Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Returns true if the key resolves to a non-empty value.
    ///
    /// Struct-valued fields such as `llm.usage` count as empty while they
    /// still equal their defaults.
    #[must_use]
    pub fn has_value(&self, key: &str) -> bool {
        let Ok(key) = ContextKey::parse(key) else {
            return false;
        };
        let Some(value) = self.resolve(&key) else {
            return false;
        };
        if is_empty_value(&value) {
            return false;
        }
        !(value.is_object()
            && key.namespace().is_some()
            && PRISTINE.resolve(&key).as_ref() == Some(&value))
    }

    /// Writes a JSON value at a dotted key.
    ///
    /// The target namespace is re-decoded through its typed model, so the
    /// value must fit the field's shape. Metadata and the audit namespace
    /// are owned by the orchestrator and cannot be written this way.
    pub fn set(&mut self, key: &str, value: Value) -> Result<(), ReasonflowError> {
        let parsed = ContextKey::parse(key)?;
        let invalid = || ReasonflowError::InvalidKey {
            key: key.to_string(),
        };

        let namespace = match parsed.namespace() {
            Some(Namespace::Audit) | None => return Err(invalid()),
            Some(ns) => ns,
        };

        let mut root = self.namespace_value(namespace)?;
        if !set_path(&mut root, parsed.path(), value) {
            return Err(invalid());
        }

        match namespace {
            Namespace::Reasoning => self.reasoning = serde_json::from_value(root)?,
            Namespace::Enrichment => self.enrichment = serde_json::from_value(root)?,
            Namespace::Retrieval => self.retrieval = serde_json::from_value(root)?,
            Namespace::Llm => self.llm = serde_json::from_value(root)?,
            Namespace::Diagnostics => self.diagnostics = serde_json::from_value(root)?,
            Namespace::Audit => return Err(invalid()),
        }
        Ok(())
    }

    /// Replaces one namespace with a copy of `other`'s.
    pub fn adopt_namespace(&mut self, other: &Self, namespace: Namespace) {
        match namespace {
            Namespace::Reasoning => self.reasoning = other.reasoning.clone(),
            Namespace::Enrichment => self.enrichment = other.enrichment.clone(),
            Namespace::Retrieval => self.retrieval = other.retrieval.clone(),
            Namespace::Llm => self.llm = other.llm.clone(),
            Namespace::Diagnostics => self.diagnostics = other.diagnostics.clone(),
            Namespace::Audit => self.audit = other.audit.clone(),
        }
    }

    /// Computes the field-level changes from `self` to `other`.
    #[must_use]
    pub fn diff(&self, other: &Self) -> ContextDiff {
        let before = serde_json::to_value(self).unwrap_or_default();
        let after = serde_json::to_value(other).unwrap_or_default();
        ContextDiff::between(&before, &after)
    }
}

/// Returns true for `null`, empty strings, empty arrays and empty objects.
///
/// Numbers and booleans always count as populated.
#[must_use]
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn set_path(target: &mut Value, path: &[String], value: Value) -> bool {
    let Some((last, parents)) = path.split_last() else {
        return false;
    };

    let mut current = target;
    for segment in parents {
        let Value::Object(map) = current else {
            return false;
        };
        current = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        if current.is_null() {
            *current = Value::Object(serde_json::Map::new());
        }
    }

    match current {
        Value::Object(map) => {
            map.insert(last.clone(), value);
            true
        }
        _ => false,
    }
}
