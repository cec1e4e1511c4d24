//! Dotted context keys and namespace names.

use crate::errors::ReasonflowError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the six independently-owned sections of a [`super::ReasoningContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    /// Intents, entities, hypotheses, conclusions and the final summary.
    Reasoning,
    /// Normalized facts, derived knowledge and relationships.
    Enrichment,
    /// Retrieval plans, queries and artifacts.
    Retrieval,
    /// Provider, model, usage and decisions of LLM calls.
    Llm,
    /// Errors, warnings, validation reports and performance metrics.
    Diagnostics,
    /// Agent run records and per-step diffs.
    Audit,
}

impl Namespace {
    /// Every namespace, in serialization order.
    pub const ALL: [Self; 6] = [
        Self::Reasoning,
        Self::Enrichment,
        Self::Retrieval,
        Self::Llm,
        Self::Diagnostics,
        Self::Audit,
    ];

    /// Returns the key prefix of this namespace.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reasoning => "reasoning",
            Self::Enrichment => "enrichment",
            Self::Retrieval => "retrieval",
            Self::Llm => "llm",
            Self::Diagnostics => "diagnostics",
            Self::Audit => "audit",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = ReasonflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| ReasonflowError::InvalidKey { key: s.to_string() })
    }
}

/// Root segment for the immutable metadata block.
pub const METADATA_ROOT: &str = "metadata";

/// A parsed `namespace.field[.nested...]` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContextKey {
    root: String,
    path: Vec<String>,
}

impl ContextKey {
    /// Parses a dotted key.
    ///
    /// The first segment must name a namespace or `metadata`, and at least one
    /// field segment must follow. Segments may contain ASCII letters, digits,
    /// `_` and `-`.
    pub fn parse(key: &str) -> Result<Self, ReasonflowError> {
        let invalid = || ReasonflowError::InvalidKey {
            key: key.to_string(),
        };

        let mut segments = key.split('.');
        let root = segments.next().ok_or_else(invalid)?;
        if root != METADATA_ROOT && root.parse::<Namespace>().is_err() {
            return Err(invalid());
        }

        let path: Vec<String> = segments.map(str::to_string).collect();
        if path.is_empty() || path.iter().any(|s| !valid_segment(s)) {
            return Err(invalid());
        }

        Ok(Self {
            root: root.to_string(),
            path,
        })
    }

    /// Returns the namespace, or `None` for metadata keys.
    #[must_use]
    pub fn namespace(&self) -> Option<Namespace> {
        self.root.parse().ok()
    }

    /// Returns true if the key addresses the metadata block.
    #[must_use]
    pub fn is_metadata(&self) -> bool {
        self.root == METADATA_ROOT
    }

    /// Returns the root segment.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Returns the segments after the root.
    #[must_use]
    pub fn path(&self) -> &[String] {
        &self.path
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.root, self.path.join("."))
    }
}

impl FromStr for ContextKey {
    type Err = ReasonflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_key() {
        let key = ContextKey::parse("reasoning.intents").unwrap();
        assert_eq!(key.namespace(), Some(Namespace::Reasoning));
        assert_eq!(key.path(), ["intents".to_string()]);
        assert_eq!(key.to_string(), "reasoning.intents");
    }

    #[test]
    fn test_parse_nested_and_metadata_keys() {
        let key = ContextKey::parse("llm.cache.prompt-v2").unwrap();
        assert_eq!(key.namespace(), Some(Namespace::Llm));
        assert_eq!(key.path().len(), 2);

        let meta = ContextKey::parse("metadata.locale").unwrap();
        assert!(meta.is_metadata());
        assert_eq!(meta.namespace(), None);
    }

    #[test]
    fn test_reject_malformed_keys() {
        for key in ["", "reasoning", "unknown.field", "reasoning.", "reasoning..x", "llm.a b"] {
            assert!(ContextKey::parse(key).is_err(), "expected {key:?} to be rejected");
        }
    }

    #[test]
    fn test_namespace_round_trip() {
        for ns in Namespace::ALL {
            assert_eq!(ns.as_str().parse::<Namespace>().unwrap(), ns);
        }
        assert!("metadata".parse::<Namespace>().is_err());
    }
}
