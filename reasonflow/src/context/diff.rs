//! Structural diffs between two contexts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Old and new value of one `namespace.field` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value before the change (`null` when absent).
    pub old: Value,
    /// Value after the change (`null` when removed).
    pub new: Value,
}

/// The set of field-level changes between two contexts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextDiff {
    /// Agent that produced the change, when recorded in the audit trail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// When the diff was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Changes keyed by `namespace.field`.
    #[serde(default)]
    pub changes: BTreeMap<String, FieldChange>,
}

impl ContextDiff {
    /// Builds a diff from two serialized contexts.
    #[must_use]
    pub fn between(before: &Value, after: &Value) -> Self {
        Self {
            agent_id: None,
            timestamp: None,
            changes: diff_values(before, after),
        }
    }

    /// Tags the diff with the agent that caused it.
    #[must_use]
    pub fn attributed_to(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self.timestamp = Some(Utc::now());
        self
    }

    /// Returns true if nothing changed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the changed keys in sorted order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.changes.keys().cloned().collect()
    }

    /// Returns the root segments (namespace names, `metadata`, `version`)
    /// touched by the diff.
    #[must_use]
    pub fn roots(&self) -> BTreeSet<String> {
        self.changes
            .keys()
            .map(|k| k.split('.').next().unwrap_or(k).to_string())
            .collect()
    }
}

/// Compares two serialized contexts one level below the root.
///
/// Object-valued roots (namespaces and metadata) are compared per field and
/// reported as `root.field`; scalar roots such as `version` are reported
/// under their own name.
fn diff_values(before: &Value, after: &Value) -> BTreeMap<String, FieldChange> {
    let mut changes = BTreeMap::new();
    let empty = serde_json::Map::new();
    let before_root = before.as_object().unwrap_or(&empty);
    let after_root = after.as_object().unwrap_or(&empty);

    let roots: BTreeSet<&String> = before_root.keys().chain(after_root.keys()).collect();
    for root in roots {
        let old = before_root.get(root).unwrap_or(&Value::Null);
        let new = after_root.get(root).unwrap_or(&Value::Null);
        if old == new {
            continue;
        }

        match (old.as_object(), new.as_object()) {
            (Some(old_fields), Some(new_fields)) => {
                let fields: BTreeSet<&String> =
                    old_fields.keys().chain(new_fields.keys()).collect();
                for field in fields {
                    let old_value = old_fields.get(field).unwrap_or(&Value::Null);
                    let new_value = new_fields.get(field).unwrap_or(&Value::Null);
                    if old_value != new_value {
                        changes.insert(
                            format!("{root}.{field}"),
                            FieldChange {
                                old: old_value.clone(),
                                new: new_value.clone(),
                            },
                        );
                    }
                }
            }
            _ => {
                changes.insert(
                    root.clone(),
                    FieldChange {
                        old: old.clone(),
                        new: new.clone(),
                    },
                );
            }
        }
    }

    changes
}
