//! Cross-cutting tests for the context model.

#[cfg(test)]
mod tests {
    use crate::context::{
        Confidence, ContextMetadata, Fact, Intent, Namespace, ReasoningContext, Summary,
    };
    use crate::testing::{empty_context, seeded_context};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn populated_context() -> ReasoningContext {
        let mut ctx = seeded_context("What is the boiling point of water?");
        ctx.reasoning.intents.push(Intent {
            name: "question".to_string(),
            confidence: Confidence::new(0.9),
            evidence: vec!["what is".to_string()],
        });
        ctx.reasoning
            .confidence_scores
            .insert("overall".to_string(), Confidence::new(0.7));
        ctx.reasoning.summary = Some(Summary {
            text: "Water boils at 100C at sea level.".to_string(),
            key_points: vec!["sea level".to_string()],
            confidence: Confidence::new(0.8),
        });
        ctx.enrichment.facts.push(Fact {
            id: "f1".to_string(),
            content: "boiling point depends on pressure".to_string(),
            source: "kb".to_string(),
            confidence: Confidence::new(0.95),
        });
        ctx.llm
            .cache
            .insert("prompt".to_string(), json!({"nested": [1, 2, {"deep": true}]}));
        ctx
    }

    #[test]
    fn test_clone_is_independent_of_original() {
        let original = empty_context();
        let before = original.to_json().unwrap();

        let mut clone = original.clone();
        clone.set("reasoning.intents", json!([{"name": "mutated"}])).unwrap();
        clone.llm.cache.insert("k".to_string(), json!("v"));
        clone.diagnostics.warnings.push(Default::default());

        assert_eq!(original.metadata().session_id(), "session-empty");
        assert_eq!(original.to_json().unwrap(), before);
        assert!(original.reasoning.intents.is_empty());
    }

    #[test]
    fn test_clone_of_populated_context_does_not_share_nested_data() {
        let original = populated_context();
        let mut clone = original.clone();

        if let Some(value) = clone.llm.cache.get_mut("prompt") {
            value["nested"][2]["deep"] = json!(false);
        }
        clone.reasoning.intents[0].evidence.push("extra".to_string());

        assert_eq!(original.llm.cache["prompt"]["nested"][2]["deep"], json!(true));
        assert_eq!(original.reasoning.intents[0].evidence.len(), 1);
    }

    #[test]
    fn test_serialize_round_trip_preserves_all_namespaces() {
        let original = populated_context();
        let json = original.to_json().unwrap();
        let decoded = ReasoningContext::from_json(&json).unwrap();

        assert_eq!(decoded, original);
        assert_eq!(decoded.to_json().unwrap(), json);
    }

    #[test]
    fn test_serialization_is_deterministic() {
        let ctx = populated_context();
        assert_eq!(ctx.to_json().unwrap(), ctx.clone().to_json().unwrap());
    }

    #[test]
    fn test_deserialize_fills_missing_namespaces() {
        let json = r#"{"metadata":{"session_id":"s","trace_id":"t","created_at":"2024-05-01T12:00:00Z"}}"#;
        let ctx = ReasoningContext::from_json(json).unwrap();

        assert_eq!(ctx.version(), "1.0");
        assert!(ctx.reasoning.intents.is_empty());
        assert!(ctx.audit.agent_runs.is_empty());
    }

    #[test]
    fn test_diff_between_clone_and_mutation() {
        let original = populated_context();
        let mut changed = original.clone();
        changed.set("retrieval.plans", json!([{"id": "p1", "strategy": "semantic"}])).unwrap();
        changed.reasoning.intents.clear();

        let diff = original.diff(&changed);
        assert_eq!(
            diff.keys(),
            vec!["reasoning.intents".to_string(), "retrieval.plans".to_string()]
        );
        assert_eq!(diff.changes["retrieval.plans"].old, json!([]));
    }

    #[test]
    fn test_metadata_is_fixed_at_creation() {
        let meta = ContextMetadata::new()
            .with_session_id("abc")
            .with_locale("fr");
        let ctx = ReasoningContext::new(meta.clone());

        assert_eq!(ctx.metadata(), &meta);
        assert_eq!(ctx.get("metadata.locale"), Some(json!("fr")));
    }

    #[test]
    fn test_namespace_values_cover_every_namespace() {
        let ctx = populated_context();
        for ns in Namespace::ALL {
            assert!(ctx.namespace_value(ns).unwrap().is_object(), "{ns} should be an object");
        }
    }
}
