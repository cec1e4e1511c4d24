//! Registry mapping agent ids to agent instances.

use super::Agent;
use crate::context::{ContextKey, Namespace};
use crate::errors::RegistrationError;
use std::collections::HashMap;
use std::sync::Arc;

/// An owned lookup table of agents.
///
/// Each scheduler owns its registry, so any number of independent pipelines
/// can live in one process.
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an agent under its declared id.
    ///
    /// # Errors
    ///
    /// Fails if the id is empty or already taken, or if the agent declares a
    /// contract key that is not a valid `namespace.field` path. Postconditions
    /// must target a writable namespace (not metadata or audit).
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Result<(), RegistrationError> {
        let id = agent.agent_id().to_string();
        if id.is_empty() {
            return Err(RegistrationError::EmptyId);
        }
        if self.agents.contains_key(&id) {
            return Err(RegistrationError::Duplicate { agent_id: id });
        }

        for key in agent.preconditions() {
            if ContextKey::parse(&key).is_err() {
                return Err(RegistrationError::InvalidContractKey { agent_id: id, key });
            }
        }
        for key in agent.postconditions() {
            let writable = ContextKey::parse(&key)
                .ok()
                .and_then(|k| k.namespace())
                .is_some_and(|ns| ns != Namespace::Audit);
            if !writable {
                return Err(RegistrationError::InvalidContractKey { agent_id: id, key });
            }
        }

        tracing::debug!(agent_id = %id, "Registered agent");
        self.agents.insert(id, agent);
        Ok(())
    }

    /// Registers an agent, builder style.
    ///
    /// # Errors
    ///
    /// See [`register`](Self::register).
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Result<Self, RegistrationError> {
        self.register(agent)?;
        Ok(self)
    }

    /// Gets an agent by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(id).cloned()
    }

    /// Returns true if an agent is registered under `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.agents.contains_key(id)
    }

    /// Returns the registered ids in sorted order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

impl std::fmt::Debug for AgentRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentRegistry")
            .field("agents", &self.ids())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAgent;

    #[test]
    fn test_register_and_lookup() {
        let registry = AgentRegistry::new()
            .with_agent(Arc::new(StubAgent::new("intent").provides(["reasoning.intents"])))
            .unwrap()
            .with_agent(Arc::new(StubAgent::new("summary")))
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("intent"));
        assert_eq!(registry.ids(), vec!["intent".to_string(), "summary".to_string()]);
        assert_eq!(registry.get("intent").map(|a| a.agent_id().to_string()), Some("intent".to_string()));
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut registry = AgentRegistry::new();
        registry.register(Arc::new(StubAgent::new("intent"))).unwrap();
        let err = registry.register(Arc::new(StubAgent::new("intent"))).unwrap_err();

        assert_eq!(
            err,
            RegistrationError::Duplicate {
                agent_id: "intent".to_string()
            }
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_contract_keys_rejected() {
        let mut registry = AgentRegistry::new();

        let bad_pre = StubAgent::new("a").requires(["nonsense"]);
        assert!(matches!(
            registry.register(Arc::new(bad_pre)),
            Err(RegistrationError::InvalidContractKey { .. })
        ));

        let metadata_post = StubAgent::new("b").provides(["metadata.locale"]);
        assert!(registry.register(Arc::new(metadata_post)).is_err());

        let audit_post = StubAgent::new("c").provides(["audit.agent_runs"]);
        assert!(registry.register(Arc::new(audit_post)).is_err());

        let metadata_pre = StubAgent::new("d").requires(["metadata.session_id"]);
        assert!(registry.register(Arc::new(metadata_pre)).is_ok());
    }

    #[test]
    fn test_empty_id_rejected() {
        let mut registry = AgentRegistry::new();
        assert_eq!(
            registry.register(Arc::new(StubAgent::new(""))),
            Err(RegistrationError::EmptyId)
        );
    }
}
