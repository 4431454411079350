//! Closed registry mapping agent kinds to constructors

use std::collections::BTreeMap;
use std::sync::Arc;

use meridian_common::{AgentKind, RegistryError};
use uuid::Uuid;

use super::simulated::SimulatedAgent;
use super::StrategyAgent;
use crate::config::AgentSettings;

/// Builds the strategy instance for a newly spawned agent
pub type AgentConstructor =
    Box<dyn Fn(Uuid) -> Result<Arc<dyn StrategyAgent>, RegistryError> + Send + Sync>;

#[derive(Default)]
pub struct AgentRegistry {
    constructors: BTreeMap<AgentKind, AgentConstructor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the simulated agent registered for every kind
    pub fn simulated(settings: &AgentSettings) -> Self {
        let mut registry = Self::new();
        for kind in AgentKind::ALL {
            let settings = settings.clone();
            registry.register(
                kind,
                Box::new(move |agent_id| {
                    Ok(Arc::new(SimulatedAgent::new(kind, agent_id, &settings)) as Arc<dyn StrategyAgent>)
                }),
            );
        }
        registry
    }

    /// Register or replace the constructor for a kind
    pub fn register(&mut self, kind: AgentKind, constructor: AgentConstructor) -> &mut Self {
        self.constructors.insert(kind, constructor);
        self
    }

    pub fn is_registered(&self, kind: AgentKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Every enabled kind must have a constructor before the loop starts
    pub fn validate(&self, enabled: &[AgentKind]) -> Result<(), RegistryError> {
        match enabled.iter().find(|k| !self.is_registered(**k)) {
            Some(kind) => Err(RegistryError::UnregisteredKind(kind.to_string())),
            None => Ok(()),
        }
    }

    pub fn construct(&self, kind: AgentKind, agent_id: Uuid) -> Result<Arc<dyn StrategyAgent>, RegistryError> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or_else(|| RegistryError::UnregisteredKind(kind.to_string()))?;
        constructor(agent_id)
    }
}
