//! Per-agent write serialization.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use tierguard_contracts::agent::AgentId;

/// Hands out one mutex per agent so level changes for the same agent run
/// one at a time while different agents proceed in parallel.
#[derive(Debug, Default)]
pub struct AgentLocks {
    inner: Mutex<HashMap<AgentId, Arc<Mutex<()>>>>,
}

impl AgentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mutex guarding `agent_id`. Callers lock it for the duration of a
    /// read-check-write sequence.
    pub fn handle(&self, agent_id: &AgentId) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        map.entry(agent_id.clone()).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
