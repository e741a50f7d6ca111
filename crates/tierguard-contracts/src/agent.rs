//! Agent identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of an agent in the fleet.
///
/// The engine holds it as a weak reference: deleting the agent elsewhere does
/// not cascade into level state, history, or the violation ledger.
/// Example: AgentId("support-triage-7")
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
