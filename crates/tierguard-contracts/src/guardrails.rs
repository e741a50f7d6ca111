//! Guardrail configuration attached to an agent's level state.
//!
//! Guardrails are plain policy data. The engine never repairs or defaults a
//! guardrail object implicitly: every field is required when deserializing,
//! and callers that want defaults must ask for `tier_default` explicitly.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{
    agent::AgentId,
    error::{TierGuardError, TierGuardResult},
    level::Level,
};

/// Policy constraints for one agent.
///
/// Capability tags are stored in ordered sets so serialized guardrails are
/// byte-stable, which the audit hash chain relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AgentGuardrails {
    /// Domains the agent may operate in. Empty means unrestricted.
    pub allowed_domains: BTreeSet<String>,
    /// Actions the agent may take autonomously. Empty means none.
    pub allowed_actions: BTreeSet<String>,
    /// Actions that are always refused, regardless of level.
    pub denied_actions: BTreeSet<String>,
    pub max_concurrent_missions: u32,
    pub max_daily_tasks: u32,
    /// Who denied actions are handed off to.
    pub escalation_agent_id: Option<AgentId>,
    /// Confidence below which an action needs human sign-off (0.0..=1.0).
    pub auto_review_threshold: f64,
}

impl AgentGuardrails {
    /// The caller-layer default guardrails for a tier.
    ///
    /// Level 1 has no autonomous actions and a review threshold of 1.0, so
    /// every action requires approval.
    pub fn tier_default(level: Level) -> Self {
        let (actions, missions, daily, threshold): (&[&str], u32, u32, f64) = match level {
            Level::Observer => (&[], 1, 10, 1.0),
            Level::Assistant => (&["read", "draft"], 2, 25, 0.9),
            Level::Operator => (&["read", "draft", "send", "update_record"], 5, 100, 0.75),
            Level::Autonomous => (
                &["read", "draft", "send", "update_record", "execute_workflow"],
                10,
                500,
                0.5,
            ),
        };

        Self {
            allowed_domains: BTreeSet::new(),
            allowed_actions: actions.iter().map(|a| a.to_string()).collect(),
            denied_actions: ["delete_record", "capture_payment"]
                .iter()
                .map(|a| a.to_string())
                .collect(),
            max_concurrent_missions: missions,
            max_daily_tasks: daily,
            escalation_agent_id: None,
            auto_review_threshold: threshold,
        }
    }

    /// Reject configurations that cannot be enforced consistently.
    pub fn validate(&self) -> TierGuardResult<()> {
        if !(0.0..=1.0).contains(&self.auto_review_threshold) {
            return Err(TierGuardError::InvalidGuardrails {
                reason: format!(
                    "auto_review_threshold {} is outside 0.0..=1.0",
                    self.auto_review_threshold
                ),
            });
        }

        if let Some(tag) = self.allowed_actions.intersection(&self.denied_actions).next() {
            return Err(TierGuardError::InvalidGuardrails {
                reason: format!("action '{}' is both allowed and denied", tag),
            });
        }

        Ok(())
    }
}
