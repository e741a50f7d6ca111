//! Per-agent level state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use uuid::Uuid;

use crate::{
    agent::AgentId,
    guardrails::AgentGuardrails,
    level::{Level, TransitionTrigger},
    metrics::LevelMetricsSnapshot,
};

/// The durable record of one agent's trust level.
///
/// Exactly one exists per registered agent. Only the transition workflow or
/// an administrative override changes `current_level`; guardrails and metrics
/// are replaced independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentLevelState {
    pub agent_id: AgentId,
    pub current_level: Level,
    pub guardrails: AgentGuardrails,
    pub metrics: LevelMetricsSnapshot,
    /// When `current_level` last changed (or registration time).
    pub level_assigned_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    /// Strictly increasing per record; the compare-and-swap and replica merge key.
    pub updated_at: DateTime<Utc>,
}

/// A request to the level store to change one agent's level.
#[derive(Debug, Clone)]
pub struct LevelChange {
    pub agent_id: AgentId,
    pub to_level: Level,
    pub trigger: TransitionTrigger,
    pub reason: String,
    /// Reviewer or operator responsible; `None` for automatic demotions.
    pub approved_by: Option<String>,
    /// The transition request this change resolves, if any.
    pub request_id: Option<Uuid>,
    /// When set, the write fails with `StaleWrite` unless the stored
    /// `updated_at` still equals this value.
    pub expected_updated_at: Option<DateTime<Utc>>,
}
