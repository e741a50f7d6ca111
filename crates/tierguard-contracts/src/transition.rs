//! Level transition requests and the immutable level history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    agent::AgentId,
    level::{Level, TransitionTrigger},
    metrics::LevelMetricsSnapshot,
};

/// Lifecycle of a transition request.
///
/// `Pending` is the only non-terminal status. Manual overrides are created
/// directly as `Approved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionStatus {
    Pending,
    Approved,
    Rejected,
}

impl TransitionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, TransitionStatus::Pending)
    }
}

impl fmt::Display for TransitionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TransitionStatus::Pending => "pending",
            TransitionStatus::Approved => "approved",
            TransitionStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// A proposed level change awaiting (or past) human review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelTransitionRequest {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub from_level: Level,
    pub to_level: Level,
    pub trigger: TransitionTrigger,
    pub reason: String,
    /// Metrics frozen at proposal time.
    pub metrics_snapshot: LevelMetricsSnapshot,
    pub status: TransitionStatus,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub review_note: Option<String>,
    /// Set on rejection; promotion is not re-proposed before this instant.
    pub cooldown_until: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The terminal outcome written onto a pending request.
#[derive(Debug, Clone)]
pub struct TransitionResolution {
    pub status: TransitionStatus,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
    pub review_note: Option<String>,
    pub cooldown_until: Option<DateTime<Utc>>,
}

/// Filter for listing transition requests. `None` fields match everything.
#[derive(Debug, Clone, Default)]
pub struct TransitionFilter {
    pub agent_id: Option<AgentId>,
    pub status: Option<TransitionStatus>,
}

impl TransitionFilter {
    pub fn pending() -> Self {
        Self { agent_id: None, status: Some(TransitionStatus::Pending) }
    }

    pub fn matches(&self, request: &LevelTransitionRequest) -> bool {
        self.agent_id.as_ref().map_or(true, |a| *a == request.agent_id)
            && self.status.map_or(true, |s| s == request.status)
    }
}

/// An immutable record of an applied level change.
///
/// Written for every `set_level`, whether or not the change passed through a
/// pending request, and even when the level value did not move.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelHistoryEntry {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub from_level: Level,
    pub to_level: Level,
    pub trigger: TransitionTrigger,
    pub reason: String,
    pub approved_by: Option<String>,
    pub request_id: Option<Uuid>,
    /// The agent's metrics at the moment of change.
    pub metrics_snapshot: LevelMetricsSnapshot,
    pub changed_at: DateTime<Utc>,
}
