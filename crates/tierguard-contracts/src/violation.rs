//! Guardrail violation records.
//!
//! Every action the authorization checkpoint denies or flags is written to
//! an append-only ledger as a `GuardrailViolation`. The ledger is evidence
//! for humans and the metrics pipeline; the engine itself never reads it
//! back to decide a level.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::AgentId;

/// How serious a violation is. Ordered, so `Critical` compares greatest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    /// A flag for review, not a refusal.
    Info,
    /// A refused action outside the agent's limits (domain, load, rate).
    Warning,
    /// A refused action on the denied list. The kind counted in
    /// `critical_violations_7d`.
    Critical,
}

impl fmt::Display for ViolationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationSeverity::Info => "info",
            ViolationSeverity::Warning => "warning",
            ViolationSeverity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// What happened to the offending action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationResolution {
    /// Refused with no one to escalate to.
    AutoDenied,
    /// Handed to the guardrails' escalation agent.
    Escalated,
    /// A human allowed the action anyway.
    Overridden,
    /// Allowed to proceed only after human review.
    FlaggedForReview,
}

/// One denied or flagged action attempt. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    /// Assigned by the ledger on append.
    pub id: Uuid,

    /// The agent whose action was checked.
    pub agent_id: AgentId,

    /// The action name exactly as the agent submitted it.
    pub action_attempted: String,

    /// Name of the guardrail rule that fired, e.g. `denied_actions` or
    /// `auto_review_threshold`.
    pub guardrail_violated: String,

    pub severity: ViolationSeverity,

    pub resolution: ViolationResolution,

    /// Request details at check time: the agent's level, the domain,
    /// confidence and load figures, and `escalated_to` when escalated.
    pub context: serde_json::Value,

    /// Ledger append time (UTC). Strictly increasing in append order.
    pub created_at: DateTime<Utc>,
}

/// The caller-supplied part of a violation; the ledger assigns id and time.
#[derive(Debug, Clone)]
pub struct NewViolation {
    pub agent_id: AgentId,
    pub action_attempted: String,
    pub guardrail_violated: String,
    pub severity: ViolationSeverity,
    pub resolution: ViolationResolution,
    pub context: serde_json::Value,
}

/// Ledger read filter. Results are newest-first, then paginated.
#[derive(Debug, Clone)]
pub struct ViolationQuery {
    /// Only this agent's violations; `None` matches every agent.
    pub agent_id: Option<AgentId>,

    /// Only this exact severity; `None` matches every severity.
    pub severity: Option<ViolationSeverity>,

    /// Maximum number of results. Defaults to 50.
    pub limit: usize,

    /// Matching results to skip before the first one returned.
    pub offset: usize,
}

impl Default for ViolationQuery {
    fn default() -> Self {
        Self { agent_id: None, severity: None, limit: 50, offset: 0 }
    }
}

impl ViolationQuery {
    /// True if `violation` passes the agent and severity filters. Paging is
    /// applied by the ledger, not here.
    pub fn matches(&self, violation: &GuardrailViolation) -> bool {
        self.agent_id.as_ref().map_or(true, |a| *a == violation.agent_id)
            && self.severity.map_or(true, |s| s == violation.severity)
    }
}
