//! Evaluator verdicts and guardrail decisions.
//!
//! The evaluator consumes a `Level` plus a `LevelMetricsSnapshot` and emits
//! these verdicts. The action gate consumes guardrails plus an
//! `ActionRequest` and emits a `GuardrailDecision`.

use serde::{Deserialize, Serialize};

use crate::{level::Level, violation::ViolationSeverity};

/// Result of a promotion eligibility check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionVerdict {
    pub eligible: bool,
    /// The tier the agent would move to; `None` at level 4.
    pub target_level: Option<Level>,
    /// On failure, every unmet criterion in a fixed order.
    pub reason: String,
}

/// Result of a demotion check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemotionVerdict {
    pub should_demote: bool,
    /// Always exactly one tier below the evaluated level when demoting.
    pub target_level: Option<Level>,
    pub reason: String,
}

impl DemotionVerdict {
    pub fn keep(reason: impl Into<String>) -> Self {
        Self { should_demote: false, target_level: None, reason: reason.into() }
    }
}

/// An action an agent wants to take, as seen by the authorization checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    /// Capability tag, e.g. "send" or "delete_record".
    pub action: String,
    pub domain: Option<String>,
    /// The agent's own confidence in the action (0.0..=1.0).
    pub confidence: f64,
    pub active_missions: u32,
    pub tasks_today: u32,
}

/// The action gate's decision for a single action attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GuardrailDecision {
    Allow,

    /// The action may proceed only after human sign-off.
    RequireReview { guardrail: String, reason: String },

    Deny {
        /// Name of the guardrail that fired, recorded in the ledger.
        guardrail: String,
        reason: String,
        severity: ViolationSeverity,
    },
}
