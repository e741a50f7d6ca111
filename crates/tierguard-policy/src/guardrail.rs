//! Reference action gate for the authorization checkpoint.
//!
//! Checks, in order, first hit wins:
//!
//! 1. action in `denied_actions`              → Deny (critical)
//! 2. domain outside non-empty `allowed_domains` → Deny (warning)
//! 3. `max_concurrent_missions` reached       → Deny (warning)
//! 4. `max_daily_tasks` reached               → Deny (warning)
//! 5. action outside non-empty `allowed_actions` → Deny (warning)
//! 6. `allowed_actions` empty                 → RequireReview
//! 7. confidence below `auto_review_threshold` → RequireReview
//! 8. otherwise                               → Allow

use tierguard_contracts::{
    evaluation::{ActionRequest, GuardrailDecision},
    guardrails::AgentGuardrails,
    violation::ViolationSeverity,
};
use tierguard_core::traits::ActionGate;

#[derive(Debug, Default, Clone, Copy)]
pub struct GuardrailGate;

impl GuardrailGate {
    pub fn new() -> Self {
        Self
    }
}

fn deny(guardrail: &str, reason: String, severity: ViolationSeverity) -> GuardrailDecision {
    GuardrailDecision::Deny { guardrail: guardrail.to_string(), reason, severity }
}

impl ActionGate for GuardrailGate {
    fn check(&self, guardrails: &AgentGuardrails, request: &ActionRequest) -> GuardrailDecision {
        let action = request.action.as_str();

        if guardrails.denied_actions.contains(action) {
            return deny(
                "denied_actions",
                format!("action '{}' is explicitly denied", action),
                ViolationSeverity::Critical,
            );
        }

        if let Some(domain) = &request.domain {
            if !guardrails.allowed_domains.is_empty() && !guardrails.allowed_domains.contains(domain) {
                return deny(
                    "allowed_domains",
                    format!("domain '{}' is outside the allowed domains", domain),
                    ViolationSeverity::Warning,
                );
            }
        }

        if request.active_missions >= guardrails.max_concurrent_missions {
            return deny(
                "max_concurrent_missions",
                format!(
                    "{} missions already active (limit {})",
                    request.active_missions, guardrails.max_concurrent_missions
                ),
                ViolationSeverity::Warning,
            );
        }

        if request.tasks_today >= guardrails.max_daily_tasks {
            return deny(
                "max_daily_tasks",
                format!(
                    "{} tasks already run today (limit {})",
                    request.tasks_today, guardrails.max_daily_tasks
                ),
                ViolationSeverity::Warning,
            );
        }

        if guardrails.allowed_actions.is_empty() {
            return GuardrailDecision::RequireReview {
                guardrail: "allowed_actions".to_string(),
                reason: "no actions are autonomous at this level".to_string(),
            };
        }

        if !guardrails.allowed_actions.contains(action) {
            return deny(
                "allowed_actions",
                format!("action '{}' is not in the allowed actions", action),
                ViolationSeverity::Warning,
            );
        }

        // A NaN confidence still goes to review.
        if request.confidence.is_nan() || request.confidence < guardrails.auto_review_threshold {
            return GuardrailDecision::RequireReview {
                guardrail: "auto_review_threshold".to_string(),
                reason: format!(
                    "confidence {:.2} below review threshold {:.2}",
                    request.confidence, guardrails.auto_review_threshold
                ),
            };
        }

        GuardrailDecision::Allow
    }
}
