//! # tierguard-policy
//!
//! The TierGuard transition evaluator and reference guardrail gate.
//!
//! ## Overview
//!
//! [`TomlLevelEvaluator`] implements the
//! [`TransitionEvaluator`](tierguard_core::traits::TransitionEvaluator) trait
//! from a TOML level policy. It is pure: no I/O, no memory between calls.
//!
//! [`GuardrailGate`] implements [`ActionGate`](tierguard_core::traits::ActionGate)
//! for the authorization checkpoint.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use tierguard_policy::TomlLevelEvaluator;
//!
//! let evaluator = TomlLevelEvaluator::from_toml_str(tierguard_policy::DEFAULT_POLICY)?;
//! let settings = evaluator.workflow_settings();
//! ```

pub mod engine;
pub mod guardrail;
pub mod rule;

pub use engine::{TomlLevelEvaluator, DEFAULT_POLICY};
pub use guardrail::GuardrailGate;
pub use rule::{Criterion, LevelPolicyConfig, PromotionCriteria};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use tierguard_contracts::{
        error::TierGuardError,
        evaluation::{ActionRequest, GuardrailDecision},
        guardrails::AgentGuardrails,
        level::Level,
        metrics::LevelMetricsSnapshot,
        violation::ViolationSeverity,
    };
    use tierguard_core::traits::{ActionGate, TransitionEvaluator};

    use crate::{GuardrailGate, LevelPolicyConfig, TomlLevelEvaluator, DEFAULT_POLICY};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn eligible_level_one() -> LevelMetricsSnapshot {
        LevelMetricsSnapshot {
            tasks_completed: 12,
            avg_review_score: 0.91,
            violations_30d: 0,
            critical_violations_7d: 0,
            consecutive_failures: 0,
            time_in_level_days: 10,
        }
    }

    fn action(name: &str) -> ActionRequest {
        ActionRequest {
            action: name.to_string(),
            domain: None,
            confidence: 0.95,
            active_missions: 0,
            tasks_today: 0,
        }
    }

    // ── Configuration ─────────────────────────────────────────────────────────

    #[test]
    fn shipped_policy_matches_builtin_default() {
        let evaluator = TomlLevelEvaluator::from_toml_str(DEFAULT_POLICY).unwrap();
        assert_eq!(evaluator.config(), &LevelPolicyConfig::default());
        assert_eq!(evaluator.workflow_settings().cooldown, Duration::days(7));
    }

    #[test]
    fn policy_file_ships_inside_the_crate() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("policies/default.toml");
        let from_disk = TomlLevelEvaluator::from_file(&path).unwrap();
        assert_eq!(from_disk.config(), &LevelPolicyConfig::default());
    }

    #[test]
    fn malformed_toml_is_a_config_error() {
        match TomlLevelEvaluator::from_toml_str("this is not valid toml ][[[") {
            Err(TierGuardError::ConfigError { reason }) => {
                assert!(reason.contains("failed to parse level policy TOML"), "{reason}");
            }
            other => panic!("expected ConfigError, got {:?}", other),
        }
    }

    #[test]
    fn missing_section_is_a_config_error() {
        let toml = r#"
            [demotion]
            max_consecutive_failures = 3
            promotion = []
        "#;
        assert!(matches!(
            TomlLevelEvaluator::from_toml_str(toml),
            Err(TierGuardError::ConfigError { .. })
        ));
    }

    #[test]
    fn duplicate_or_out_of_range_criteria_are_rejected() {
        let mut config = LevelPolicyConfig::default();
        config.promotion.push(config.promotion[0].clone());
        assert!(matches!(TomlLevelEvaluator::new(config), Err(TierGuardError::ConfigError { .. })));

        let mut config = LevelPolicyConfig::default();
        config.promotion[2].from_level = 4;
        assert!(matches!(TomlLevelEvaluator::new(config), Err(TierGuardError::ConfigError { .. })));

        let mut config = LevelPolicyConfig::default();
        config.promotion[0].min_avg_review_score = 1.2;
        assert!(matches!(TomlLevelEvaluator::new(config), Err(TierGuardError::ConfigError { .. })));
    }

    // ── Promotion ─────────────────────────────────────────────────────────────

    #[test]
    fn level_one_agent_meeting_every_criterion_is_eligible() {
        let evaluator = TomlLevelEvaluator::default();
        let verdict = evaluator.evaluate_promotion(Level::Observer, &eligible_level_one());
        assert!(verdict.eligible, "{}", verdict.reason);
        assert_eq!(verdict.target_level, Some(Level::Assistant));
    }

    #[test]
    fn one_unmet_criterion_blocks_promotion() {
        let evaluator = TomlLevelEvaluator::default();

        let cases = [
            (LevelMetricsSnapshot { tasks_completed: 9, ..eligible_level_one() }, "tasks_completed"),
            (LevelMetricsSnapshot { avg_review_score: 0.84, ..eligible_level_one() }, "avg_review_score"),
            (LevelMetricsSnapshot { time_in_level_days: 6, ..eligible_level_one() }, "time_in_level_days"),
            (LevelMetricsSnapshot { violations_30d: 3, ..eligible_level_one() }, "violations_30d"),
        ];

        for (metrics, field) in cases {
            let verdict = evaluator.evaluate_promotion(Level::Observer, &metrics);
            assert!(!verdict.eligible, "{field} should block promotion");
            assert!(verdict.reason.contains(field), "reason should name {field}: {}", verdict.reason);
        }
    }

    #[test]
    fn violation_ceiling_is_inclusive() {
        let evaluator = TomlLevelEvaluator::default();
        let at_ceiling = LevelMetricsSnapshot { violations_30d: 2, ..eligible_level_one() };
        assert!(evaluator.evaluate_promotion(Level::Observer, &at_ceiling).eligible);
    }

    #[test]
    fn nan_review_score_fails_promotion() {
        let evaluator = TomlLevelEvaluator::default();
        let metrics = LevelMetricsSnapshot { avg_review_score: f64::NAN, ..eligible_level_one() };
        let verdict = evaluator.evaluate_promotion(Level::Observer, &metrics);
        assert!(!verdict.eligible);
        assert!(verdict.reason.contains("avg_review_score"), "{}", verdict.reason);
    }

    #[test]
    fn every_failure_is_reported_in_fixed_order() {
        let evaluator = TomlLevelEvaluator::default();
        let verdict = evaluator.evaluate_promotion(Level::Observer, &LevelMetricsSnapshot::default());
        assert!(!verdict.eligible);
        let tasks = verdict.reason.find("tasks_completed").unwrap();
        let score = verdict.reason.find("avg_review_score").unwrap();
        let days = verdict.reason.find("time_in_level_days").unwrap();
        assert!(tasks < score && score < days, "{}", verdict.reason);
    }

    #[test]
    fn highest_level_is_never_eligible() {
        let evaluator = TomlLevelEvaluator::default();
        let perfect = LevelMetricsSnapshot {
            tasks_completed: 10_000,
            avg_review_score: 1.0,
            time_in_level_days: 1_000,
            ..Default::default()
        };
        let verdict = evaluator.evaluate_promotion(Level::Autonomous, &perfect);
        assert!(!verdict.eligible);
        assert_eq!(verdict.target_level, None);
    }

    #[test]
    fn tier_without_criteria_is_not_eligible() {
        let mut config = LevelPolicyConfig::default();
        config.promotion.retain(|c| c.from_level != 2);
        let evaluator = TomlLevelEvaluator::new(config).unwrap();
        let verdict = evaluator.evaluate_promotion(Level::Assistant, &eligible_level_one());
        assert!(!verdict.eligible);
        assert!(verdict.reason.contains("no promotion criteria"));
    }

    // ── Demotion ──────────────────────────────────────────────────────────────

    #[test]
    fn critical_violation_demotes_one_level() {
        let evaluator = TomlLevelEvaluator::default();
        let metrics = LevelMetricsSnapshot {
            violations_30d: 1,
            critical_violations_7d: 1,
            ..Default::default()
        };
        let verdict = evaluator.evaluate_demotion(Level::Operator, &metrics);
        assert!(verdict.should_demote);
        assert_eq!(verdict.target_level, Some(Level::Assistant));
        assert!(verdict.reason.contains("critical"));
    }

    #[test]
    fn failures_must_exceed_the_ceiling() {
        let evaluator = TomlLevelEvaluator::default();
        let at = LevelMetricsSnapshot { consecutive_failures: 3, ..Default::default() };
        let over = LevelMetricsSnapshot { consecutive_failures: 4, ..Default::default() };
        assert!(!evaluator.evaluate_demotion(Level::Operator, &at).should_demote);
        assert!(evaluator.evaluate_demotion(Level::Operator, &over).should_demote);
    }

    #[test]
    fn warning_violations_alone_never_demote() {
        let evaluator = TomlLevelEvaluator::default();
        let metrics = LevelMetricsSnapshot { violations_30d: 50, ..Default::default() };
        assert!(!evaluator.evaluate_demotion(Level::Autonomous, &metrics).should_demote);
    }

    #[test]
    fn level_one_is_the_floor() {
        let evaluator = TomlLevelEvaluator::default();
        let metrics = LevelMetricsSnapshot {
            violations_30d: 5,
            critical_violations_7d: 5,
            consecutive_failures: 99,
            ..Default::default()
        };
        let verdict = evaluator.evaluate_demotion(Level::Observer, &metrics);
        assert!(!verdict.should_demote);
        assert_eq!(verdict.target_level, None);
    }

    // ── Guardrail gate ────────────────────────────────────────────────────────

    #[test]
    fn denied_action_is_critical_even_when_allowed_elsewhere() {
        let gate = GuardrailGate::new();
        let guardrails = AgentGuardrails::tier_default(Level::Autonomous);
        match gate.check(&guardrails, &action("delete_record")) {
            GuardrailDecision::Deny { guardrail, severity, .. } => {
                assert_eq!(guardrail, "denied_actions");
                assert_eq!(severity, ViolationSeverity::Critical);
            }
            other => panic!("expected Deny, got {:?}", other),
        }
    }

    #[test]
    fn level_one_defaults_send_everything_to_review() {
        let gate = GuardrailGate::new();
        let guardrails = AgentGuardrails::tier_default(Level::Observer);
        assert!(matches!(
            gate.check(&guardrails, &action("read")),
            GuardrailDecision::RequireReview { .. }
        ));
    }

    #[test]
    fn low_confidence_requires_review() {
        let gate = GuardrailGate::new();
        let guardrails = AgentGuardrails::tier_default(Level::Operator);
        let mut request = action("send");
        assert_eq!(gate.check(&guardrails, &request), GuardrailDecision::Allow);

        request.confidence = 0.5;
        match gate.check(&guardrails, &request) {
            GuardrailDecision::RequireReview { guardrail, .. } => {
                assert_eq!(guardrail, "auto_review_threshold");
            }
            other => panic!("expected RequireReview, got {:?}", other),
        }
    }

    #[test]
    fn confidence_at_threshold_is_allowed_but_nan_is_reviewed() {
        let gate = GuardrailGate::new();
        let guardrails = AgentGuardrails::tier_default(Level::Operator);
        let mut request = action("send");

        request.confidence = guardrails.auto_review_threshold;
        assert_eq!(gate.check(&guardrails, &request), GuardrailDecision::Allow);

        request.confidence = f64::NAN;
        assert!(matches!(
            gate.check(&guardrails, &request),
            GuardrailDecision::RequireReview { .. }
        ));
    }

    #[test]
    fn resource_ceilings_and_domains_deny() {
        let gate = GuardrailGate::new();
        let mut guardrails = AgentGuardrails::tier_default(Level::Operator);
        guardrails.allowed_domains.insert("support".to_string());

        let mut request = action("send");
        request.domain = Some("billing".to_string());
        assert!(matches!(
            gate.check(&guardrails, &request),
            GuardrailDecision::Deny { ref guardrail, .. } if guardrail == "allowed_domains"
        ));

        request.domain = Some("support".to_string());
        request.active_missions = guardrails.max_concurrent_missions;
        assert!(matches!(
            gate.check(&guardrails, &request),
            GuardrailDecision::Deny { ref guardrail, .. } if guardrail == "max_concurrent_missions"
        ));

        request.active_missions = 0;
        request.tasks_today = guardrails.max_daily_tasks;
        assert!(matches!(
            gate.check(&guardrails, &request),
            GuardrailDecision::Deny { ref guardrail, .. } if guardrail == "max_daily_tasks"
        ));
    }

    #[test]
    fn action_outside_allow_list_is_denied() {
        let gate = GuardrailGate::new();
        let guardrails = AgentGuardrails::tier_default(Level::Assistant);
        assert!(matches!(
            gate.check(&guardrails, &action("execute_workflow")),
            GuardrailDecision::Deny { severity: ViolationSeverity::Warning, .. }
        ));
    }
}
