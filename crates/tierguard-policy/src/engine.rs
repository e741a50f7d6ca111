//! TOML-driven level evaluator.
//!
//! `TomlLevelEvaluator` loads a `LevelPolicyConfig` and implements the
//! `TransitionEvaluator` trait from tierguard-core.
//!
//! Promotion: every `Criterion` for the agent's tier is checked; the agent
//! is eligible only if none fails. Level 4 and tiers without configured
//! criteria are never eligible.
//!
//! Demotion: one tier down when `critical_violations_7d > 0` or
//! `consecutive_failures` exceeds the configured ceiling. `violations_30d`
//! alone never demotes, and level 1 is the floor.

use std::path::Path;

use tracing::debug;

use tierguard_contracts::{
    error::{TierGuardError, TierGuardResult},
    evaluation::{DemotionVerdict, PromotionVerdict},
    level::Level,
    metrics::LevelMetricsSnapshot,
};
use tierguard_core::{traits::TransitionEvaluator, workflow::WorkflowSettings};

use crate::rule::{Criterion, LevelPolicyConfig};

/// The shipped default policy.
pub const DEFAULT_POLICY: &str = include_str!("../policies/default.toml");

/// A `TransitionEvaluator` whose thresholds come from a TOML document.
///
/// ```rust,ignore
/// use tierguard_policy::engine::TomlLevelEvaluator;
///
/// let evaluator = TomlLevelEvaluator::from_file(Path::new("crates/tierguard-policy/policies/default.toml"))?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct TomlLevelEvaluator {
    config: LevelPolicyConfig,
}

impl TomlLevelEvaluator {
    pub fn new(config: LevelPolicyConfig) -> TierGuardResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Parse `s` as TOML and build an evaluator.
    ///
    /// Returns `TierGuardError::ConfigError` if the TOML is malformed, does
    /// not match `LevelPolicyConfig`, or fails validation.
    pub fn from_toml_str(s: &str) -> TierGuardResult<Self> {
        let config: LevelPolicyConfig = toml::from_str(s).map_err(|e| TierGuardError::ConfigError {
            reason: format!("failed to parse level policy TOML: {}", e),
        })?;
        Self::new(config)
    }

    pub fn from_file(path: &Path) -> TierGuardResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| TierGuardError::ConfigError {
            reason: format!("failed to read level policy file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn config(&self) -> &LevelPolicyConfig {
        &self.config
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        self.config.workflow_settings()
    }

    /// Promotion check with the criteria visited in the given order.
    ///
    /// Failures are always reported in `Criterion::ALL` order, so the verdict
    /// is identical for every permutation of `order` that covers all four
    /// criteria.
    pub fn evaluate_promotion_in_order(
        &self,
        level: Level,
        metrics: &LevelMetricsSnapshot,
        order: &[Criterion],
    ) -> PromotionVerdict {
        let Some(target) = level.promoted() else {
            return PromotionVerdict {
                eligible: false,
                target_level: None,
                reason: format!("{} is the highest level", level),
            };
        };

        let Some(criteria) = self.config.criteria_for(level.as_u8()) else {
            return PromotionVerdict {
                eligible: false,
                target_level: Some(target),
                reason: format!("no promotion criteria configured for {}", level),
            };
        };

        let mut failed: Vec<(Criterion, String)> = order
            .iter()
            .filter_map(|c| criteria.unmet(*c, metrics).map(|why| (*c, why)))
            .collect();
        failed.sort_by_key(|(c, _)| Criterion::ALL.iter().position(|x| x == c));
        failed.dedup_by_key(|(c, _)| *c);

        let verdict = if failed.is_empty() {
            PromotionVerdict {
                eligible: true,
                target_level: Some(target),
                reason: format!("meets all promotion criteria for {}", level),
            }
        } else {
            let reasons: Vec<String> = failed.into_iter().map(|(_, why)| why).collect();
            PromotionVerdict {
                eligible: false,
                target_level: Some(target),
                reason: reasons.join("; "),
            }
        };

        debug!(
            level = level.as_u8(),
            eligible = verdict.eligible,
            reason = %verdict.reason,
            "promotion evaluated"
        );
        verdict
    }
}

impl TransitionEvaluator for TomlLevelEvaluator {
    fn evaluate_promotion(&self, level: Level, metrics: &LevelMetricsSnapshot) -> PromotionVerdict {
        self.evaluate_promotion_in_order(level, metrics, &Criterion::ALL)
    }

    fn evaluate_demotion(&self, level: Level, metrics: &LevelMetricsSnapshot) -> DemotionVerdict {
        let mut reasons = Vec::new();
        if metrics.critical_violations_7d > 0 {
            reasons.push(format!(
                "{} critical violation(s) in the last 7 days",
                metrics.critical_violations_7d
            ));
        }
        let ceiling = self.config.demotion.max_consecutive_failures;
        if metrics.consecutive_failures > ceiling {
            reasons.push(format!(
                "consecutive_failures {} > {}",
                metrics.consecutive_failures, ceiling
            ));
        }

        if reasons.is_empty() {
            return DemotionVerdict::keep("no demotion criteria met");
        }

        match level.demoted() {
            Some(target) => DemotionVerdict {
                should_demote: true,
                target_level: Some(target),
                reason: reasons.join("; "),
            },
            None => DemotionVerdict::keep(format!(
                "{} is the lowest level ({})",
                level,
                reasons.join("; ")
            )),
        }
    }
}
