//! Level policy configuration schema.
//!
//! A `LevelPolicyConfig` is deserialized from TOML and holds one
//! `PromotionCriteria` block per promotable tier, the demotion ceiling, and
//! the workflow tunables.

use std::collections::HashSet;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use tierguard_contracts::{
    error::{TierGuardError, TierGuardResult},
    metrics::LevelMetricsSnapshot,
};
use tierguard_core::workflow::WorkflowSettings;

/// The four promotion criteria, in the order failures are reported.
///
/// Each criterion is checked independently of the others; eligibility is
/// their conjunction, so check order never changes the outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    TasksCompleted,
    AvgReviewScore,
    TimeInLevel,
    WarningViolations,
}

impl Criterion {
    pub const ALL: [Criterion; 4] = [
        Criterion::TasksCompleted,
        Criterion::AvgReviewScore,
        Criterion::TimeInLevel,
        Criterion::WarningViolations,
    ];
}

/// Requirements for leaving one tier upwards.
///
/// Example in TOML:
/// ```toml
/// [[promotion]]
/// from_level = 1
/// min_tasks_completed = 10
/// min_avg_review_score = 0.85
/// min_time_in_level_days = 7
/// max_warning_violations_30d = 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromotionCriteria {
    /// The tier these criteria apply to (1..=3).
    pub from_level: u8,
    pub min_tasks_completed: u32,
    pub min_avg_review_score: f64,
    pub min_time_in_level_days: u32,
    pub max_warning_violations_30d: u32,
}

impl PromotionCriteria {
    /// Describe why `metrics` fails `criterion`, or `None` if it passes.
    pub fn unmet(&self, criterion: Criterion, metrics: &LevelMetricsSnapshot) -> Option<String> {
        match criterion {
            Criterion::TasksCompleted if metrics.tasks_completed < self.min_tasks_completed => {
                Some(format!(
                    "tasks_completed {} < {}",
                    metrics.tasks_completed, self.min_tasks_completed
                ))
            }
            Criterion::AvgReviewScore
                // A NaN score fails the criterion.
                if metrics.avg_review_score.is_nan()
                    || metrics.avg_review_score < self.min_avg_review_score =>
            {
                Some(format!(
                    "avg_review_score {:.2} < {:.2}",
                    metrics.avg_review_score, self.min_avg_review_score
                ))
            }
            Criterion::TimeInLevel if metrics.time_in_level_days < self.min_time_in_level_days => {
                Some(format!(
                    "time_in_level_days {} < {}",
                    metrics.time_in_level_days, self.min_time_in_level_days
                ))
            }
            Criterion::WarningViolations
                if metrics.violations_30d > self.max_warning_violations_30d =>
            {
                Some(format!(
                    "violations_30d {} > {}",
                    metrics.violations_30d, self.max_warning_violations_30d
                ))
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DemotionPolicy {
    /// Demote when `consecutive_failures` is strictly greater than this.
    pub max_consecutive_failures: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowPolicy {
    pub cooldown_days: u32,
    pub reset_guardrails_on_level_change: bool,
}

/// The top-level structure deserialized from a TOML level policy file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelPolicyConfig {
    pub demotion: DemotionPolicy,
    pub workflow: WorkflowPolicy,
    pub promotion: Vec<PromotionCriteria>,
}

impl LevelPolicyConfig {
    /// Reject configurations the evaluator cannot apply unambiguously.
    pub fn validate(&self) -> TierGuardResult<()> {
        let mut seen = HashSet::new();
        for criteria in &self.promotion {
            if !(1..=3).contains(&criteria.from_level) {
                return Err(TierGuardError::ConfigError {
                    reason: format!(
                        "promotion criteria for level {} (only levels 1..=3 can be promoted)",
                        criteria.from_level
                    ),
                });
            }
            if !seen.insert(criteria.from_level) {
                return Err(TierGuardError::ConfigError {
                    reason: format!(
                        "duplicate promotion criteria for level {}",
                        criteria.from_level
                    ),
                });
            }
            if !(0.0..=1.0).contains(&criteria.min_avg_review_score) {
                return Err(TierGuardError::ConfigError {
                    reason: format!(
                        "min_avg_review_score {} for level {} is outside 0.0..=1.0",
                        criteria.min_avg_review_score, criteria.from_level
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn criteria_for(&self, level: u8) -> Option<&PromotionCriteria> {
        self.promotion.iter().find(|c| c.from_level == level)
    }

    pub fn workflow_settings(&self) -> WorkflowSettings {
        WorkflowSettings {
            cooldown: Duration::days(i64::from(self.workflow.cooldown_days)),
            reset_guardrails_on_level_change: self.workflow.reset_guardrails_on_level_change,
        }
    }
}

impl Default for LevelPolicyConfig {
    /// Matches `policies/default.toml` in this crate.
    fn default() -> Self {
        let criteria = |from_level, tasks, score, days, warnings| PromotionCriteria {
            from_level,
            min_tasks_completed: tasks,
            min_avg_review_score: score,
            min_time_in_level_days: days,
            max_warning_violations_30d: warnings,
        };

        Self {
            demotion: DemotionPolicy { max_consecutive_failures: 3 },
            workflow: WorkflowPolicy { cooldown_days: 7, reset_guardrails_on_level_change: false },
            promotion: vec![
                criteria(1, 10, 0.85, 7, 2),
                criteria(2, 50, 0.9, 30, 1),
                criteria(3, 200, 0.95, 90, 0),
            ],
        }
    }
}
