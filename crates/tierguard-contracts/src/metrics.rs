//! Rolling performance figures produced by the upstream metrics pipeline.

use serde::{Deserialize, Serialize};

use crate::error::{TierGuardError, TierGuardResult};

/// A frozen view of an agent's recent performance.
///
/// The engine only reads these numbers. Every field is required on
/// deserialization; `Default` is the all-zero snapshot of a newly registered
/// agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LevelMetricsSnapshot {
    pub tasks_completed: u32,
    /// Mean reviewer score in 0.0..=1.0.
    pub avg_review_score: f64,
    pub violations_30d: u32,
    pub critical_violations_7d: u32,
    pub consecutive_failures: u32,
    pub time_in_level_days: u32,
}

impl LevelMetricsSnapshot {
    pub fn validate(&self) -> TierGuardResult<()> {
        if !(0.0..=1.0).contains(&self.avg_review_score) {
            return Err(TierGuardError::InvalidMetrics {
                reason: format!(
                    "avg_review_score {} is outside 0.0..=1.0",
                    self.avg_review_score
                ),
            });
        }
        Ok(())
    }
}
