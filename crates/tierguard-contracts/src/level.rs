//! The four trust tiers and the triggers that move an agent between them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TierGuardError, TierGuardResult};

/// One of the four ordered trust tiers.
///
/// 1 is the most restricted, 4 the most autonomous. Any other integer is
/// rejected at construction, so a `Level` value is always a defined tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Level {
    /// Zero autonomy: every action requires human approval.
    Observer = 1,
    Assistant = 2,
    Operator = 3,
    /// Full autonomy inside the guardrails.
    Autonomous = 4,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Observer,
        Level::Assistant,
        Level::Operator,
        Level::Autonomous,
    ];

    pub fn new(value: u8) -> TierGuardResult<Self> {
        match value {
            1 => Ok(Level::Observer),
            2 => Ok(Level::Assistant),
            3 => Ok(Level::Operator),
            4 => Ok(Level::Autonomous),
            other => Err(TierGuardError::InvalidTransition {
                reason: format!("level {} is outside the defined tiers 1..=4", other),
            }),
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// The next tier up, or `None` at level 4.
    pub fn promoted(self) -> Option<Level> {
        Level::new(self.as_u8() + 1).ok()
    }

    /// The next tier down, or `None` at level 1.
    pub fn demoted(self) -> Option<Level> {
        self.as_u8().checked_sub(1).and_then(|v| Level::new(v).ok())
    }

    pub fn name(self) -> &'static str {
        match self {
            Level::Observer => "observer",
            Level::Assistant => "assistant",
            Level::Operator => "operator",
            Level::Autonomous => "autonomous",
        }
    }
}

impl TryFrom<u8> for Level {
    type Error = TierGuardError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Level::new(value)
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> Self {
        level.as_u8()
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{} ({})", self.as_u8(), self.name())
    }
}

/// Why a level change happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionTrigger {
    Promotion,
    Demotion,
    ManualOverride,
}

impl TransitionTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            TransitionTrigger::Promotion => "promotion",
            TransitionTrigger::Demotion => "demotion",
            TransitionTrigger::ManualOverride => "manual_override",
        }
    }
}

impl fmt::Display for TransitionTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
