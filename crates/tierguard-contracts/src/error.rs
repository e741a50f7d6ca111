//! Error types for the TierGuard level engine.
//!
//! All fallible operations return `TierGuardResult<T>`. Every failure is
//! scoped to a single agent or request; nothing here is fatal to the process.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// The unified error type for the TierGuard crates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TierGuardError {
    /// A promotion was requested but the agent does not meet the criteria.
    #[error("agent '{agent_id}' is not eligible for promotion: {reason}")]
    NotEligible { agent_id: String, reason: String },

    /// A second promotion proposal was attempted while one is still pending.
    #[error("agent '{agent_id}' already has pending transition request {request_id}")]
    DuplicatePendingRequest { agent_id: String, request_id: Uuid },

    /// Target level outside 1..=4, or a demotion below level 1.
    #[error("invalid transition: {reason}")]
    InvalidTransition { reason: String },

    /// The agent's state changed between read and write.
    #[error("stale write for agent '{agent_id}': {reason}")]
    StaleWrite { agent_id: String, reason: String },

    /// A promotion was re-proposed while a rejection cooldown is running.
    #[error("promotion cooldown active for agent '{agent_id}' until {until}")]
    CooldownActive { agent_id: String, until: DateTime<Utc> },

    #[error("agent '{agent_id}' has no level state")]
    AgentNotFound { agent_id: String },

    #[error("transition request {request_id} not found")]
    RequestNotFound { request_id: Uuid },

    /// Approve/reject called on a request that already reached a terminal status.
    #[error("transition request {request_id} is not pending (status: {status})")]
    RequestNotPending { request_id: Uuid, status: String },

    #[error("invalid guardrails: {reason}")]
    InvalidGuardrails { reason: String },

    #[error("invalid metrics snapshot: {reason}")]
    InvalidMetrics { reason: String },

    /// A durable write could not be persisted.
    #[error("store write failed: {reason}")]
    StoreWriteFailed { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl TierGuardError {
    /// True for failures the caller may resolve by waiting or re-reading.
    ///
    /// `InvalidTransition` and configuration errors are caller bugs and are
    /// never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::NotEligible { .. }
                | Self::DuplicatePendingRequest { .. }
                | Self::StaleWrite { .. }
                | Self::CooldownActive { .. }
                | Self::StoreWriteFailed { .. }
        )
    }
}

/// Convenience alias used throughout the TierGuard crates.
pub type TierGuardResult<T> = Result<T, TierGuardError>;
