//! Trait seams of the TierGuard engine.
//!
//! - `LevelStore`          — owns `AgentLevelState`; every level write appends history
//! - `TransitionStore`     — owns transition requests; enforces one pending per agent
//! - `HistoryWriter`       — append-only level history sink
//! - `ViolationLedger`     — append-only record of denied/flagged actions
//! - `TransitionEvaluator` — pure promotion/demotion rules
//! - `ActionGate`          — pure guardrail check used by the authorization checkpoint
//! - `ChangeSink`          — receives every committed change for replication
//! - `Clock`               — time source, injectable for deterministic replays

use chrono::{DateTime, Utc};
use uuid::Uuid;

use tierguard_contracts::{
    agent::AgentId,
    change::ChangeEvent,
    error::TierGuardResult,
    evaluation::{ActionRequest, DemotionVerdict, GuardrailDecision, PromotionVerdict},
    guardrails::AgentGuardrails,
    level::Level,
    metrics::LevelMetricsSnapshot,
    state::{AgentLevelState, LevelChange},
    transition::{LevelHistoryEntry, LevelTransitionRequest, TransitionFilter, TransitionResolution},
    violation::{GuardrailViolation, NewViolation, ViolationQuery},
};

/// Durable store of per-agent level state.
///
/// All writes are upserts keyed by `agent_id` and must be serialized per
/// agent: a lost update here would let an authorization check read a level
/// the agent no longer holds.
pub trait LevelStore: Send + Sync {
    fn get(&self, agent_id: &AgentId) -> TierGuardResult<Option<AgentLevelState>>;

    fn list(&self) -> TierGuardResult<Vec<AgentLevelState>>;

    /// Create the agent's state at level 1 if absent; otherwise return the
    /// existing state unchanged.
    fn register(
        &self,
        agent_id: &AgentId,
        guardrails: AgentGuardrails,
        metrics: LevelMetricsSnapshot,
    ) -> TierGuardResult<AgentLevelState>;

    /// Atomically write the new level and append exactly one history entry.
    ///
    /// Fails with `StaleWrite` when `change.expected_updated_at` is set and no
    /// longer matches. If the history append fails the level write is undone.
    fn set_level(&self, change: LevelChange) -> TierGuardResult<LevelHistoryEntry>;

    /// Replace the guardrails wholesale. No repair or defaulting.
    fn set_guardrails(
        &self,
        agent_id: &AgentId,
        guardrails: AgentGuardrails,
    ) -> TierGuardResult<AgentLevelState>;

    fn set_metrics(
        &self,
        agent_id: &AgentId,
        metrics: LevelMetricsSnapshot,
    ) -> TierGuardResult<AgentLevelState>;

    /// Level history for one agent, newest first.
    fn history(&self, agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>>;
}

/// Store of level transition requests.
pub trait TransitionStore: Send + Sync {
    /// Insert a pending request. Fails with `DuplicatePendingRequest` if the
    /// agent already has one; the check and insert are one atomic step.
    fn insert_pending(&self, request: LevelTransitionRequest)
        -> TierGuardResult<LevelTransitionRequest>;

    /// Insert a request that is already terminal (manual overrides).
    fn insert(&self, request: LevelTransitionRequest) -> TierGuardResult<LevelTransitionRequest>;

    fn get(&self, request_id: Uuid) -> TierGuardResult<Option<LevelTransitionRequest>>;

    fn pending_for(&self, agent_id: &AgentId) -> TierGuardResult<Option<LevelTransitionRequest>>;

    /// Move a pending request to a terminal status. Any other starting
    /// status fails with `RequestNotPending`.
    fn resolve(
        &self,
        request_id: Uuid,
        resolution: TransitionResolution,
    ) -> TierGuardResult<LevelTransitionRequest>;

    /// Put a resolved request back to pending, clearing its review fields.
    ///
    /// Compensation for a resolution whose level write then failed. Fails
    /// with `DuplicatePendingRequest` if the agent has opened another
    /// request since.
    fn reopen(&self, request_id: Uuid) -> TierGuardResult<LevelTransitionRequest>;

    /// Remove a terminal request whose level write never happened.
    fn withdraw(&self, request_id: Uuid) -> TierGuardResult<()>;

    /// Matching requests, newest first.
    fn list(&self, filter: &TransitionFilter) -> TierGuardResult<Vec<LevelTransitionRequest>>;

    /// The latest rejection cooldown for the agent that is still running at `now`.
    fn active_cooldown(
        &self,
        agent_id: &AgentId,
        now: DateTime<Utc>,
    ) -> TierGuardResult<Option<DateTime<Utc>>>;
}

/// Append-only sink for level history entries.
pub trait HistoryWriter: Send + Sync {
    fn append(&self, entry: &LevelHistoryEntry) -> TierGuardResult<()>;

    /// Entries for one agent, newest first.
    fn entries_for(&self, agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>>;
}

/// Append-only ledger of guardrail violations.
///
/// The engine writes here but never reads its own ledger to make decisions;
/// violation counts reach the evaluator only through the metrics pipeline.
pub trait ViolationLedger: Send + Sync {
    fn log(&self, violation: NewViolation) -> TierGuardResult<GuardrailViolation>;

    /// Matching violations, newest first, after `offset`, at most `limit`.
    fn list(&self, query: &ViolationQuery) -> TierGuardResult<Vec<GuardrailViolation>>;
}

/// Pure level rules. Identical inputs always yield identical outputs.
pub trait TransitionEvaluator: Send + Sync {
    fn evaluate_promotion(&self, level: Level, metrics: &LevelMetricsSnapshot) -> PromotionVerdict;

    fn evaluate_demotion(&self, level: Level, metrics: &LevelMetricsSnapshot) -> DemotionVerdict;
}

/// Pure guardrail check run before an agent acts.
pub trait ActionGate: Send + Sync {
    fn check(&self, guardrails: &AgentGuardrails, request: &ActionRequest) -> GuardrailDecision;
}

/// Receives every committed change. Delivery is best-effort per call;
/// subscribers must tolerate replays.
pub trait ChangeSink: Send + Sync {
    fn publish(&self, event: ChangeEvent);
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
