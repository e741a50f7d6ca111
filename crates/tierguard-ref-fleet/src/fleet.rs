//! Wiring for an in-memory TierGuard deployment.
//!
//! `Fleet` builds every component from a policy document and keeps typed
//! handles to the pieces the scenarios inspect afterwards (the hash-chained
//! logs, the change feed, the manual clock).

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use tracing::info;

use tierguard_audit::{InMemoryHistoryLog, InMemoryViolationLedger};
use tierguard_contracts::{
    agent::AgentId,
    error::{TierGuardError, TierGuardResult},
    level::TransitionTrigger,
    state::AgentLevelState,
};
use tierguard_core::{
    clock::ManualClock,
    traits::{ChangeSink, Clock, HistoryWriter, LevelStore, TransitionStore, ViolationLedger},
    LevelAuthority,
};
use tierguard_policy::{GuardrailGate, TomlLevelEvaluator, DEFAULT_POLICY};
use tierguard_store::{InMemoryLevelStore, InMemoryTransitionStore};
use tierguard_sync::{ChangeFeed, Replica};

use crate::mock_data::FleetAgent;

/// Operator name recorded on the overrides that place seeded agents.
pub const BOOTSTRAP_ACTOR: &str = "fleet-bootstrap";

/// The instant every scenario clock starts at.
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).single().unwrap_or_else(Utc::now)
}

pub struct Fleet {
    pub authority: LevelAuthority,
    /// Direct handle on the level store, for out-of-band writers.
    pub levels: Arc<InMemoryLevelStore>,
    pub feed: Arc<ChangeFeed>,
    pub history: Arc<InMemoryHistoryLog>,
    pub ledger: Arc<InMemoryViolationLedger>,
    pub clock: Arc<ManualClock>,
}

impl Fleet {
    /// Build a fleet governed by `policy_toml`, with the clock at `epoch()`.
    pub fn build(policy_toml: &str) -> TierGuardResult<Self> {
        let evaluator = TomlLevelEvaluator::from_toml_str(policy_toml)?;
        let settings = evaluator.workflow_settings();

        let clock = Arc::new(ManualClock::new(epoch()));
        let feed = Arc::new(ChangeFeed::new());
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let sink: Arc<dyn ChangeSink> = feed.clone();

        let history = Arc::new(InMemoryHistoryLog::new());
        let ledger = Arc::new(
            InMemoryViolationLedger::new(Arc::clone(&dyn_clock)).with_change_sink(Arc::clone(&sink)),
        );
        let history_writer: Arc<dyn HistoryWriter> = history.clone();
        let levels = Arc::new(
            InMemoryLevelStore::new(history_writer, Arc::clone(&dyn_clock))
                .with_change_sink(Arc::clone(&sink)),
        );
        let level_store: Arc<dyn LevelStore> = levels.clone();
        let transitions: Arc<dyn TransitionStore> = Arc::new(
            InMemoryTransitionStore::new(Arc::clone(&dyn_clock)).with_change_sink(sink),
        );
        let ledger_handle: Arc<dyn ViolationLedger> = ledger.clone();

        let authority = LevelAuthority::new(
            level_store,
            transitions,
            ledger_handle,
            Box::new(evaluator),
            dyn_clock,
            settings,
        )
        .with_gate(Box::new(GuardrailGate::new()));

        Ok(Self { authority, levels, feed, history, ledger, clock })
    }

    pub fn with_default_policy() -> TierGuardResult<Self> {
        Self::build(DEFAULT_POLICY)
    }

    /// Register `agent`, place it at its fixture level, and load its metrics.
    ///
    /// Agents above level 1 are placed with a manual override, so they start
    /// with one history entry.
    pub fn seed(&self, agent: &FleetAgent) -> TierGuardResult<AgentLevelState> {
        let agent_id = AgentId::new(agent.id);
        self.authority.register_agent(&agent_id, agent.guardrails.clone())?;
        if agent.level.as_u8() > 1 {
            self.authority.set_agent_level(
                &agent_id,
                agent.level.as_u8(),
                TransitionTrigger::ManualOverride,
                "seeded at fixture level",
                BOOTSTRAP_ACTOR,
            )?;
        }
        let state = self.authority.update_metrics(&agent_id, agent.metrics.clone())?;
        info!(agent_id = %agent_id, level = state.current_level.as_u8(), "fleet agent seeded");
        Ok(state)
    }

    pub fn seed_all(&self, agents: &[FleetAgent]) -> TierGuardResult<()> {
        for agent in agents {
            self.seed(agent)?;
        }
        Ok(())
    }

    /// Attach a console replica bootstrapped from the current snapshot.
    pub fn replica(&self) -> TierGuardResult<Replica> {
        Replica::connect(&self.feed, || self.authority.snapshot())
    }

    pub fn state(&self, agent_id: &str) -> TierGuardResult<AgentLevelState> {
        self.authority
            .get_state(&AgentId::new(agent_id))?
            .ok_or_else(|| TierGuardError::AgentNotFound { agent_id: agent_id.to_string() })
    }

    /// True if both hash chains are intact.
    pub fn audit_intact(&self) -> bool {
        self.history.verify_integrity() && self.ledger.verify_integrity()
    }
}
