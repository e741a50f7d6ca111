//! In-memory `LevelStore`.
//!
//! One mutex guards the whole map, so every read-check-write on a state,
//! including the history append that belongs to a level change, is atomic.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};

use tracing::{debug, info, warn};
use uuid::Uuid;

use tierguard_contracts::{
    agent::AgentId,
    change::{ChangeEvent, ChangeRecord},
    error::{TierGuardError, TierGuardResult},
    guardrails::AgentGuardrails,
    level::Level,
    metrics::LevelMetricsSnapshot,
    state::{AgentLevelState, LevelChange},
    time::advance_stamp,
    transition::LevelHistoryEntry,
};
use tierguard_core::traits::{ChangeSink, Clock, HistoryWriter, LevelStore};

pub struct InMemoryLevelStore {
    states: Mutex<HashMap<AgentId, AgentLevelState>>,
    history: Arc<dyn HistoryWriter>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl InMemoryLevelStore {
    pub fn new(history: Arc<dyn HistoryWriter>, clock: Arc<dyn Clock>) -> Self {
        Self { states: Mutex::new(HashMap::new()), history, clock, sink: None }
    }

    /// Publish every committed write to `sink`.
    pub fn with_change_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn lock(&self) -> TierGuardResult<MutexGuard<'_, HashMap<AgentId, AgentLevelState>>> {
        self.states.lock().map_err(|e| TierGuardError::StoreWriteFailed {
            reason: format!("level store lock poisoned: {}", e),
        })
    }

    // Called with the map lock held so events for one agent leave in commit order.
    fn publish(&self, event: ChangeEvent) {
        if let Some(sink) = &self.sink {
            sink.publish(event);
        }
    }

    fn update_with<F>(&self, agent_id: &AgentId, apply: F) -> TierGuardResult<AgentLevelState>
    where
        F: FnOnce(&mut AgentLevelState),
    {
        let mut states = self.lock()?;
        let state = states
            .get_mut(agent_id)
            .ok_or_else(|| TierGuardError::AgentNotFound { agent_id: agent_id.0.clone() })?;

        apply(state);
        state.updated_at = advance_stamp(state.updated_at, self.clock.now());

        let updated = state.clone();
        self.publish(ChangeEvent::update(ChangeRecord::LevelState(updated.clone())));
        Ok(updated)
    }
}

impl LevelStore for InMemoryLevelStore {
    fn get(&self, agent_id: &AgentId) -> TierGuardResult<Option<AgentLevelState>> {
        Ok(self.lock()?.get(agent_id).cloned())
    }

    fn list(&self) -> TierGuardResult<Vec<AgentLevelState>> {
        let mut states: Vec<AgentLevelState> = self.lock()?.values().cloned().collect();
        states.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Ok(states)
    }

    fn register(
        &self,
        agent_id: &AgentId,
        guardrails: AgentGuardrails,
        metrics: LevelMetricsSnapshot,
    ) -> TierGuardResult<AgentLevelState> {
        guardrails.validate()?;
        metrics.validate()?;

        let mut states = self.lock()?;
        if let Some(existing) = states.get(agent_id) {
            debug!(agent_id = %agent_id, "agent already registered");
            return Ok(existing.clone());
        }

        let now = self.clock.now();
        let state = AgentLevelState {
            agent_id: agent_id.clone(),
            current_level: Level::Observer,
            guardrails,
            metrics,
            level_assigned_at: now,
            created_at: now,
            updated_at: now,
        };
        states.insert(agent_id.clone(), state.clone());
        self.publish(ChangeEvent::insert(ChangeRecord::LevelState(state.clone())));

        info!(agent_id = %agent_id, level = state.current_level.as_u8(), "agent registered");
        Ok(state)
    }

    fn set_level(&self, change: LevelChange) -> TierGuardResult<LevelHistoryEntry> {
        let mut states = self.lock()?;
        let previous = states
            .get(&change.agent_id)
            .cloned()
            .ok_or_else(|| TierGuardError::AgentNotFound { agent_id: change.agent_id.0.clone() })?;

        if let Some(expected) = change.expected_updated_at {
            if expected != previous.updated_at {
                warn!(
                    agent_id = %change.agent_id,
                    expected = %expected,
                    actual = %previous.updated_at,
                    "level write rejected: state changed since read"
                );
                return Err(TierGuardError::StaleWrite {
                    agent_id: change.agent_id.0.clone(),
                    reason: format!(
                        "expected updated_at {} but found {}",
                        expected, previous.updated_at
                    ),
                });
            }
        }

        let now = self.clock.now();
        let mut next = previous.clone();
        next.current_level = change.to_level;
        next.updated_at = advance_stamp(previous.updated_at, now);
        if change.to_level != previous.current_level {
            next.level_assigned_at = next.updated_at;
        }
        states.insert(change.agent_id.clone(), next.clone());

        let entry = LevelHistoryEntry {
            id: Uuid::new_v4(),
            agent_id: change.agent_id.clone(),
            from_level: previous.current_level,
            to_level: change.to_level,
            trigger: change.trigger,
            reason: change.reason,
            approved_by: change.approved_by,
            request_id: change.request_id,
            metrics_snapshot: previous.metrics.clone(),
            changed_at: next.updated_at,
        };

        if let Err(e) = self.history.append(&entry) {
            states.insert(change.agent_id.clone(), previous);
            warn!(
                agent_id = %change.agent_id,
                error = %e,
                "history append failed; level write rolled back"
            );
            return Err(e);
        }

        self.publish(ChangeEvent::update(ChangeRecord::LevelState(next)));
        debug!(
            agent_id = %entry.agent_id,
            from_level = entry.from_level.as_u8(),
            to_level = entry.to_level.as_u8(),
            trigger = %entry.trigger,
            "level written"
        );
        Ok(entry)
    }

    fn set_guardrails(
        &self,
        agent_id: &AgentId,
        guardrails: AgentGuardrails,
    ) -> TierGuardResult<AgentLevelState> {
        guardrails.validate()?;
        self.update_with(agent_id, |state| state.guardrails = guardrails)
    }

    fn set_metrics(
        &self,
        agent_id: &AgentId,
        metrics: LevelMetricsSnapshot,
    ) -> TierGuardResult<AgentLevelState> {
        metrics.validate()?;
        self.update_with(agent_id, |state| state.metrics = metrics)
    }

    fn history(&self, agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>> {
        self.history.entries_for(agent_id)
    }
}
