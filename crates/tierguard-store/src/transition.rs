//! In-memory `TransitionStore`.
//!
//! Requests are kept in insertion order. The one-pending-per-agent rule is
//! checked and enforced inside the same critical section as the insert.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use tierguard_contracts::{
    agent::AgentId,
    change::{ChangeEvent, ChangeRecord},
    error::{TierGuardError, TierGuardResult},
    time::advance_stamp,
    transition::{LevelTransitionRequest, TransitionFilter, TransitionResolution, TransitionStatus},
};
use tierguard_core::traits::{ChangeSink, Clock, TransitionStore};

pub struct InMemoryTransitionStore {
    requests: Mutex<Vec<LevelTransitionRequest>>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl InMemoryTransitionStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { requests: Mutex::new(Vec::new()), clock, sink: None }
    }

    pub fn with_change_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn lock(&self) -> TierGuardResult<MutexGuard<'_, Vec<LevelTransitionRequest>>> {
        self.requests.lock().map_err(|e| TierGuardError::StoreWriteFailed {
            reason: format!("transition store lock poisoned: {}", e),
        })
    }

    fn publish(&self, event: ChangeEvent) {
        if let Some(sink) = &self.sink {
            sink.publish(event);
        }
    }

    fn push(
        &self,
        requests: &mut Vec<LevelTransitionRequest>,
        request: LevelTransitionRequest,
    ) -> TierGuardResult<LevelTransitionRequest> {
        if requests.iter().any(|r| r.id == request.id) {
            return Err(TierGuardError::StoreWriteFailed {
                reason: format!("transition request {} already exists", request.id),
            });
        }
        requests.push(request.clone());
        self.publish(ChangeEvent::insert(ChangeRecord::Transition(request.clone())));
        Ok(request)
    }
}

impl TransitionStore for InMemoryTransitionStore {
    fn insert_pending(
        &self,
        request: LevelTransitionRequest,
    ) -> TierGuardResult<LevelTransitionRequest> {
        if request.status != TransitionStatus::Pending {
            return Err(TierGuardError::InvalidTransition {
                reason: format!("insert_pending called with a {} request", request.status),
            });
        }

        let mut requests = self.lock()?;
        if let Some(existing) = requests
            .iter()
            .find(|r| r.agent_id == request.agent_id && r.status == TransitionStatus::Pending)
        {
            warn!(
                agent_id = %request.agent_id,
                existing = %existing.id,
                "second pending request refused"
            );
            return Err(TierGuardError::DuplicatePendingRequest {
                agent_id: request.agent_id.0.clone(),
                request_id: existing.id,
            });
        }

        self.push(&mut requests, request)
    }

    fn insert(&self, request: LevelTransitionRequest) -> TierGuardResult<LevelTransitionRequest> {
        if !request.status.is_terminal() {
            return Err(TierGuardError::InvalidTransition {
                reason: "pending requests must go through insert_pending".to_string(),
            });
        }

        let mut requests = self.lock()?;
        self.push(&mut requests, request)
    }

    fn get(&self, request_id: Uuid) -> TierGuardResult<Option<LevelTransitionRequest>> {
        Ok(self.lock()?.iter().find(|r| r.id == request_id).cloned())
    }

    fn pending_for(&self, agent_id: &AgentId) -> TierGuardResult<Option<LevelTransitionRequest>> {
        Ok(self
            .lock()?
            .iter()
            .find(|r| r.agent_id == *agent_id && r.status == TransitionStatus::Pending)
            .cloned())
    }

    fn resolve(
        &self,
        request_id: Uuid,
        resolution: TransitionResolution,
    ) -> TierGuardResult<LevelTransitionRequest> {
        if !resolution.status.is_terminal() {
            return Err(TierGuardError::InvalidTransition {
                reason: "a request cannot be resolved back to pending".to_string(),
            });
        }

        let mut requests = self.lock()?;
        let request = requests
            .iter_mut()
            .find(|r| r.id == request_id)
            .ok_or(TierGuardError::RequestNotFound { request_id })?;

        if request.status != TransitionStatus::Pending {
            return Err(TierGuardError::RequestNotPending {
                request_id,
                status: request.status.to_string(),
            });
        }

        request.status = resolution.status;
        request.reviewed_by = Some(resolution.reviewed_by);
        request.reviewed_at = Some(resolution.reviewed_at);
        request.review_note = resolution.review_note;
        request.cooldown_until = resolution.cooldown_until;
        request.updated_at = advance_stamp(request.updated_at, self.clock.now());

        let resolved = request.clone();
        self.publish(ChangeEvent::update(ChangeRecord::Transition(resolved.clone())));
        debug!(
            agent_id = %resolved.agent_id,
            request_id = %request_id,
            status = %resolved.status,
            "transition request resolved"
        );
        Ok(resolved)
    }

    fn reopen(&self, request_id: Uuid) -> TierGuardResult<LevelTransitionRequest> {
        let mut requests = self.lock()?;
        let index = requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or(TierGuardError::RequestNotFound { request_id })?;

        let agent_id = requests[index].agent_id.clone();
        if let Some(other) = requests
            .iter()
            .find(|r| r.agent_id == agent_id && r.status == TransitionStatus::Pending)
        {
            return Err(TierGuardError::DuplicatePendingRequest {
                agent_id: agent_id.0.clone(),
                request_id: other.id,
            });
        }

        let request = &mut requests[index];
        request.status = TransitionStatus::Pending;
        request.reviewed_by = None;
        request.reviewed_at = None;
        request.review_note = None;
        request.cooldown_until = None;
        request.updated_at = advance_stamp(request.updated_at, self.clock.now());

        let reopened = request.clone();
        self.publish(ChangeEvent::update(ChangeRecord::Transition(reopened.clone())));
        warn!(agent_id = %agent_id, request_id = %request_id, "transition request reopened");
        Ok(reopened)
    }

    fn withdraw(&self, request_id: Uuid) -> TierGuardResult<()> {
        let mut requests = self.lock()?;
        let index = requests
            .iter()
            .position(|r| r.id == request_id)
            .ok_or(TierGuardError::RequestNotFound { request_id })?;

        if !requests[index].status.is_terminal() {
            return Err(TierGuardError::InvalidTransition {
                reason: format!("pending request {} cannot be withdrawn", request_id),
            });
        }

        let mut removed = requests.remove(index);
        // The delete must outrank the insert in every replica cache.
        removed.updated_at = advance_stamp(removed.updated_at, self.clock.now());
        self.publish(ChangeEvent::delete(ChangeRecord::Transition(removed.clone())));
        warn!(agent_id = %removed.agent_id, request_id = %request_id, "transition request withdrawn");
        Ok(())
    }

    fn list(&self, filter: &TransitionFilter) -> TierGuardResult<Vec<LevelTransitionRequest>> {
        Ok(self.lock()?.iter().rev().filter(|r| filter.matches(r)).cloned().collect())
    }

    fn active_cooldown(
        &self,
        agent_id: &AgentId,
        now: DateTime<Utc>,
    ) -> TierGuardResult<Option<DateTime<Utc>>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|r| r.agent_id == *agent_id && r.status == TransitionStatus::Rejected)
            .filter_map(|r| r.cooldown_until)
            .filter(|until| *until > now)
            .max())
    }
}
