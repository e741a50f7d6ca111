//! The transition workflow: the state machine for level-change proposals.
//!
//!   no_active_request → (evaluator proposes) → pending → approved | rejected
//!
//! Demotions bypass `pending` and are applied immediately, because they are
//! protective and must not wait on a human. Manual overrides bypass both the
//! evaluator and `pending` and are recorded as an approved request.
//!
//! Every mutating call takes the agent's lock for its whole
//! read-check-write sequence, and level writes additionally carry a
//! compare-and-swap stamp so writers outside this workflow are detected.
//!
//! Request bookkeeping is written before the level. If the level write then
//! fails, the bookkeeping is compensated (a claimed request is reopened, an
//! override record is withdrawn), so a failed call never leaves the agent
//! at a level the caller was told did not apply.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tierguard_contracts::{
    agent::AgentId,
    error::{TierGuardError, TierGuardResult},
    guardrails::AgentGuardrails,
    level::{Level, TransitionTrigger},
    state::{AgentLevelState, LevelChange},
    transition::{
        LevelHistoryEntry, LevelTransitionRequest, TransitionResolution, TransitionStatus,
    },
};

use crate::{
    locks::AgentLocks,
    traits::{Clock, LevelStore, TransitionEvaluator, TransitionStore},
};

/// Reviewer name stamped on requests the engine resolves by itself.
pub const SYSTEM_REVIEWER: &str = "system";

/// Tunables for the workflow.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSettings {
    /// How long a rejected agent is kept from being re-proposed.
    pub cooldown: Duration,
    /// Replace guardrails with the new tier's defaults after a level change.
    pub reset_guardrails_on_level_change: bool,
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self { cooldown: Duration::days(7), reset_guardrails_on_level_change: false }
    }
}

/// What one evaluation cycle did for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EvaluationOutcome {
    /// Demotion criteria were met; the new level is already in effect.
    Demoted { history: LevelHistoryEntry },
    /// The agent is eligible; a pending request awaits review.
    PromotionProposed { request: LevelTransitionRequest },
    Unchanged { reason: String },
}

/// A level change that has been applied, with the request that records it.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedTransition {
    pub request: LevelTransitionRequest,
    pub history: LevelHistoryEntry,
}

pub struct TransitionWorkflow {
    levels: Arc<dyn LevelStore>,
    transitions: Arc<dyn TransitionStore>,
    evaluator: Box<dyn TransitionEvaluator>,
    clock: Arc<dyn Clock>,
    settings: WorkflowSettings,
    locks: AgentLocks,
}

impl TransitionWorkflow {
    pub fn new(
        levels: Arc<dyn LevelStore>,
        transitions: Arc<dyn TransitionStore>,
        evaluator: Box<dyn TransitionEvaluator>,
        clock: Arc<dyn Clock>,
        settings: WorkflowSettings,
    ) -> Self {
        Self { levels, transitions, evaluator, clock, settings, locks: AgentLocks::new() }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    /// Evaluate the agent and, if eligible, open a pending promotion request.
    ///
    /// # Errors
    ///
    /// `AgentNotFound`, `DuplicatePendingRequest` if a request is already
    /// open, `CooldownActive` during a rejection cooldown, `NotEligible` when
    /// any criterion is unmet.
    pub fn request_promotion(&self, agent_id: &AgentId) -> TierGuardResult<LevelTransitionRequest> {
        let lock = self.lock_for(agent_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let state = self.require_state(agent_id)?;

        if let Some(pending) = self.transitions.pending_for(agent_id)? {
            return Err(TierGuardError::DuplicatePendingRequest {
                agent_id: agent_id.0.clone(),
                request_id: pending.id,
            });
        }

        let now = self.clock.now();
        if let Some(until) = self.transitions.active_cooldown(agent_id, now)? {
            return Err(TierGuardError::CooldownActive { agent_id: agent_id.0.clone(), until });
        }

        let verdict = self.evaluator.evaluate_promotion(state.current_level, &state.metrics);
        match (verdict.eligible, verdict.target_level) {
            (true, Some(target)) => self.open_promotion(&state, target, verdict.reason),
            _ => Err(TierGuardError::NotEligible {
                agent_id: agent_id.0.clone(),
                reason: verdict.reason,
            }),
        }
    }

    /// Approve a pending promotion and apply it.
    ///
    /// The agent must still be at the request's `from_level`; if its level
    /// moved since the proposal (a demotion or override landed in between)
    /// the approval fails with `StaleWrite` and the request stays pending.
    ///
    /// The request is claimed (marked approved) before the level is written;
    /// if the level write fails the claim is undone and the request is
    /// pending again.
    pub fn approve(&self, request_id: Uuid, reviewer: &str) -> TierGuardResult<AppliedTransition> {
        let agent_id = self.require_request(request_id)?.agent_id;
        let lock = self.lock_for(&agent_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let request = self.require_request(request_id)?;
        ensure_pending(&request)?;

        let state = self.require_state(&agent_id)?;
        if state.current_level != request.from_level {
            warn!(
                agent_id = %agent_id,
                request_id = %request_id,
                requested_from = request.from_level.as_u8(),
                current = state.current_level.as_u8(),
                "approval refused: level changed since proposal"
            );
            return Err(TierGuardError::StaleWrite {
                agent_id: agent_id.0.clone(),
                reason: format!(
                    "request was proposed from {} but agent is now at {}",
                    request.from_level, state.current_level
                ),
            });
        }

        let request = self.transitions.resolve(
            request_id,
            TransitionResolution {
                status: TransitionStatus::Approved,
                reviewed_by: reviewer.to_string(),
                reviewed_at: self.clock.now(),
                review_note: None,
                cooldown_until: None,
            },
        )?;

        let history = match self.apply_level(
            &state,
            request.to_level,
            TransitionTrigger::Promotion,
            request.reason.clone(),
            Some(reviewer.to_string()),
            Some(request.id),
        ) {
            Ok(history) => history,
            Err(e) => {
                self.compensate(&agent_id, &e, None, Some(request_id));
                return Err(e);
            }
        };
        self.reset_guardrails(&state, request.to_level)?;

        info!(
            agent_id = %agent_id,
            request_id = %request_id,
            reviewer = %reviewer,
            to_level = request.to_level.as_u8(),
            "promotion approved"
        );

        Ok(AppliedTransition { request, history })
    }

    /// Reject a pending promotion and start the anti-flapping cooldown.
    pub fn reject(
        &self,
        request_id: Uuid,
        reviewer: &str,
        reason: Option<&str>,
    ) -> TierGuardResult<LevelTransitionRequest> {
        let agent_id = self.require_request(request_id)?.agent_id;
        let lock = self.lock_for(&agent_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let now = self.clock.now();
        let cooldown_until = now + self.settings.cooldown;
        let request = self.transitions.resolve(
            request_id,
            TransitionResolution {
                status: TransitionStatus::Rejected,
                reviewed_by: reviewer.to_string(),
                reviewed_at: now,
                review_note: reason.map(str::to_string),
                cooldown_until: Some(cooldown_until),
            },
        )?;

        info!(
            agent_id = %agent_id,
            request_id = %request_id,
            reviewer = %reviewer,
            cooldown_until = %cooldown_until,
            "promotion rejected"
        );

        Ok(request)
    }

    /// Set an agent's level directly, bypassing evaluation and review.
    ///
    /// `level` is the raw tier number from the operator; anything outside
    /// 1..=4 is `InvalidTransition`, as is a `promotion` trigger that does not
    /// go up or a `demotion` trigger that does not go down. Any pending
    /// request is superseded (rejected without cooldown).
    ///
    /// If the level write fails, the override record is withdrawn and a
    /// superseded request is reopened.
    pub fn set_agent_level(
        &self,
        agent_id: &AgentId,
        level: u8,
        trigger: TransitionTrigger,
        reason: &str,
        actor: &str,
    ) -> TierGuardResult<AppliedTransition> {
        let to_level = Level::new(level)?;

        let lock = self.lock_for(agent_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let state = self.require_state(agent_id)?;
        let from_level = state.current_level;
        match trigger {
            TransitionTrigger::Promotion if to_level <= from_level => {
                return Err(TierGuardError::InvalidTransition {
                    reason: format!("promotion from {} to {} does not go up", from_level, to_level),
                });
            }
            TransitionTrigger::Demotion if to_level >= from_level => {
                return Err(TierGuardError::InvalidTransition {
                    reason: format!("demotion from {} to {} does not go down", from_level, to_level),
                });
            }
            _ => {}
        }

        let superseded =
            self.supersede_pending(agent_id, actor, "superseded by manual level change")?;

        let now = self.clock.now();
        let request_id = Uuid::new_v4();
        let inserted = self.transitions.insert(LevelTransitionRequest {
            id: request_id,
            agent_id: agent_id.clone(),
            from_level,
            to_level,
            trigger,
            reason: reason.to_string(),
            metrics_snapshot: state.metrics.clone(),
            status: TransitionStatus::Approved,
            reviewed_by: Some(actor.to_string()),
            reviewed_at: Some(now),
            review_note: None,
            cooldown_until: None,
            created_at: now,
            updated_at: now,
        });
        let request = match inserted {
            Ok(request) => request,
            Err(e) => {
                self.compensate(agent_id, &e, None, superseded);
                return Err(e);
            }
        };

        let history = match self.apply_level(
            &state,
            to_level,
            trigger,
            reason.to_string(),
            Some(actor.to_string()),
            Some(request_id),
        ) {
            Ok(history) => history,
            Err(e) => {
                self.compensate(agent_id, &e, Some(request_id), superseded);
                return Err(e);
            }
        };
        self.reset_guardrails(&state, to_level)?;

        info!(
            agent_id = %agent_id,
            actor = %actor,
            trigger = %trigger,
            from_level = from_level.as_u8(),
            to_level = to_level.as_u8(),
            "agent level set directly"
        );

        Ok(AppliedTransition { request, history })
    }

    /// Run one evaluation cycle for one agent.
    ///
    /// Demotion is checked first and applied immediately. Otherwise a
    /// promotion is proposed when the agent is eligible, has no open request
    /// and no running cooldown.
    pub fn run_evaluation_cycle(&self, agent_id: &AgentId) -> TierGuardResult<EvaluationOutcome> {
        let lock = self.lock_for(agent_id)?;
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let state = self.require_state(agent_id)?;

        let demotion = self.evaluator.evaluate_demotion(state.current_level, &state.metrics);
        if demotion.should_demote {
            let target = demotion.target_level.ok_or_else(|| TierGuardError::InvalidTransition {
                reason: format!("demotion verdict for {} has no target level", state.current_level),
            })?;

            let superseded =
                self.supersede_pending(agent_id, SYSTEM_REVIEWER, "superseded by demotion")?;
            let history = match self.apply_level(
                &state,
                target,
                TransitionTrigger::Demotion,
                demotion.reason.clone(),
                None,
                None,
            ) {
                Ok(history) => history,
                Err(e) => {
                    self.compensate(agent_id, &e, None, superseded);
                    return Err(e);
                }
            };
            self.reset_guardrails(&state, target)?;

            warn!(
                agent_id = %agent_id,
                from_level = state.current_level.as_u8(),
                to_level = target.as_u8(),
                reason = %demotion.reason,
                "agent demoted"
            );
            return Ok(EvaluationOutcome::Demoted { history });
        }

        if let Some(pending) = self.transitions.pending_for(agent_id)? {
            return Ok(EvaluationOutcome::Unchanged {
                reason: format!("promotion request {} is awaiting review", pending.id),
            });
        }

        if let Some(until) = self.transitions.active_cooldown(agent_id, self.clock.now())? {
            return Ok(EvaluationOutcome::Unchanged {
                reason: format!("promotion cooldown active until {}", until),
            });
        }

        let verdict = self.evaluator.evaluate_promotion(state.current_level, &state.metrics);
        debug!(
            agent_id = %agent_id,
            level = state.current_level.as_u8(),
            eligible = verdict.eligible,
            reason = %verdict.reason,
            "promotion evaluated"
        );

        match (verdict.eligible, verdict.target_level) {
            (true, Some(target)) => {
                let request = self.open_promotion(&state, target, verdict.reason)?;
                Ok(EvaluationOutcome::PromotionProposed { request })
            }
            _ => Ok(EvaluationOutcome::Unchanged { reason: verdict.reason }),
        }
    }

    /// Run the cycle for every registered agent. One agent's failure is
    /// reported in its own slot and never stops the others.
    pub fn evaluate_fleet(&self) -> TierGuardResult<Vec<(AgentId, TierGuardResult<EvaluationOutcome>)>> {
        let agents: Vec<AgentId> = self.levels.list()?.into_iter().map(|s| s.agent_id).collect();

        Ok(agents
            .into_iter()
            .map(|agent_id| {
                let outcome = self.run_evaluation_cycle(&agent_id);
                if let Err(e) = &outcome {
                    warn!(agent_id = %agent_id, error = %e, "evaluation cycle failed");
                }
                (agent_id, outcome)
            })
            .collect())
    }

    /// Number of agents that currently have a write lock entry.
    pub fn tracked_agents(&self) -> usize {
        self.locks.len()
    }

    // ── Internals ────────────────────────────────────────────────────────────
    //
    // Callers below already hold the agent lock.

    /// The agent's write lock. Unknown agents fail before an entry is made,
    /// so the lock map only ever holds registered agents.
    fn lock_for(&self, agent_id: &AgentId) -> TierGuardResult<Arc<Mutex<()>>> {
        self.require_state(agent_id)?;
        Ok(self.locks.handle(agent_id))
    }

    fn open_promotion(
        &self,
        state: &AgentLevelState,
        target: Level,
        reason: String,
    ) -> TierGuardResult<LevelTransitionRequest> {
        let now = self.clock.now();
        let request = self.transitions.insert_pending(LevelTransitionRequest {
            id: Uuid::new_v4(),
            agent_id: state.agent_id.clone(),
            from_level: state.current_level,
            to_level: target,
            trigger: TransitionTrigger::Promotion,
            reason,
            metrics_snapshot: state.metrics.clone(),
            status: TransitionStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
            cooldown_until: None,
            created_at: now,
            updated_at: now,
        })?;

        info!(
            agent_id = %state.agent_id,
            request_id = %request.id,
            from_level = request.from_level.as_u8(),
            to_level = request.to_level.as_u8(),
            "promotion proposed"
        );

        Ok(request)
    }

    fn apply_level(
        &self,
        state: &AgentLevelState,
        to_level: Level,
        trigger: TransitionTrigger,
        reason: String,
        approved_by: Option<String>,
        request_id: Option<Uuid>,
    ) -> TierGuardResult<LevelHistoryEntry> {
        self.levels.set_level(LevelChange {
            agent_id: state.agent_id.clone(),
            to_level,
            trigger,
            reason,
            approved_by,
            request_id,
            expected_updated_at: Some(state.updated_at),
        })
    }

    fn reset_guardrails(&self, state: &AgentLevelState, to_level: Level) -> TierGuardResult<()> {
        if self.settings.reset_guardrails_on_level_change && to_level != state.current_level {
            self.levels
                .set_guardrails(&state.agent_id, AgentGuardrails::tier_default(to_level))?;
        }
        Ok(())
    }

    /// Undo request bookkeeping after a failed level write. Compensation
    /// failures are logged; the caller still gets the original error.
    fn compensate(
        &self,
        agent_id: &AgentId,
        cause: &TierGuardError,
        withdraw: Option<Uuid>,
        reopen: Option<Uuid>,
    ) {
        warn!(
            agent_id = %agent_id,
            error = %cause,
            "level write failed; rolling back request bookkeeping"
        );
        if let Some(id) = withdraw {
            if let Err(e) = self.transitions.withdraw(id) {
                warn!(agent_id = %agent_id, request_id = %id, error = %e, "withdraw failed");
            }
        }
        if let Some(id) = reopen {
            if let Err(e) = self.transitions.reopen(id) {
                warn!(agent_id = %agent_id, request_id = %id, error = %e, "reopen failed");
            }
        }
    }

    /// Reject the agent's pending request without cooldown; returns its id.
    fn supersede_pending(
        &self,
        agent_id: &AgentId,
        actor: &str,
        note: &str,
    ) -> TierGuardResult<Option<Uuid>> {
        let Some(pending) = self.transitions.pending_for(agent_id)? else {
            return Ok(None);
        };
        self.transitions.resolve(
            pending.id,
            TransitionResolution {
                status: TransitionStatus::Rejected,
                reviewed_by: actor.to_string(),
                reviewed_at: self.clock.now(),
                review_note: Some(note.to_string()),
                cooldown_until: None,
            },
        )?;
        info!(agent_id = %agent_id, request_id = %pending.id, note = %note, "pending request superseded");
        Ok(Some(pending.id))
    }

    fn require_state(&self, agent_id: &AgentId) -> TierGuardResult<AgentLevelState> {
        self.levels
            .get(agent_id)?
            .ok_or_else(|| TierGuardError::AgentNotFound { agent_id: agent_id.0.clone() })
    }

    fn require_request(&self, request_id: Uuid) -> TierGuardResult<LevelTransitionRequest> {
        self.transitions
            .get(request_id)?
            .ok_or(TierGuardError::RequestNotFound { request_id })
    }
}

fn ensure_pending(request: &LevelTransitionRequest) -> TierGuardResult<()> {
    if request.status.is_terminal() {
        return Err(TierGuardError::RequestNotPending {
            request_id: request.id,
            status: request.status.to_string(),
        });
    }
    Ok(())
}
