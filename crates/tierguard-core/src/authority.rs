//! `LevelAuthority`: the surface the console, the reviewer UI, and the
//! authorization checkpoint talk to.
//!
//! It owns the workflow and the three stores and adds the queries and
//! commands that do not go through the state machine: registration,
//! guardrail and metrics updates, violation logging, and action checks.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tierguard_contracts::{
    agent::AgentId,
    change::ChangeRecord,
    error::{TierGuardError, TierGuardResult},
    evaluation::{ActionRequest, GuardrailDecision},
    guardrails::AgentGuardrails,
    level::{Level, TransitionTrigger},
    metrics::LevelMetricsSnapshot,
    state::AgentLevelState,
    transition::{LevelHistoryEntry, LevelTransitionRequest, TransitionFilter},
    violation::{
        GuardrailViolation, NewViolation, ViolationQuery, ViolationResolution, ViolationSeverity,
    },
};

use crate::{
    traits::{ActionGate, Clock, LevelStore, TransitionEvaluator, TransitionStore, ViolationLedger},
    workflow::{AppliedTransition, EvaluationOutcome, TransitionWorkflow, WorkflowSettings},
};

pub struct LevelAuthority {
    workflow: TransitionWorkflow,
    levels: Arc<dyn LevelStore>,
    transitions: Arc<dyn TransitionStore>,
    ledger: Arc<dyn ViolationLedger>,
    gate: Option<Box<dyn ActionGate>>,
}

impl LevelAuthority {
    pub fn new(
        levels: Arc<dyn LevelStore>,
        transitions: Arc<dyn TransitionStore>,
        ledger: Arc<dyn ViolationLedger>,
        evaluator: Box<dyn TransitionEvaluator>,
        clock: Arc<dyn Clock>,
        settings: WorkflowSettings,
    ) -> Self {
        let workflow = TransitionWorkflow::new(
            Arc::clone(&levels),
            Arc::clone(&transitions),
            evaluator,
            clock,
            settings,
        );
        Self { workflow, levels, transitions, ledger, gate: None }
    }

    /// Install the guardrail check used by `authorize`.
    pub fn with_gate(mut self, gate: Box<dyn ActionGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn workflow(&self) -> &TransitionWorkflow {
        &self.workflow
    }

    // ── Queries ──────────────────────────────────────────────────────────────

    pub fn get_state(&self, agent_id: &AgentId) -> TierGuardResult<Option<AgentLevelState>> {
        self.levels.get(agent_id)
    }

    pub fn list_states(&self) -> TierGuardResult<Vec<AgentLevelState>> {
        self.levels.list()
    }

    pub fn list_transitions(
        &self,
        filter: &TransitionFilter,
    ) -> TierGuardResult<Vec<LevelTransitionRequest>> {
        self.transitions.list(filter)
    }

    pub fn list_violations(&self, query: &ViolationQuery) -> TierGuardResult<Vec<GuardrailViolation>> {
        self.ledger.list(query)
    }

    /// Level-change history for one agent, newest first.
    pub fn history(&self, agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>> {
        self.levels.history(agent_id)
    }

    /// Every replicated record, for bootstrapping a replica.
    pub fn snapshot(&self) -> TierGuardResult<Vec<ChangeRecord>> {
        let mut records: Vec<ChangeRecord> =
            self.levels.list()?.into_iter().map(ChangeRecord::LevelState).collect();
        records.extend(
            self.transitions
                .list(&TransitionFilter::default())?
                .into_iter()
                .map(ChangeRecord::Transition),
        );
        let all = ViolationQuery { limit: usize::MAX, ..ViolationQuery::default() };
        records.extend(self.ledger.list(&all)?.into_iter().map(ChangeRecord::Violation));
        Ok(records)
    }

    // ── Commands ─────────────────────────────────────────────────────────────

    /// Register an agent at level 1. Without explicit guardrails the level-1
    /// tier defaults are used. Registering twice returns the existing state.
    pub fn register_agent(
        &self,
        agent_id: &AgentId,
        guardrails: Option<AgentGuardrails>,
    ) -> TierGuardResult<AgentLevelState> {
        let guardrails =
            guardrails.unwrap_or_else(|| AgentGuardrails::tier_default(Level::Observer));
        self.levels.register(agent_id, guardrails, LevelMetricsSnapshot::default())
    }

    pub fn request_promotion(&self, agent_id: &AgentId) -> TierGuardResult<LevelTransitionRequest> {
        self.workflow.request_promotion(agent_id)
    }

    pub fn approve_transition(
        &self,
        request_id: Uuid,
        reviewer: &str,
    ) -> TierGuardResult<AppliedTransition> {
        self.workflow.approve(request_id, reviewer)
    }

    pub fn reject_transition(
        &self,
        request_id: Uuid,
        reviewer: &str,
        reason: Option<&str>,
    ) -> TierGuardResult<LevelTransitionRequest> {
        self.workflow.reject(request_id, reviewer, reason)
    }

    pub fn set_agent_level(
        &self,
        agent_id: &AgentId,
        level: u8,
        trigger: TransitionTrigger,
        reason: &str,
        actor: &str,
    ) -> TierGuardResult<AppliedTransition> {
        self.workflow.set_agent_level(agent_id, level, trigger, reason, actor)
    }

    pub fn update_guardrails(
        &self,
        agent_id: &AgentId,
        guardrails: AgentGuardrails,
    ) -> TierGuardResult<AgentLevelState> {
        let state = self.levels.set_guardrails(agent_id, guardrails)?;
        info!(agent_id = %agent_id, "guardrails updated");
        Ok(state)
    }

    /// Store a fresh snapshot from the metrics pipeline.
    pub fn update_metrics(
        &self,
        agent_id: &AgentId,
        metrics: LevelMetricsSnapshot,
    ) -> TierGuardResult<AgentLevelState> {
        self.levels.set_metrics(agent_id, metrics)
    }

    pub fn log_violation(&self, violation: NewViolation) -> TierGuardResult<GuardrailViolation> {
        self.ledger.log(violation)
    }

    pub fn run_evaluation_cycle(&self, agent_id: &AgentId) -> TierGuardResult<EvaluationOutcome> {
        self.workflow.run_evaluation_cycle(agent_id)
    }

    pub fn evaluate_fleet(
        &self,
    ) -> TierGuardResult<Vec<(AgentId, TierGuardResult<EvaluationOutcome>)>> {
        self.workflow.evaluate_fleet()
    }

    /// Check an action against the agent's current guardrails.
    ///
    /// Denied actions are logged as `auto_denied`, or `escalated` when the
    /// guardrails name an escalation agent. Actions that need review are
    /// logged as `info` / `flagged_for_review`.
    pub fn authorize(
        &self,
        agent_id: &AgentId,
        request: &ActionRequest,
    ) -> TierGuardResult<GuardrailDecision> {
        let gate = self.gate.as_ref().ok_or_else(|| TierGuardError::ConfigError {
            reason: "no action gate installed".to_string(),
        })?;
        let state = self
            .levels
            .get(agent_id)?
            .ok_or_else(|| TierGuardError::AgentNotFound { agent_id: agent_id.0.clone() })?;

        let decision = gate.check(&state.guardrails, request);
        let context = json!({
            "level": state.current_level.as_u8(),
            "domain": request.domain,
            "confidence": request.confidence,
            "active_missions": request.active_missions,
            "tasks_today": request.tasks_today,
        });

        match &decision {
            GuardrailDecision::Allow => {
                debug!(agent_id = %agent_id, action = %request.action, "action allowed");
            }
            GuardrailDecision::RequireReview { guardrail, reason } => {
                info!(agent_id = %agent_id, action = %request.action, reason = %reason, "action flagged for review");
                self.ledger.log(NewViolation {
                    agent_id: agent_id.clone(),
                    action_attempted: request.action.clone(),
                    guardrail_violated: guardrail.clone(),
                    severity: ViolationSeverity::Info,
                    resolution: ViolationResolution::FlaggedForReview,
                    context,
                })?;
            }
            GuardrailDecision::Deny { guardrail, reason, severity } => {
                let resolution = match &state.guardrails.escalation_agent_id {
                    Some(_) => ViolationResolution::Escalated,
                    None => ViolationResolution::AutoDenied,
                };
                warn!(
                    agent_id = %agent_id,
                    action = %request.action,
                    guardrail = %guardrail,
                    severity = %severity,
                    reason = %reason,
                    "action denied by guardrail"
                );
                let mut context = context;
                if let Some(escalation) = &state.guardrails.escalation_agent_id {
                    context["escalated_to"] = json!(escalation.0);
                }
                self.ledger.log(NewViolation {
                    agent_id: agent_id.clone(),
                    action_attempted: request.action.clone(),
                    guardrail_violated: guardrail.clone(),
                    severity: *severity,
                    resolution,
                    context,
                })?;
            }
        }

        Ok(decision)
    }
}
