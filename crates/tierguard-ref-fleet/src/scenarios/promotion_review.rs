//! Scenario 1: Promotion Review
//!
//! A level-1 intake agent has been doing well. The evaluation cycle proposes
//! a promotion, a second proposal is refused while the first is open, and a
//! reviewer approves it.
//!
//! Walk-through for the demo run:
//!   1. Seed `intake-triage` at level 1 with 12 tasks, 0.91 score, 10 days
//!   2. Evaluation cycle → pending request 1 → 2
//!   3. Second proposal → DuplicatePendingRequest
//!   4. Reviewer approves → level 2, one history entry (trigger promotion)
//!   5. Both audit chains verified

use tierguard_contracts::{
    agent::AgentId,
    error::{TierGuardError, TierGuardResult},
};
use tierguard_core::EvaluationOutcome;

use crate::{fleet::Fleet, mock_data::intake_triage};

pub const REVIEWER: &str = "lead-reviewer@ops";

pub fn run_scenario() -> TierGuardResult<()> {
    println!("=== Scenario 1: Promotion Review ===");
    println!();

    let fleet = Fleet::with_default_policy()?;
    let agent = intake_triage();
    let agent_id = AgentId::new(agent.id);
    fleet.seed(&agent)?;

    println!("  Agent:    {} at {}", agent_id, fleet.state(agent.id)?.current_level);
    println!(
        "  Metrics:  {} tasks, review score {:.2}, {} days in level, {} violations (30d)",
        agent.metrics.tasks_completed,
        agent.metrics.avg_review_score,
        agent.metrics.time_in_level_days,
        agent.metrics.violations_30d
    );
    println!();

    // ── Evaluation cycle proposes the promotion ──────────────────────────────

    let request = match fleet.authority.run_evaluation_cycle(&agent_id)? {
        EvaluationOutcome::PromotionProposed { request } => request,
        other => {
            return Err(TierGuardError::InvalidTransition {
                reason: format!("expected a promotion proposal, got {:?}", other),
            })
        }
    };
    println!(
        "  Evaluation cycle:       promotion proposed ({} → {})",
        request.from_level, request.to_level
    );
    println!("  Request:                {} [{}]", request.id, request.status);

    // ── A second proposal is refused ─────────────────────────────────────────

    match fleet.authority.request_promotion(&agent_id) {
        Err(e @ TierGuardError::DuplicatePendingRequest { .. }) => {
            println!("  Second proposal:        refused ({})", e);
        }
        Ok(r) => println!("  Second proposal:        UNEXPECTEDLY OPENED {}", r.id),
        Err(e) => return Err(e),
    }

    // ── Reviewer approves ────────────────────────────────────────────────────

    let applied = fleet.authority.approve_transition(request.id, REVIEWER)?;
    println!(
        "  Reviewer decision:      {} by {}",
        applied.request.status, REVIEWER
    );
    println!("  Current level:          {}", fleet.state(agent.id)?.current_level);

    let history = fleet.authority.history(&agent_id)?;
    println!(
        "  History entries:        {} (latest: {} → {}, trigger {})",
        history.len(),
        applied.history.from_level,
        applied.history.to_level,
        applied.history.trigger
    );
    println!();

    println!(
        "  Audit chain integrity:  {}",
        if fleet.audit_intact() { "VERIFIED" } else { "FAILED" }
    );
    println!();
    println!("  Scenario 1 complete.");
    println!();

    Ok(())
}
