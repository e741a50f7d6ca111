//! Scenario 2: Rejection and Cooldown
//!
//! A reviewer turns down a promotion. The rejection starts a cooldown during
//! which the agent cannot be re-proposed, however good its metrics are. Once
//! the cooldown runs out the evaluation cycle proposes it again.
//!
//! Walk-through for the demo run:
//!   1. Seed `intake-triage`, open a promotion request
//!   2. Reviewer rejects with "not yet" → cooldown_until = now + 7 days
//!   3. Re-proposal → CooldownActive; evaluation cycle → Unchanged
//!   4. Clock advances past the cooldown → evaluation cycle proposes again

use chrono::Duration;

use tierguard_contracts::{
    agent::AgentId,
    error::{TierGuardError, TierGuardResult},
};
use tierguard_core::{traits::Clock, EvaluationOutcome};

use crate::{fleet::Fleet, mock_data::intake_triage};

pub const REVIEWER: &str = "lead-reviewer@ops";
pub const REJECTION_NOTE: &str = "not yet";

pub fn run_scenario() -> TierGuardResult<()> {
    println!("=== Scenario 2: Rejection and Cooldown ===");
    println!();

    let fleet = Fleet::with_default_policy()?;
    let agent = intake_triage();
    let agent_id = AgentId::new(agent.id);
    fleet.seed(&agent)?;

    let request = fleet.authority.request_promotion(&agent_id)?;
    println!(
        "  Promotion proposed:     {} ({} → {})",
        request.id, request.from_level, request.to_level
    );

    // ── Reviewer rejects ─────────────────────────────────────────────────────

    let rejected = fleet.authority.reject_transition(request.id, REVIEWER, Some(REJECTION_NOTE))?;
    let until = rejected.cooldown_until.ok_or_else(|| TierGuardError::InvalidTransition {
        reason: "rejection carried no cooldown".to_string(),
    })?;
    println!(
        "  Reviewer decision:      {} by {} (\"{}\")",
        rejected.status,
        REVIEWER,
        rejected.review_note.as_deref().unwrap_or("")
    );
    println!("  Cooldown until:         {}", until);

    // ── Re-proposal is blocked ───────────────────────────────────────────────

    match fleet.authority.request_promotion(&agent_id) {
        Err(e @ TierGuardError::CooldownActive { .. }) => {
            println!("  Re-proposal:            refused ({})", e);
        }
        Ok(r) => println!("  Re-proposal:            UNEXPECTEDLY OPENED {}", r.id),
        Err(e) => return Err(e),
    }
    if let EvaluationOutcome::Unchanged { reason } = fleet.authority.run_evaluation_cycle(&agent_id)? {
        println!("  Evaluation cycle:       unchanged ({})", reason);
    }

    // ── Cooldown expires ─────────────────────────────────────────────────────

    fleet.clock.set(until + Duration::seconds(1));
    println!();
    println!("  Clock advanced to:      {}", fleet.clock.now());
    match fleet.authority.run_evaluation_cycle(&agent_id)? {
        EvaluationOutcome::PromotionProposed { request } => {
            println!("  Evaluation cycle:       promotion proposed again ({})", request.id);
        }
        other => println!("  Evaluation cycle:       {:?}", other),
    }

    println!();
    println!("  Scenario 2 complete.");
    println!();

    Ok(())
}
