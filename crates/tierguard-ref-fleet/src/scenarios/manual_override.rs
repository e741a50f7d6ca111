//! Scenario 4: Manual Override
//!
//! An operator sets an agent's level directly. The override skips both the
//! evaluator and review, closes any open promotion request, and is recorded
//! as an approved request plus a history entry, even when the level does not
//! actually move.
//!
//! Walk-through for the demo run:
//!   1. Seed `intake-triage` and open a promotion request
//!   2. Operator sets level 3 → pending request superseded, level 3
//!   3. Operator sets level 3 again → second history entry (3 → 3)
//!   4. Operator asks for level 5 → InvalidTransition

use tierguard_contracts::{
    agent::AgentId,
    error::{TierGuardError, TierGuardResult},
    level::TransitionTrigger,
    transition::TransitionFilter,
};

use crate::{fleet::Fleet, mock_data::intake_triage};

pub const OPERATOR: &str = "fleet-admin@ops";

pub fn run_scenario() -> TierGuardResult<()> {
    println!("=== Scenario 4: Manual Override ===");
    println!();

    let fleet = Fleet::with_default_policy()?;
    let agent = intake_triage();
    let agent_id = AgentId::new(agent.id);
    fleet.seed(&agent)?;

    let pending = fleet.authority.request_promotion(&agent_id)?;
    println!("  Open request:           {} ({} → {})", pending.id, pending.from_level, pending.to_level);

    for round in 1..=2 {
        let applied = fleet.authority.set_agent_level(
            &agent_id,
            3,
            TransitionTrigger::ManualOverride,
            "staffing the billing queue",
            OPERATOR,
        )?;
        println!(
            "  Override #{}:            {} → {} [{}]",
            round, applied.history.from_level, applied.history.to_level, applied.request.status
        );
    }

    if let Some(closed) = fleet
        .authority
        .list_transitions(&TransitionFilter { agent_id: Some(agent_id.clone()), status: None })?
        .into_iter()
        .find(|r| r.id == pending.id)
    {
        println!(
            "  Open request now:       {} ({})",
            closed.status,
            closed.review_note.as_deref().unwrap_or("")
        );
    }

    match fleet.authority.set_agent_level(
        &agent_id,
        5,
        TransitionTrigger::ManualOverride,
        "typo",
        OPERATOR,
    ) {
        Err(e @ TierGuardError::InvalidTransition { .. }) => {
            println!("  Override to level 5:    refused ({})", e);
        }
        Ok(_) => println!("  Override to level 5:    UNEXPECTEDLY APPLIED"),
        Err(e) => return Err(e),
    }

    let history = fleet.authority.history(&agent_id)?;
    println!();
    println!("  Current level:          {}", fleet.state(agent.id)?.current_level);
    println!("  History entries:        {}", history.len());
    println!(
        "  Audit chain integrity:  {}",
        if fleet.audit_intact() { "VERIFIED" } else { "FAILED" }
    );
    println!();
    println!("  Scenario 4 complete.");
    println!();

    Ok(())
}
