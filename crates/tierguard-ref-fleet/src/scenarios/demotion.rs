//! Scenario 3: Automatic Demotion
//!
//! Demotions are protective, so they skip review and take effect in the same
//! evaluation cycle that detects them. One fleet-wide pass handles every
//! agent independently.
//!
//! Walk-through for the demo run:
//!   1. Seed the whole reference fleet
//!   2. `evaluate_fleet` runs one cycle per agent
//!   3. `billing-operator` (critical violation) drops 3 → 2
//!   4. `outreach-drafter` (4 consecutive failures) drops 2 → 1
//!   5. No demotion opens a pending request

use tierguard_contracts::{error::TierGuardResult, transition::TransitionFilter};
use tierguard_core::EvaluationOutcome;

use crate::{fleet::Fleet, mock_data::fleet};

pub fn run_scenario() -> TierGuardResult<()> {
    println!("=== Scenario 3: Automatic Demotion ===");
    println!();

    let reference = Fleet::with_default_policy()?;
    reference.seed_all(&fleet())?;

    for (agent_id, outcome) in reference.authority.evaluate_fleet()? {
        let line = match outcome {
            Ok(EvaluationOutcome::Demoted { history }) => format!(
                "DEMOTED {} → {} ({})",
                history.from_level, history.to_level, history.reason
            ),
            Ok(EvaluationOutcome::PromotionProposed { request }) => {
                format!("promotion proposed {} → {}", request.from_level, request.to_level)
            }
            Ok(EvaluationOutcome::Unchanged { reason }) => format!("unchanged ({})", reason),
            Err(e) => format!("ERROR {}", e),
        };
        println!("  {:<18} {}", agent_id.as_str(), line);
    }

    let pending = reference.authority.list_transitions(&TransitionFilter::pending())?;
    println!();
    println!("  Pending requests after the pass: {}", pending.len());
    println!(
        "  Audit chain integrity:  {}",
        if reference.audit_intact() { "VERIFIED" } else { "FAILED" }
    );
    println!();
    println!("  Scenario 3 complete.");
    println!();

    Ok(())
}
