//! Scenario 5: Guarded Actions and a Live Console
//!
//! Agents ask the authorization checkpoint before acting. Every denied or
//! flagged attempt lands in the violation ledger, and a console replica
//! connected to the change feed sees the ledger and level states update.
//! The console also edits guardrails optimistically; an invalid edit is
//! rolled back locally and the store's error is shown.
//!
//! Walk-through for the demo run:
//!   1. Seed `support-operator` (level 3, support domain, escalates) and
//!      `intake-triage` (level 1)
//!   2. Console replica connects (subscribe, then snapshot)
//!   3. Five action checks: allow, deny+escalate, deny domain, review, review
//!   4. Console syncs and shows the ledger
//!   5. Console pushes an invalid guardrail edit → rolled back
//!   6. Console pushes a valid edit → confirmed

use tierguard_contracts::{
    agent::AgentId,
    change::ChangeRecord,
    error::{TierGuardError, TierGuardResult},
    evaluation::{ActionRequest, GuardrailDecision},
};

use crate::{
    fleet::Fleet,
    mock_data::{intake_triage, support_operator},
};

/// An action attempt with no load on the agent.
pub fn action(name: &str, domain: Option<&str>, confidence: f64) -> ActionRequest {
    ActionRequest {
        action: name.to_string(),
        domain: domain.map(str::to_string),
        confidence,
        active_missions: 0,
        tasks_today: 0,
    }
}

fn describe(decision: &GuardrailDecision) -> String {
    match decision {
        GuardrailDecision::Allow => "ALLOW".to_string(),
        GuardrailDecision::RequireReview { guardrail, .. } => format!("REVIEW ({})", guardrail),
        GuardrailDecision::Deny { guardrail, severity, .. } => {
            format!("DENY ({}, {})", guardrail, severity)
        }
    }
}

/// Push a guardrail edit from the console through the authority.
fn confirm_guardrails(fleet: &Fleet, record: &ChangeRecord) -> TierGuardResult<ChangeRecord> {
    match record {
        ChangeRecord::LevelState(state) => fleet
            .authority
            .update_guardrails(&state.agent_id, state.guardrails.clone())
            .map(ChangeRecord::LevelState),
        other => Err(TierGuardError::InvalidTransition {
            reason: format!("console cannot edit {:?} records", other.collection()),
        }),
    }
}

pub fn run_scenario() -> TierGuardResult<()> {
    println!("=== Scenario 5: Guarded Actions and a Live Console ===");
    println!();

    let fleet = Fleet::with_default_policy()?;
    let support = support_operator();
    let intake = intake_triage();
    fleet.seed(&support)?;
    fleet.seed(&intake)?;

    let mut console = fleet.replica()?;
    println!("  Console connected:      subscription {}", console.subscription_id());
    println!();

    // ── Authorization checkpoint ─────────────────────────────────────────────

    let attempts = [
        (support.id, action("send", Some("support"), 0.92)),
        (support.id, action("delete_record", Some("support"), 0.99)),
        (support.id, action("send", Some("billing"), 0.92)),
        (support.id, action("update_record", Some("support"), 0.40)),
        (intake.id, action("read", None, 0.99)),
    ];
    for (agent, request) in &attempts {
        let decision = fleet.authority.authorize(&AgentId::new(*agent), request)?;
        println!("  {:<17} {:<14} → {}", agent, request.action, describe(&decision));
    }

    // ── Console catches up ───────────────────────────────────────────────────

    let applied = console.sync();
    let ledger = console.cache().violations_for(support.id);
    println!();
    println!("  Console sync:           {} change(s) applied", applied);
    println!("  Ledger for {}:", support.id);
    for v in ledger {
        println!(
            "    - {:<14} {:<24} {:<8} {:?}",
            v.action_attempted, v.guardrail_violated, v.severity, v.resolution
        );
    }

    // ── Optimistic guardrail edits ───────────────────────────────────────────

    let current = fleet.state(support.id)?;
    let mut invalid = current.clone();
    invalid.guardrails.auto_review_threshold = 1.7;
    match console.optimistic(ChangeRecord::LevelState(invalid), |r| confirm_guardrails(&fleet, r)) {
        Err(e) => println!("  Invalid edit:           rolled back ({})", e),
        Ok(_) => println!("  Invalid edit:           UNEXPECTEDLY ACCEPTED"),
    }

    let mut valid = current;
    valid.guardrails.auto_review_threshold = 0.6;
    console.optimistic(ChangeRecord::LevelState(valid), |r| confirm_guardrails(&fleet, r))?;
    let threshold = console
        .cache()
        .level_state(support.id)
        .map(|s| s.guardrails.auto_review_threshold)
        .unwrap_or_default();
    println!("  Valid edit:             confirmed (threshold now {:.2})", threshold);

    println!();
    println!(
        "  Audit chain integrity:  {}",
        if fleet.audit_intact() { "VERIFIED" } else { "FAILED" }
    );
    println!();
    println!("  Scenario 5 complete.");
    println!();

    Ok(())
}
