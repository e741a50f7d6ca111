//! Simulated agent fleet for the TierGuard reference runtime.
//!
//! All agents and figures in this module are fictional. The metrics stand in
//! for what the upstream metrics pipeline would report for each agent.

use tierguard_contracts::{
    agent::AgentId, guardrails::AgentGuardrails, level::Level, metrics::LevelMetricsSnapshot,
};

/// A fixture agent: where it sits and how it has been performing.
#[derive(Debug, Clone)]
pub struct FleetAgent {
    pub id: &'static str,
    pub level: Level,
    /// `None` means the level-1 tier defaults at registration.
    pub guardrails: Option<AgentGuardrails>,
    pub metrics: LevelMetricsSnapshot,
}

/// Shorthand for a snapshot with no failures or critical violations.
pub fn metrics(tasks: u32, score: f64, days: u32, violations_30d: u32) -> LevelMetricsSnapshot {
    LevelMetricsSnapshot {
        tasks_completed: tasks,
        avg_review_score: score,
        violations_30d,
        critical_violations_7d: 0,
        consecutive_failures: 0,
        time_in_level_days: days,
    }
}

// ── Named fixtures ───────────────────────────────────────────────────────────

/// Level 1 intake agent that clears every level-1 promotion criterion.
pub fn intake_triage() -> FleetAgent {
    FleetAgent {
        id: "intake-triage",
        level: Level::Observer,
        guardrails: None,
        metrics: metrics(12, 0.91, 10, 0),
    }
}

/// Level 1 agent that is a few tasks short of promotion.
pub fn invoice_reader() -> FleetAgent {
    FleetAgent {
        id: "invoice-reader",
        level: Level::Observer,
        guardrails: None,
        metrics: metrics(6, 0.95, 14, 0),
    }
}

/// Level 3 agent with a critical violation in the last week.
pub fn billing_operator() -> FleetAgent {
    FleetAgent {
        id: "billing-operator",
        level: Level::Operator,
        guardrails: Some(AgentGuardrails::tier_default(Level::Operator)),
        metrics: LevelMetricsSnapshot {
            critical_violations_7d: 1,
            ..metrics(240, 0.93, 45, 1)
        },
    }
}

/// Level 2 agent with a run of failed tasks.
pub fn outreach_drafter() -> FleetAgent {
    FleetAgent {
        id: "outreach-drafter",
        level: Level::Assistant,
        guardrails: Some(AgentGuardrails::tier_default(Level::Assistant)),
        metrics: LevelMetricsSnapshot {
            consecutive_failures: 4,
            ..metrics(70, 0.88, 20, 2)
        },
    }
}

/// Level 3 agent restricted to the support domain, escalating to a supervisor.
pub fn support_operator() -> FleetAgent {
    let mut guardrails = AgentGuardrails::tier_default(Level::Operator);
    guardrails.allowed_domains.insert("support".to_string());
    guardrails.escalation_agent_id = Some(AgentId::new("support-supervisor"));

    FleetAgent {
        id: "support-operator",
        level: Level::Operator,
        guardrails: Some(guardrails),
        metrics: metrics(150, 0.96, 60, 0),
    }
}

/// Level 4 agent that has nowhere further to go.
pub fn workflow_runner() -> FleetAgent {
    FleetAgent {
        id: "workflow-runner",
        level: Level::Autonomous,
        guardrails: Some(AgentGuardrails::tier_default(Level::Autonomous)),
        metrics: metrics(900, 0.98, 200, 0),
    }
}

/// Every fixture agent.
pub fn fleet() -> Vec<FleetAgent> {
    vec![
        intake_triage(),
        invoice_reader(),
        billing_operator(),
        outreach_drafter(),
        support_operator(),
        workflow_runner(),
    ]
}
