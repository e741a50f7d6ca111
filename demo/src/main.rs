//! TierGuard Reference Fleet: Demo CLI
//!
//! Runs one or all of the five fleet scenarios. Each scenario wires the real
//! TierGuard components (level store, transition workflow, TOML evaluator,
//! hash-chained ledgers, change feed) around fictional agents.
//!
//! Usage:
//!   cargo run -p demo -- run-all
//!   cargo run -p demo -- promotion-review
//!   cargo run -p demo -- rejection-cooldown
//!   cargo run -p demo -- demotion
//!   cargo run -p demo -- manual-override
//!   cargo run -p demo -- guarded-actions
//!   cargo run -p demo -- check-policy crates/tierguard-policy/policies/default.toml

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use tierguard_contracts::error::TierGuardResult;
use tierguard_policy::TomlLevelEvaluator;
use tierguard_ref_fleet::scenarios::{
    demotion, guarded_actions, manual_override, promotion_review, rejection_cooldown,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// TierGuard: authority levels and guardrails for autonomous agents.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "TierGuard reference fleet demo",
    long_about = "Runs TierGuard fleet scenarios showing promotion review, cooldowns,\n\
                  automatic demotion, manual overrides, guarded actions, and\n\
                  audit chain integrity."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run all five fleet scenarios in sequence.
    RunAll,
    /// Scenario 1: Promotion Review (propose, approve, apply).
    PromotionReview,
    /// Scenario 2: Rejection and Cooldown.
    RejectionCooldown,
    /// Scenario 3: Automatic Demotion across the fleet.
    Demotion,
    /// Scenario 4: Manual Override by an operator.
    ManualOverride,
    /// Scenario 5: Guarded Actions with a live console replica.
    GuardedActions,
    /// Load a level policy file and print what it configures.
    CheckPolicy {
        /// Path to a TOML level policy.
        path: PathBuf,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    // Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::RunAll => run_all(),
        Command::PromotionReview => promotion_review::run_scenario(),
        Command::RejectionCooldown => rejection_cooldown::run_scenario(),
        Command::Demotion => demotion::run_scenario(),
        Command::ManualOverride => manual_override::run_scenario(),
        Command::GuardedActions => guarded_actions::run_scenario(),
        Command::CheckPolicy { path } => check_policy(&path),
    };

    match result {
        Ok(()) => {
            println!("All selected commands completed successfully.");
        }
        Err(e) => {
            eprintln!("Demo error: {}", e);
            std::process::exit(1);
        }
    }
}

// ── Scenario dispatch ─────────────────────────────────────────────────────────

fn run_all() -> TierGuardResult<()> {
    promotion_review::run_scenario()?;
    rejection_cooldown::run_scenario()?;
    demotion::run_scenario()?;
    manual_override::run_scenario()?;
    guarded_actions::run_scenario()?;
    Ok(())
}

fn check_policy(path: &Path) -> TierGuardResult<()> {
    let evaluator = TomlLevelEvaluator::from_file(path)?;
    let config = evaluator.config();
    info!(path = %path.display(), tiers = config.promotion.len(), "level policy loaded");

    println!("Policy {}", path.display());
    println!(
        "  Demotion:  critical violation in 7 days, or consecutive failures > {}",
        config.demotion.max_consecutive_failures
    );
    println!(
        "  Workflow:  cooldown {} day(s), reset guardrails on level change: {}",
        config.workflow.cooldown_days, config.workflow.reset_guardrails_on_level_change
    );
    let mut tiers: Vec<_> = config.promotion.iter().collect();
    tiers.sort_by_key(|c| c.from_level);
    for c in tiers {
        println!(
            "  L{} → L{}:   tasks >= {}, score >= {:.2}, days in level >= {}, warnings <= {}",
            c.from_level,
            c.from_level + 1,
            c.min_tasks_completed,
            c.min_avg_review_score,
            c.min_time_in_level_days,
            c.max_warning_violations_30d
        );
    }
    println!();
    Ok(())
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("TierGuard: Agent Authority Levels");
    println!("Reference Fleet Demo");
    println!("=================================");
    println!();
    println!("Level lifecycle per agent:");
    println!("  [1] Metrics pipeline refreshes the agent's rolling snapshot");
    println!("  [2] Evaluation cycle: demotion check first, applied at once");
    println!("  [3] Otherwise, if eligible and out of cooldown, a promotion is proposed");
    println!("  [4] A reviewer approves (level applied) or rejects (cooldown starts)");
    println!("  [5] Every level change is appended to the SHA-256 history chain");
    println!();
}
