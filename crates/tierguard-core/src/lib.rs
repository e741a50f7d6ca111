//! # tierguard-core
//!
//! The level transition workflow for TierGuard agents.
//!
//! This crate provides:
//! - The trait seams (`LevelStore`, `TransitionStore`, `HistoryWriter`,
//!   `ViolationLedger`, `TransitionEvaluator`, `ActionGate`, `ChangeSink`, `Clock`)
//! - The `TransitionWorkflow` that drives promotion, demotion, and overrides
//! - The `LevelAuthority` facade that collaborators call
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tierguard_core::{LevelAuthority, workflow::WorkflowSettings};
//!
//! let authority = LevelAuthority::new(levels, transitions, ledger, evaluator, clock, settings);
//! let request = authority.request_promotion(&agent_id)?;
//! authority.approve_transition(request.id, "reviewer@ops")?;
//! ```

pub mod authority;
pub mod clock;
pub mod locks;
pub mod traits;
pub mod workflow;

pub use authority::LevelAuthority;
pub use workflow::{AppliedTransition, EvaluationOutcome, TransitionWorkflow, WorkflowSettings};
