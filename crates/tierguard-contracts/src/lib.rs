//! # tierguard-contracts
//!
//! Shared types, schemas, and contracts for the TierGuard level engine.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, validation, and error types.

pub mod agent;
pub mod change;
pub mod error;
pub mod evaluation;
pub mod guardrails;
pub mod level;
pub mod metrics;
pub mod state;
pub mod time;
pub mod transition;
pub mod violation;
