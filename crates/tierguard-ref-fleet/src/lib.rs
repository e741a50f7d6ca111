//! # tierguard-ref-fleet
//!
//! Reference agent fleet for the TierGuard authority level engine.
//!
//! Wires every in-memory component (level store, transition store, hash
//! chained history and violation ledger, change feed, TOML policy) behind a
//! manual clock and runs five scenarios against six fixture agents:
//!
//! 1. **Promotion Review**: an eligible agent is proposed and a reviewer
//!    approves the move.
//! 2. **Rejection and Cooldown**: a rejection blocks re-proposal until the
//!    cooldown runs out.
//! 3. **Automatic Demotion**: critical violations and failure streaks drop
//!    agents a level without review.
//! 4. **Manual Override**: an operator sets a level directly.
//! 5. **Guarded Actions**: the authorization checkpoint fills the violation
//!    ledger while a console replica follows along.
//!
//! All agents and metrics are fictional.

pub mod fleet;
pub mod mock_data;
pub mod scenarios;

pub use fleet::{epoch, Fleet, BOOTSTRAP_ACTOR};
