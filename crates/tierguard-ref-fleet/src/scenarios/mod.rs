//! Fleet reference scenarios.
//!
//! Each scenario builds its own in-memory `Fleet` from the default policy,
//! seeds fixture agents, and walks one part of the level lifecycle end to
//! end, printing what a reviewer console would show.

pub mod demotion;
pub mod guarded_actions;
pub mod manual_override;
pub mod promotion_review;
pub mod rejection_cooldown;
