//! # tierguard-sync
//!
//! Keeps observing consoles in step with the engine.
//!
//! - `ChangeFeed`: the `ChangeSink` the stores publish to; fans every event
//!   out to all subscribers in publish order
//! - `LocalCache`: last-write-wins merge on `updated_at`, with tombstones
//! - `Replica`: subscribe-then-snapshot bootstrap, `sync`, and optimistic
//!   writes that roll back when the durable write fails
//!
//! ```rust,ignore
//! let feed = Arc::new(ChangeFeed::new());
//! let mut replica = Replica::connect(&feed, || authority.snapshot())?;
//! replica.sync();
//! ```

pub mod cache;
pub mod feed;
pub mod replica;

pub use cache::{CacheEntry, LocalCache};
pub use feed::{ChangeFeed, Subscription};
pub use replica::Replica;

// ── Tests ─────────────────────────────────────────────────────────────────────
