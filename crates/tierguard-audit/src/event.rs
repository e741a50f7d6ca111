//! Chain entry and exported log types.
//!
//! `ChainedEntry` is one link in a hash chain: a record wrapped with its
//! sequence number and the SHA-256 hashes that make tampering detectable.
//! `AuditLog` is the sealed copy of a whole chain handed to auditors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single record wrapped with its position and hashes.
///
/// Each entry commits to the previous one via `prev_hash`, forming an
/// append-only chain. Modifying any field, including those of `record`,
/// invalidates `this_hash` and every later `prev_hash`, which
/// `verify_chain` detects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainedEntry<T> {
    /// Monotonically increasing position in the chain, starting at 0.
    pub sequence: u64,

    /// Name of the chain ("level-history", "guardrail-violations").
    ///
    /// Part of the hashed content, so an entry cannot be moved between
    /// chains without detection.
    pub stream: String,

    /// The record as it was appended. Never modified afterwards.
    pub record: T,

    /// SHA-256 hash (hex) of the previous entry, or `GENESIS_HASH` for the
    /// first entry.
    pub prev_hash: String,

    /// SHA-256 hash (hex) of this entry's canonical content.
    ///
    /// Computed by `hash_entry()` over (stream, sequence, prev_hash,
    /// canonical JSON of record).
    pub this_hash: String,
}

impl<T> ChainedEntry<T> {
    /// The sentinel `prev_hash` used for the first entry in every chain.
    ///
    /// 64 hex zeros, a value no real SHA-256 digest will produce, so genesis
    /// detection is unambiguous.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// A sealed copy of a chain for auditors.
///
/// The `terminal_hash` is the `this_hash` of the last entry and serves as a
/// compact commitment to the entire log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLog<T> {
    /// The chain these entries were exported from.
    pub stream: String,

    /// All entries in chain order (sequence 0 first).
    pub entries: Vec<ChainedEntry<T>>,

    /// Wall-clock time (UTC) the log was exported.
    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last entry. Empty string if the chain is empty.
    pub terminal_hash: String,
}
