//! Hash-chain primitives: hashing, appending, and integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. stream name as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. canonical JSON of the record (serde_json, no pretty-printing)

use serde::Serialize;
use sha2::{Digest, Sha256};

use tierguard_contracts::error::{TierGuardError, TierGuardResult};

use crate::event::ChainedEntry;

/// SHA-256 over (stream, sequence, prev_hash, record JSON) as lowercase hex.
pub fn hash_entry<T: Serialize>(
    stream: &str,
    sequence: u64,
    record: &T,
    prev_hash: &str,
) -> TierGuardResult<String> {
    let record_json = serde_json::to_vec(record).map_err(|e| TierGuardError::StoreWriteFailed {
        reason: format!("record in stream '{}' is not serializable: {}", stream, e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(stream.as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&record_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify prev-hash linkage and recomputed hashes for every entry.
///
/// An empty chain is valid. Returns `false` at the first mismatch,
/// including a sequence gap.
pub fn verify_chain<T: Serialize>(entries: &[ChainedEntry<T>]) -> bool {
    let mut expected_prev = ChainedEntry::<T>::GENESIS_HASH.to_string();

    for (idx, entry) in entries.iter().enumerate() {
        if entry.sequence != idx as u64 || entry.prev_hash != expected_prev {
            return false;
        }

        match hash_entry(&entry.stream, entry.sequence, &entry.record, &entry.prev_hash) {
            Ok(recomputed) if recomputed == entry.this_hash => {}
            _ => return false,
        }

        expected_prev = entry.this_hash.clone();
    }

    true
}

/// An append-only chain of records for one stream.
///
/// Not synchronized; writers keep it behind a `Mutex`.
#[derive(Debug, Clone)]
pub struct HashChain<T> {
    stream: String,
    pub(crate) entries: Vec<ChainedEntry<T>>,
}

impl<T: Serialize + Clone> HashChain<T> {
    pub fn new(stream: impl Into<String>) -> Self {
        Self { stream: stream.into(), entries: Vec::new() }
    }

    /// Hash and append `record`. On error the chain is unchanged.
    pub fn append(&mut self, record: T) -> TierGuardResult<&ChainedEntry<T>> {
        let sequence = self.entries.len() as u64;
        let prev_hash = self.last_hash().to_string();
        let this_hash = hash_entry(&self.stream, sequence, &record, &prev_hash)?;

        self.entries.push(ChainedEntry {
            sequence,
            stream: self.stream.clone(),
            record,
            prev_hash,
            this_hash,
        });
        // Just pushed, so `last` is always present.
        Ok(&self.entries[self.entries.len() - 1])
    }

    pub fn last_hash(&self) -> &str {
        self.entries
            .last()
            .map(|e| e.this_hash.as_str())
            .unwrap_or(ChainedEntry::<T>::GENESIS_HASH)
    }

    pub fn entries(&self) -> &[ChainedEntry<T>] {
        &self.entries
    }

    /// Records in append order.
    pub fn records(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter().map(|e| &e.record)
    }

    pub fn verify(&self) -> bool {
        verify_chain(&self.entries)
    }
}
