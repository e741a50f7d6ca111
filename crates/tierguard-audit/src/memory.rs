//! In-memory, hash-chained implementations of `HistoryWriter` and
//! `ViolationLedger`.
//!
//! Both keep their chain behind a `Mutex` so they can be shared across
//! threads with `Arc`. Neither exposes an update or delete path.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use tierguard_contracts::{
    agent::AgentId,
    change::{ChangeEvent, ChangeRecord},
    error::{TierGuardError, TierGuardResult},
    time::advance_stamp,
    transition::LevelHistoryEntry,
    violation::{GuardrailViolation, NewViolation, ViolationQuery},
};
use tierguard_core::traits::{ChangeSink, Clock, HistoryWriter, ViolationLedger};

use crate::{chain::HashChain, event::AuditLog};

pub const HISTORY_STREAM: &str = "level-history";
pub const VIOLATION_STREAM: &str = "guardrail-violations";

fn lock<'a, T>(chain: &'a Mutex<HashChain<T>>, stream: &str) -> TierGuardResult<MutexGuard<'a, HashChain<T>>> {
    chain.lock().map_err(|e| TierGuardError::StoreWriteFailed {
        reason: format!("{} lock poisoned: {}", stream, e),
    })
}

fn export<T: serde::Serialize + Clone>(chain: &HashChain<T>, stream: &str) -> AuditLog<T> {
    AuditLog {
        stream: stream.to_string(),
        entries: chain.entries().to_vec(),
        exported_at: Utc::now(),
        terminal_hash: chain.entries().last().map(|e| e.this_hash.clone()).unwrap_or_default(),
    }
}

// ── Level history ─────────────────────────────────────────────────────────────

/// Append-only level history backed by a SHA-256 hash chain.
pub struct InMemoryHistoryLog {
    pub(crate) chain: Mutex<HashChain<LevelHistoryEntry>>,
}

impl Default for InMemoryHistoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryHistoryLog {
    /// Create an empty history log with a fresh chain.
    pub fn new() -> Self {
        Self { chain: Mutex::new(HashChain::new(HISTORY_STREAM)) }
    }

    /// Number of entries across all agents.
    pub fn len(&self) -> usize {
        self.chain.lock().map(|c| c.entries().len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if no entry has been altered in memory. A poisoned lock counts
    /// as a failed check.
    pub fn verify_integrity(&self) -> bool {
        self.chain.lock().map(|c| c.verify()).unwrap_or(false)
    }

    /// Export the entire chain as a sealed `AuditLog`.
    ///
    /// Does not clear the chain; further appends continue from the same tail.
    pub fn export_log(&self) -> TierGuardResult<AuditLog<LevelHistoryEntry>> {
        let chain = lock(&self.chain, HISTORY_STREAM)?;
        Ok(export(&chain, HISTORY_STREAM))
    }
}

impl HistoryWriter for InMemoryHistoryLog {
    fn append(&self, entry: &LevelHistoryEntry) -> TierGuardResult<()> {
        let mut chain = lock(&self.chain, HISTORY_STREAM)?;
        let chained = chain.append(entry.clone())?;
        debug!(
            agent_id = %entry.agent_id,
            sequence = chained.sequence,
            trigger = %entry.trigger,
            "level history appended"
        );
        Ok(())
    }

    fn entries_for(&self, agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>> {
        let chain = lock(&self.chain, HISTORY_STREAM)?;
        Ok(chain.records().rev().filter(|e| e.agent_id == *agent_id).cloned().collect())
    }
}

// ── Violation ledger ──────────────────────────────────────────────────────────

/// Append-only guardrail violation ledger backed by a SHA-256 hash chain.
///
/// `created_at` is strictly increasing in append order, so newest-first by
/// time and newest-first by sequence agree.
pub struct InMemoryViolationLedger {
    pub(crate) chain: Mutex<HashChain<GuardrailViolation>>,
    clock: Arc<dyn Clock>,
    sink: Option<Arc<dyn ChangeSink>>,
}

impl InMemoryViolationLedger {
    /// Create an empty ledger. `clock` stamps each violation's `created_at`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { chain: Mutex::new(HashChain::new(VIOLATION_STREAM)), clock, sink: None }
    }

    /// Publish every logged violation as an insert event.
    pub fn with_change_sink(mut self, sink: Arc<dyn ChangeSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// True if no logged violation has been altered in memory.
    pub fn verify_integrity(&self) -> bool {
        self.chain.lock().map(|c| c.verify()).unwrap_or(false)
    }

    /// Export the ledger as a sealed `AuditLog`, oldest violation first.
    pub fn export_log(&self) -> TierGuardResult<AuditLog<GuardrailViolation>> {
        let chain = lock(&self.chain, VIOLATION_STREAM)?;
        Ok(export(&chain, VIOLATION_STREAM))
    }
}

impl ViolationLedger for InMemoryViolationLedger {
    fn log(&self, violation: NewViolation) -> TierGuardResult<GuardrailViolation> {
        let mut chain = lock(&self.chain, VIOLATION_STREAM)?;

        let now = self.clock.now();
        let created_at = match chain.records().next_back() {
            Some(last) => advance_stamp(last.created_at, now),
            None => now,
        };

        let record = GuardrailViolation {
            id: Uuid::new_v4(),
            agent_id: violation.agent_id,
            action_attempted: violation.action_attempted,
            guardrail_violated: violation.guardrail_violated,
            severity: violation.severity,
            resolution: violation.resolution,
            context: violation.context,
            created_at,
        };
        chain.append(record.clone())?;

        info!(
            agent_id = %record.agent_id,
            action = %record.action_attempted,
            guardrail = %record.guardrail_violated,
            severity = %record.severity,
            "guardrail violation logged"
        );

        if let Some(sink) = &self.sink {
            sink.publish(ChangeEvent::insert(ChangeRecord::Violation(record.clone())));
        }

        Ok(record)
    }

    fn list(&self, query: &ViolationQuery) -> TierGuardResult<Vec<GuardrailViolation>> {
        let chain = lock(&self.chain, VIOLATION_STREAM)?;
        Ok(chain
            .records()
            .rev()
            .filter(|v| query.matches(v))
            .skip(query.offset)
            .take(query.limit)
            .cloned()
            .collect())
    }
}
