//! Last-write-wins local cache of the replicated collections.
//!
//! An incoming record replaces the cached one only if its `updated_at` is
//! strictly newer. Deletes leave a tombstone carrying the delete stamp, so a
//! stale insert that arrives late cannot resurrect the record. Applying the
//! same event twice changes nothing.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use tierguard_contracts::{
    change::{ChangeEvent, ChangeKind, ChangeRecord, Collection},
    state::AgentLevelState,
    transition::LevelTransitionRequest,
    violation::GuardrailViolation,
};

/// Primary key of a record within its collection.
type Key = String;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEntry {
    Live(ChangeRecord),
    Tombstone { updated_at: DateTime<Utc> },
}

impl CacheEntry {
    pub fn updated_at(&self) -> DateTime<Utc> {
        match self {
            CacheEntry::Live(record) => record.updated_at(),
            CacheEntry::Tombstone { updated_at } => *updated_at,
        }
    }

    pub fn record(&self) -> Option<&ChangeRecord> {
        match self {
            CacheEntry::Live(record) => Some(record),
            CacheEntry::Tombstone { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalCache {
    collections: HashMap<Collection, HashMap<Key, CacheEntry>>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one event. Returns true if the cache changed.
    pub fn apply(&mut self, event: &ChangeEvent) -> bool {
        let record = &event.record;
        let incoming = match event.kind {
            ChangeKind::Insert | ChangeKind::Update => CacheEntry::Live(record.clone()),
            ChangeKind::Delete => CacheEntry::Tombstone { updated_at: record.updated_at() },
        };

        let entries = self.collections.entry(record.collection()).or_default();
        match entries.get(&record.key()) {
            Some(current) if incoming.updated_at() <= current.updated_at() => false,
            _ => {
                entries.insert(record.key(), incoming);
                true
            }
        }
    }

    pub fn entry(&self, collection: Collection, key: &str) -> Option<&CacheEntry> {
        self.collections.get(&collection).and_then(|m| m.get(key))
    }

    /// The live record, or `None` if absent or deleted.
    pub fn get(&self, collection: Collection, key: &str) -> Option<&ChangeRecord> {
        self.entry(collection, key).and_then(CacheEntry::record)
    }

    pub fn is_tombstoned(&self, collection: Collection, key: &str) -> bool {
        matches!(self.entry(collection, key), Some(CacheEntry::Tombstone { .. }))
    }

    /// Live records in one collection, in no particular order.
    pub fn records(&self, collection: Collection) -> impl Iterator<Item = &ChangeRecord> {
        self.collections
            .get(&collection)
            .into_iter()
            .flat_map(|m| m.values())
            .filter_map(CacheEntry::record)
    }

    pub fn len(&self, collection: Collection) -> usize {
        self.records(collection).count()
    }

    pub fn level_state(&self, agent_id: &str) -> Option<&AgentLevelState> {
        match self.get(Collection::LevelStates, agent_id) {
            Some(ChangeRecord::LevelState(state)) => Some(state),
            _ => None,
        }
    }

    /// Pending and resolved requests for one agent, newest first.
    pub fn transitions_for(&self, agent_id: &str) -> Vec<&LevelTransitionRequest> {
        let mut requests: Vec<&LevelTransitionRequest> = self
            .records(Collection::TransitionRequests)
            .filter_map(|r| match r {
                ChangeRecord::Transition(t) if t.agent_id.as_str() == agent_id => Some(t),
                _ => None,
            })
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        requests
    }

    /// Violations for one agent, newest first.
    pub fn violations_for(&self, agent_id: &str) -> Vec<&GuardrailViolation> {
        let mut violations: Vec<&GuardrailViolation> = self
            .records(Collection::Violations)
            .filter_map(|r| match r {
                ChangeRecord::Violation(v) if v.agent_id.as_str() == agent_id => Some(v),
                _ => None,
            })
            .collect();
        violations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        violations
    }

    // ── Optimistic writes ────────────────────────────────────────────────────

    /// Overwrite the entry regardless of stamps, returning what was there.
    pub(crate) fn put_unchecked(&mut self, record: ChangeRecord) -> Option<CacheEntry> {
        self.collections
            .entry(record.collection())
            .or_default()
            .insert(record.key(), CacheEntry::Live(record))
    }

    /// Put back the entry returned by `put_unchecked`.
    pub(crate) fn restore(&mut self, collection: Collection, key: &str, previous: Option<CacheEntry>) {
        let entries = self.collections.entry(collection).or_default();
        match previous {
            Some(entry) => {
                entries.insert(key.to_string(), entry);
            }
            None => {
                entries.remove(key);
            }
        }
    }
}
