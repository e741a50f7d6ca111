//! # tierguard-audit
//!
//! Append-only, SHA-256 hash-chained storage for the two immutable streams of
//! the TierGuard engine: the level history and the guardrail violation ledger.
//!
//! ## Overview
//!
//! Every record is wrapped in a `ChainedEntry` that links to the previous
//! entry of its stream via its SHA-256 hash. Neither writer has an update or
//! delete path, and any in-memory tampering is detected by `verify_chain`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tierguard_audit::{InMemoryHistoryLog, InMemoryViolationLedger};
//!
//! let history = Arc::new(InMemoryHistoryLog::new());
//! let ledger = InMemoryViolationLedger::new(clock).with_change_sink(feed);
//!
//! ledger.log(violation)?;
//! assert!(ledger.verify_integrity());
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_entry, verify_chain, HashChain};
pub use event::{AuditLog, ChainedEntry};
pub use memory::{InMemoryHistoryLog, InMemoryViolationLedger};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    use tierguard_contracts::{
        agent::AgentId,
        change::{ChangeEvent, ChangeKind, ChangeRecord},
        level::{Level, TransitionTrigger},
        metrics::LevelMetricsSnapshot,
        transition::LevelHistoryEntry,
        violation::{NewViolation, ViolationQuery, ViolationResolution, ViolationSeverity},
    };
    use tierguard_core::{
        clock::ManualClock,
        traits::{ChangeSink, HistoryWriter, ViolationLedger},
    };

    use super::{ChainedEntry, HashChain, InMemoryHistoryLog, InMemoryViolationLedger};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn history_entry(agent: &str, from: Level, to: Level) -> LevelHistoryEntry {
        LevelHistoryEntry {
            id: Uuid::new_v4(),
            agent_id: AgentId::new(agent),
            from_level: from,
            to_level: to,
            trigger: TransitionTrigger::ManualOverride,
            reason: "test".to_string(),
            approved_by: Some("ops".to_string()),
            request_id: None,
            metrics_snapshot: LevelMetricsSnapshot::default(),
            changed_at: Utc::now(),
        }
    }

    fn violation(agent: &str, severity: ViolationSeverity) -> NewViolation {
        NewViolation {
            agent_id: AgentId::new(agent),
            action_attempted: "delete_record".to_string(),
            guardrail_violated: "denied_actions".to_string(),
            severity,
            resolution: ViolationResolution::AutoDenied,
            context: json!({ "source": "test" }),
        }
    }

    fn frozen_ledger() -> InMemoryViolationLedger {
        let start = Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap();
        InMemoryViolationLedger::new(Arc::new(ManualClock::new(start)))
    }

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<ChangeEvent>>,
    }

    impl ChangeSink for RecordingSink {
        fn publish(&self, event: ChangeEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    // ── Chain ─────────────────────────────────────────────────────────────────

    #[test]
    fn empty_chain_is_valid() {
        let chain: HashChain<String> = HashChain::new("empty");
        assert!(chain.verify());
        assert_eq!(chain.last_hash(), ChainedEntry::<String>::GENESIS_HASH);
    }

    #[test]
    fn first_entry_links_to_genesis_and_sequences_are_contiguous() {
        let mut chain = HashChain::new("s");
        chain.append("a".to_string()).unwrap();
        chain.append("b".to_string()).unwrap();
        chain.append("c".to_string()).unwrap();

        let entries = chain.entries();
        assert_eq!(entries[0].prev_hash, ChainedEntry::<String>::GENESIS_HASH);
        for (idx, entry) in entries.iter().enumerate() {
            assert_eq!(entry.sequence, idx as u64);
            assert_eq!(entry.this_hash.len(), 64);
        }
        assert_eq!(entries[1].prev_hash, entries[0].this_hash);
        assert_eq!(entries[2].prev_hash, entries[1].this_hash);
        assert!(chain.verify());
    }

    #[test]
    fn same_record_in_different_streams_hashes_differently() {
        let mut a = HashChain::new("level-history");
        let mut b = HashChain::new("guardrail-violations");
        let ha = a.append(1u32).unwrap().this_hash.clone();
        let hb = b.append(1u32).unwrap().this_hash.clone();
        assert_ne!(ha, hb);
    }

    // ── Level history ─────────────────────────────────────────────────────────

    #[test]
    fn history_log_chain_integrity() {
        let log = InMemoryHistoryLog::new();
        log.append(&history_entry("a", Level::Observer, Level::Assistant)).unwrap();
        log.append(&history_entry("a", Level::Assistant, Level::Operator)).unwrap();
        log.append(&history_entry("b", Level::Observer, Level::Observer)).unwrap();

        assert_eq!(log.len(), 3);
        assert!(log.verify_integrity());
    }

    #[test]
    fn history_tamper_is_detected() {
        let log = InMemoryHistoryLog::new();
        log.append(&history_entry("a", Level::Observer, Level::Assistant)).unwrap();
        log.append(&history_entry("a", Level::Assistant, Level::Operator)).unwrap();

        {
            let mut chain = log.chain.lock().unwrap();
            chain.entries[0].record.to_level = Level::Autonomous;
        }

        assert!(!log.verify_integrity(), "rewriting a history entry must break the chain");
    }

    #[test]
    fn history_entries_for_are_newest_first_and_per_agent() {
        let log = InMemoryHistoryLog::new();
        log.append(&history_entry("a", Level::Observer, Level::Assistant)).unwrap();
        log.append(&history_entry("b", Level::Observer, Level::Assistant)).unwrap();
        log.append(&history_entry("a", Level::Assistant, Level::Operator)).unwrap();

        let entries = log.entries_for(&AgentId::new("a")).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].to_level, Level::Operator);
        assert_eq!(entries[1].to_level, Level::Assistant);

        assert!(log.entries_for(&AgentId::new("nobody")).unwrap().is_empty());
    }

    #[test]
    fn history_export_carries_terminal_hash() {
        let log = InMemoryHistoryLog::new();
        assert_eq!(log.export_log().unwrap().terminal_hash, "");

        log.append(&history_entry("a", Level::Observer, Level::Assistant)).unwrap();
        let exported = log.export_log().unwrap();
        assert_eq!(exported.stream, "level-history");
        assert_eq!(exported.entries.len(), 1);
        assert_eq!(exported.terminal_hash, exported.entries[0].this_hash);
    }

    // ── Violation ledger ──────────────────────────────────────────────────────

    #[test]
    fn ledger_assigns_id_and_strictly_increasing_timestamps() {
        let ledger = frozen_ledger();
        let first = ledger.log(violation("a", ViolationSeverity::Critical)).unwrap();
        let second = ledger.log(violation("a", ViolationSeverity::Critical)).unwrap();

        assert_ne!(first.id, second.id);
        assert!(second.created_at > first.created_at, "frozen clock must still order entries");
        assert!(second.created_at - first.created_at <= Duration::milliseconds(1));
        assert!(ledger.verify_integrity());
    }

    #[test]
    fn ledger_lists_newest_first_with_filters() {
        let ledger = frozen_ledger();
        ledger.log(violation("a", ViolationSeverity::Warning)).unwrap();
        ledger.log(violation("b", ViolationSeverity::Critical)).unwrap();
        let newest_a = ledger.log(violation("a", ViolationSeverity::Critical)).unwrap();

        let for_a = ledger
            .list(&ViolationQuery { agent_id: Some(AgentId::new("a")), ..ViolationQuery::default() })
            .unwrap();
        assert_eq!(for_a.len(), 2);
        assert_eq!(for_a[0].id, newest_a.id);

        let critical = ledger
            .list(&ViolationQuery {
                severity: Some(ViolationSeverity::Critical),
                ..ViolationQuery::default()
            })
            .unwrap();
        assert_eq!(critical.len(), 2);
        assert!(critical.iter().all(|v| v.severity == ViolationSeverity::Critical));
    }

    #[test]
    fn ledger_paginates_after_filtering() {
        let ledger = frozen_ledger();
        let logged: Vec<_> = (0..5)
            .map(|_| ledger.log(violation("a", ViolationSeverity::Warning)).unwrap())
            .collect();

        let page = ledger
            .list(&ViolationQuery { limit: 2, offset: 1, ..ViolationQuery::default() })
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, logged[3].id);
        assert_eq!(page[1].id, logged[2].id);

        let past_end = ledger
            .list(&ViolationQuery { offset: 10, ..ViolationQuery::default() })
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[test]
    fn ledger_publishes_insert_events() {
        let sink = Arc::new(RecordingSink::default());
        let ledger = frozen_ledger().with_change_sink(sink.clone());
        let logged = ledger.log(violation("a", ViolationSeverity::Info)).unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, ChangeKind::Insert);
        assert_eq!(events[0].record, ChangeRecord::Violation(logged));
    }

    #[test]
    fn ledger_tamper_is_detected() {
        let ledger = frozen_ledger();
        ledger.log(violation("a", ViolationSeverity::Critical)).unwrap();
        ledger.log(violation("a", ViolationSeverity::Warning)).unwrap();

        {
            let mut chain = ledger.chain.lock().unwrap();
            chain.entries[0].record.severity = ViolationSeverity::Info;
        }

        assert!(!ledger.verify_integrity());
    }
}
