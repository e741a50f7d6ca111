//! # tierguard-store
//!
//! In-memory implementations of the two mutable stores of the TierGuard
//! engine: per-agent level state and level transition requests.
//!
//! Both stamp `updated_at` strictly increasing per record and publish every
//! committed write to an optional `ChangeSink`, which is how replicas learn
//! about changes.
//!
//! ```rust,ignore
//! let history = Arc::new(InMemoryHistoryLog::new());
//! let levels = InMemoryLevelStore::new(history, clock.clone()).with_change_sink(feed.clone());
//! let transitions = InMemoryTransitionStore::new(clock).with_change_sink(feed);
//! ```

pub mod level;
pub mod transition;

pub use level::InMemoryLevelStore;
pub use transition::InMemoryTransitionStore;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc, Barrier, Mutex,
        },
        thread,
    };

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use uuid::Uuid;

    use tierguard_audit::InMemoryHistoryLog;
    use tierguard_contracts::{
        agent::AgentId,
        change::{ChangeEvent, ChangeKind, ChangeRecord},
        error::{TierGuardError, TierGuardResult},
        evaluation::{DemotionVerdict, PromotionVerdict},
        guardrails::AgentGuardrails,
        level::{Level, TransitionTrigger},
        metrics::LevelMetricsSnapshot,
        state::{AgentLevelState, LevelChange},
        transition::{
            LevelHistoryEntry, LevelTransitionRequest, TransitionFilter, TransitionResolution,
            TransitionStatus,
        },
    };
    use tierguard_core::{
        clock::ManualClock,
        traits::{ChangeSink, HistoryWriter, LevelStore, TransitionEvaluator, TransitionStore},
        workflow::{TransitionWorkflow, WorkflowSettings},
    };

    use super::{InMemoryLevelStore, InMemoryTransitionStore};

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 5, 1, 9, 0, 0).unwrap()
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

    /// A history writer whose every append fails.
    struct BrokenHistory;

    impl HistoryWriter for BrokenHistory {
        fn append(&self, _entry: &LevelHistoryEntry) -> TierGuardResult<()> {
            Err(TierGuardError::StoreWriteFailed { reason: "disk full".to_string() })
        }

        fn entries_for(&self, _agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>> {
            Ok(Vec::new())
        }
    }

    fn level_store() -> (InMemoryLevelStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start()));
        let store = InMemoryLevelStore::new(Arc::new(InMemoryHistoryLog::new()), clock.clone());
        (store, clock)
    }

    fn registered(store: &InMemoryLevelStore, agent: &str) -> AgentId {
        let id = AgentId::new(agent);
        store
            .register(
                &id,
                AgentGuardrails::tier_default(Level::Observer),
                LevelMetricsSnapshot::default(),
            )
            .unwrap();
        id
    }

    fn change(agent: &AgentId, to: Level) -> LevelChange {
        LevelChange {
            agent_id: agent.clone(),
            to_level: to,
            trigger: TransitionTrigger::ManualOverride,
            reason: "ops decision".to_string(),
            approved_by: Some("ops@fleet".to_string()),
            request_id: None,
            expected_updated_at: None,
        }
    }

    fn pending(agent: &str, at: DateTime<Utc>) -> LevelTransitionRequest {
        LevelTransitionRequest {
            id: Uuid::new_v4(),
            agent_id: AgentId::new(agent),
            from_level: Level::Observer,
            to_level: Level::Assistant,
            trigger: TransitionTrigger::Promotion,
            reason: "eligible".to_string(),
            metrics_snapshot: LevelMetricsSnapshot::default(),
            status: TransitionStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            review_note: None,
            cooldown_until: None,
            created_at: at,
            updated_at: at,
        }
    }

    fn rejection(at: DateTime<Utc>, cooldown_until: Option<DateTime<Utc>>) -> TransitionResolution {
        TransitionResolution {
            status: TransitionStatus::Rejected,
            reviewed_by: "reviewer".to_string(),
            reviewed_at: at,
            review_note: Some("not yet".to_string()),
            cooldown_until,
        }
    }

    // ── Level store ───────────────────────────────────────────────────────────

    #[test]
    fn register_starts_at_level_one_and_is_idempotent() {
        let (store, clock) = level_store();
        let id = registered(&store, "a");
        let first = store.get(&id).unwrap().unwrap();
        assert_eq!(first.current_level, Level::Observer);
        assert_eq!(first.created_at, start());

        clock.advance(Duration::hours(1));
        let again = store
            .register(&id, AgentGuardrails::tier_default(Level::Autonomous), LevelMetricsSnapshot::default())
            .unwrap();
        assert_eq!(again, first, "re-registering must not touch the existing state");
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn set_level_writes_level_and_exactly_one_history_entry() {
        let (store, _clock) = level_store();
        let id = registered(&store, "a");

        let entry = store.set_level(change(&id, Level::Operator)).unwrap();
        assert_eq!(entry.from_level, Level::Observer);
        assert_eq!(entry.to_level, Level::Operator);

        let state = store.get(&id).unwrap().unwrap();
        assert_eq!(state.current_level, Level::Operator);

        let history = store.history(&id).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0], entry);
    }

    #[test]
    fn no_op_set_level_still_appends_history() {
        let (store, _clock) = level_store();
        let id = registered(&store, "a");
        let before = store.get(&id).unwrap().unwrap();

        let entry = store.set_level(change(&id, Level::Observer)).unwrap();
        assert_eq!(entry.from_level, entry.to_level);
        assert_eq!(store.history(&id).unwrap().len(), 1);

        let after = store.get(&id).unwrap().unwrap();
        assert_eq!(after.level_assigned_at, before.level_assigned_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn updated_at_strictly_increases_under_a_frozen_clock() {
        let (store, _clock) = level_store();
        let id = registered(&store, "a");

        let mut last = store.get(&id).unwrap().unwrap().updated_at;
        for _ in 0..3 {
            let state = store.set_metrics(&id, LevelMetricsSnapshot::default()).unwrap();
            assert!(state.updated_at > last);
            last = state.updated_at;
        }
    }

    #[test]
    fn stale_expected_stamp_is_refused() {
        let (store, clock) = level_store();
        let id = registered(&store, "a");
        let read = store.get(&id).unwrap().unwrap();

        clock.advance(Duration::minutes(1));
        store.set_metrics(&id, LevelMetricsSnapshot::default()).unwrap();

        let mut stale = change(&id, Level::Assistant);
        stale.expected_updated_at = Some(read.updated_at);
        let err = store.set_level(stale).unwrap_err();
        assert!(matches!(err, TierGuardError::StaleWrite { .. }));

        assert_eq!(store.get(&id).unwrap().unwrap().current_level, Level::Observer);
        assert!(store.history(&id).unwrap().is_empty());
    }

    #[test]
    fn concurrent_cas_writers_have_one_winner() {
        let (store, _clock) = level_store();
        let store = Arc::new(store);
        let id = registered(&store, "a");
        let stamp = store.get(&id).unwrap().unwrap().updated_at;

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                let id = id.clone();
                thread::spawn(move || {
                    let mut write = change(&id, Level::Assistant);
                    write.expected_updated_at = Some(stamp);
                    barrier.wait();
                    store.set_level(write)
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, TierGuardError::StaleWrite { .. })));
        assert_eq!(store.history(&id).unwrap().len(), 1);
    }

    #[test]
    fn failed_history_append_rolls_back_level() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = InMemoryLevelStore::new(Arc::new(BrokenHistory), clock);
        let id = registered(&store, "a");
        let before = store.get(&id).unwrap().unwrap();

        let err = store.set_level(change(&id, Level::Operator)).unwrap_err();
        assert!(matches!(err, TierGuardError::StoreWriteFailed { .. }));
        assert_eq!(store.get(&id).unwrap().unwrap(), before);
    }

    #[test]
    fn mutations_on_unknown_agent_fail() {
        let (store, _clock) = level_store();
        let ghost = AgentId::new("ghost");

        assert!(matches!(
            store.set_level(change(&ghost, Level::Assistant)),
            Err(TierGuardError::AgentNotFound { .. })
        ));
        assert!(matches!(
            store.set_guardrails(&ghost, AgentGuardrails::tier_default(Level::Observer)),
            Err(TierGuardError::AgentNotFound { .. })
        ));
        assert!(matches!(
            store.set_metrics(&ghost, LevelMetricsSnapshot::default()),
            Err(TierGuardError::AgentNotFound { .. })
        ));
        assert!(store.get(&ghost).unwrap().is_none());
    }

    #[test]
    fn guardrails_are_validated_and_replaced_wholesale() {
        let (store, _clock) = level_store();
        let id = registered(&store, "a");

        let mut bad = AgentGuardrails::tier_default(Level::Assistant);
        bad.auto_review_threshold = 1.5;
        assert!(matches!(
            store.set_guardrails(&id, bad),
            Err(TierGuardError::InvalidGuardrails { .. })
        ));

        let replacement = AgentGuardrails::tier_default(Level::Operator);
        let state = store.set_guardrails(&id, replacement.clone()).unwrap();
        assert_eq!(state.guardrails, replacement);
        assert_eq!(state.current_level, Level::Observer, "guardrails do not move the level");
    }

    #[test]
    fn level_store_publishes_insert_then_updates() {
        let clock = Arc::new(ManualClock::new(start()));
        let sink = Arc::new(RecordingSink::default());
        let store = InMemoryLevelStore::new(Arc::new(InMemoryHistoryLog::new()), clock)
            .with_change_sink(sink.clone());
        let id = registered(&store, "a");
        store.set_level(change(&id, Level::Assistant)).unwrap();

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, ChangeKind::Insert);
        assert_eq!(events[1].kind, ChangeKind::Update);
        match &events[1].record {
            ChangeRecord::LevelState(s) => assert_eq!(s.current_level, Level::Assistant),
            other => panic!("unexpected record {:?}", other),
        }
    }

    // ── Transition store ──────────────────────────────────────────────────────

    #[test]
    fn second_pending_request_is_refused() {
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())));
        let first = store.insert_pending(pending("a", start())).unwrap();

        let err = store.insert_pending(pending("a", start())).unwrap_err();
        assert_eq!(
            err,
            TierGuardError::DuplicatePendingRequest { agent_id: "a".to_string(), request_id: first.id }
        );

        // Other agents are unaffected.
        store.insert_pending(pending("b", start())).unwrap();
    }

    #[test]
    fn concurrent_pending_inserts_have_one_winner() {
        let store = Arc::new(InMemoryTransitionStore::new(Arc::new(ManualClock::new(start()))));
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    store.insert_pending(pending("a", start()))
                })
            })
            .collect();

        let ok = handles.into_iter().map(|h| h.join().unwrap()).filter(|r| r.is_ok()).count();
        assert_eq!(ok, 1);
        assert_eq!(store.list(&TransitionFilter::pending()).unwrap().len(), 1);
    }

    #[test]
    fn resolve_only_moves_pending_requests() {
        let clock = Arc::new(ManualClock::new(start()));
        let store = InMemoryTransitionStore::new(clock.clone());
        let request = store.insert_pending(pending("a", start())).unwrap();

        let resolved = store.resolve(request.id, rejection(start(), None)).unwrap();
        assert_eq!(resolved.status, TransitionStatus::Rejected);
        assert_eq!(resolved.reviewed_by.as_deref(), Some("reviewer"));
        assert!(resolved.updated_at > request.updated_at);
        assert!(store.pending_for(&AgentId::new("a")).unwrap().is_none());

        let again = store.resolve(request.id, rejection(start(), None)).unwrap_err();
        assert!(matches!(again, TierGuardError::RequestNotPending { .. }));

        let missing = store.resolve(Uuid::new_v4(), rejection(start(), None)).unwrap_err();
        assert!(matches!(missing, TierGuardError::RequestNotFound { .. }));
    }

    #[test]
    fn insert_accepts_only_terminal_requests() {
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())));
        assert!(matches!(
            store.insert(pending("a", start())),
            Err(TierGuardError::InvalidTransition { .. })
        ));

        let mut approved = pending("a", start());
        approved.status = TransitionStatus::Approved;
        store.insert(approved).unwrap();
        assert!(store.pending_for(&AgentId::new("a")).unwrap().is_none());
    }

    #[test]
    fn list_is_newest_first_and_filtered() {
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())));
        let a1 = store.insert_pending(pending("a", start())).unwrap();
        store.resolve(a1.id, rejection(start(), None)).unwrap();
        let b = store.insert_pending(pending("b", start() + Duration::seconds(1))).unwrap();
        let a2 = store.insert_pending(pending("a", start() + Duration::seconds(2))).unwrap();

        let all = store.list(&TransitionFilter::default()).unwrap();
        let ids: Vec<_> = all.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![a2.id, b.id, a1.id]);

        let a_pending = store
            .list(&TransitionFilter {
                agent_id: Some(AgentId::new("a")),
                status: Some(TransitionStatus::Pending),
            })
            .unwrap();
        assert_eq!(a_pending.len(), 1);
        assert_eq!(a_pending[0].id, a2.id);
    }

    #[test]
    fn active_cooldown_returns_latest_running_cooldown() {
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())));
        let agent = AgentId::new("a");

        let r1 = store.insert_pending(pending("a", start())).unwrap();
        store.resolve(r1.id, rejection(start(), Some(start() + Duration::days(7)))).unwrap();
        let r2 = store.insert_pending(pending("a", start())).unwrap();
        store.resolve(r2.id, rejection(start(), Some(start() + Duration::days(3)))).unwrap();

        assert_eq!(
            store.active_cooldown(&agent, start()).unwrap(),
            Some(start() + Duration::days(7))
        );
        assert_eq!(store.active_cooldown(&agent, start() + Duration::days(7)).unwrap(), None);
        assert_eq!(store.active_cooldown(&AgentId::new("b"), start()).unwrap(), None);
    }

    #[test]
    fn reopen_returns_request_to_pending() {
        let sink = Arc::new(RecordingSink::default());
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())))
            .with_change_sink(sink.clone());
        let request = store.insert_pending(pending("a", start())).unwrap();
        let resolved = store.resolve(request.id, rejection(start(), None)).unwrap();

        let reopened = store.reopen(request.id).unwrap();
        assert_eq!(reopened.status, TransitionStatus::Pending);
        assert_eq!(reopened.reviewed_by, None);
        assert_eq!(reopened.review_note, None);
        assert!(reopened.updated_at > resolved.updated_at);
        assert_eq!(store.pending_for(&AgentId::new("a")).unwrap(), Some(reopened));

        let events = sink.events.lock().unwrap();
        assert_eq!(events.last().map(|e| e.kind), Some(ChangeKind::Update));
    }

    #[test]
    fn reopen_is_refused_while_another_request_is_pending() {
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())));
        let first = store.insert_pending(pending("a", start())).unwrap();
        store.resolve(first.id, rejection(start(), None)).unwrap();
        let second = store.insert_pending(pending("a", start())).unwrap();

        let err = store.reopen(first.id).unwrap_err();
        assert!(matches!(
            err,
            TierGuardError::DuplicatePendingRequest { request_id, .. } if request_id == second.id
        ));
        assert!(matches!(
            store.reopen(Uuid::new_v4()),
            Err(TierGuardError::RequestNotFound { .. })
        ));
    }

    #[test]
    fn withdraw_removes_terminal_request_with_a_newer_delete() {
        let sink = Arc::new(RecordingSink::default());
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())))
            .with_change_sink(sink.clone());
        let mut record = pending("a", start());
        record.status = TransitionStatus::Approved;
        let record = store.insert(record).unwrap();

        store.withdraw(record.id).unwrap();
        assert_eq!(store.get(record.id).unwrap(), None);

        let events = sink.events.lock().unwrap();
        let last = events.last().unwrap();
        assert_eq!(last.kind, ChangeKind::Delete);
        assert!(last.record.updated_at() > record.updated_at, "delete must win in replica caches");
    }

    #[test]
    fn withdraw_refuses_pending_and_unknown_requests() {
        let store = InMemoryTransitionStore::new(Arc::new(ManualClock::new(start())));
        let open = store.insert_pending(pending("a", start())).unwrap();

        assert!(matches!(store.withdraw(open.id), Err(TierGuardError::InvalidTransition { .. })));
        assert!(matches!(
            store.withdraw(Uuid::new_v4()),
            Err(TierGuardError::RequestNotFound { .. })
        ));
        assert_eq!(store.pending_for(&AgentId::new("a")).unwrap(), Some(open));
    }

    // ── Workflow rollback ─────────────────────────────────────────────────────
    //
    // The workflow lives in tierguard-core, which cannot depend on this crate,
    // so its behaviour against failing stores is exercised here.

    fn outage() -> TierGuardError {
        TierGuardError::StoreWriteFailed { reason: "connection reset".to_string() }
    }

    /// Transition store whose `resolve` can be switched to fail.
    struct FlakyTransitions {
        inner: InMemoryTransitionStore,
        fail_resolve: AtomicBool,
    }

    impl TransitionStore for FlakyTransitions {
        fn insert_pending(
            &self,
            request: LevelTransitionRequest,
        ) -> TierGuardResult<LevelTransitionRequest> {
            self.inner.insert_pending(request)
        }

        fn insert(&self, request: LevelTransitionRequest) -> TierGuardResult<LevelTransitionRequest> {
            self.inner.insert(request)
        }

        fn get(&self, request_id: Uuid) -> TierGuardResult<Option<LevelTransitionRequest>> {
            self.inner.get(request_id)
        }

        fn pending_for(&self, agent_id: &AgentId) -> TierGuardResult<Option<LevelTransitionRequest>> {
            self.inner.pending_for(agent_id)
        }

        fn resolve(
            &self,
            request_id: Uuid,
            resolution: TransitionResolution,
        ) -> TierGuardResult<LevelTransitionRequest> {
            if self.fail_resolve.load(Ordering::SeqCst) {
                return Err(outage());
            }
            self.inner.resolve(request_id, resolution)
        }

        fn reopen(&self, request_id: Uuid) -> TierGuardResult<LevelTransitionRequest> {
            self.inner.reopen(request_id)
        }

        fn withdraw(&self, request_id: Uuid) -> TierGuardResult<()> {
            self.inner.withdraw(request_id)
        }

        fn list(&self, filter: &TransitionFilter) -> TierGuardResult<Vec<LevelTransitionRequest>> {
            self.inner.list(filter)
        }

        fn active_cooldown(
            &self,
            agent_id: &AgentId,
            now: DateTime<Utc>,
        ) -> TierGuardResult<Option<DateTime<Utc>>> {
            self.inner.active_cooldown(agent_id, now)
        }
    }

    /// Level store whose `set_level` can be switched to fail.
    struct FlakyLevels {
        inner: InMemoryLevelStore,
        fail_set_level: AtomicBool,
    }

    impl LevelStore for FlakyLevels {
        fn get(&self, agent_id: &AgentId) -> TierGuardResult<Option<AgentLevelState>> {
            self.inner.get(agent_id)
        }

        fn list(&self) -> TierGuardResult<Vec<AgentLevelState>> {
            self.inner.list()
        }

        fn register(
            &self,
            agent_id: &AgentId,
            guardrails: AgentGuardrails,
            metrics: LevelMetricsSnapshot,
        ) -> TierGuardResult<AgentLevelState> {
            self.inner.register(agent_id, guardrails, metrics)
        }

        fn set_level(&self, change: LevelChange) -> TierGuardResult<LevelHistoryEntry> {
            if self.fail_set_level.load(Ordering::SeqCst) {
                return Err(outage());
            }
            self.inner.set_level(change)
        }

        fn set_guardrails(
            &self,
            agent_id: &AgentId,
            guardrails: AgentGuardrails,
        ) -> TierGuardResult<AgentLevelState> {
            self.inner.set_guardrails(agent_id, guardrails)
        }

        fn set_metrics(
            &self,
            agent_id: &AgentId,
            metrics: LevelMetricsSnapshot,
        ) -> TierGuardResult<AgentLevelState> {
            self.inner.set_metrics(agent_id, metrics)
        }

        fn history(&self, agent_id: &AgentId) -> TierGuardResult<Vec<LevelHistoryEntry>> {
            self.inner.history(agent_id)
        }
    }

    /// Always eligible for the next tier; demotes on any critical violation.
    struct StepEvaluator;

    impl TransitionEvaluator for StepEvaluator {
        fn evaluate_promotion(
            &self,
            level: Level,
            _metrics: &LevelMetricsSnapshot,
        ) -> PromotionVerdict {
            PromotionVerdict {
                eligible: level.promoted().is_some(),
                target_level: level.promoted(),
                reason: "criteria met".to_string(),
            }
        }

        fn evaluate_demotion(
            &self,
            level: Level,
            metrics: &LevelMetricsSnapshot,
        ) -> DemotionVerdict {
            if metrics.critical_violations_7d == 0 {
                return DemotionVerdict::keep("no critical violations");
            }
            DemotionVerdict {
                should_demote: true,
                target_level: level.demoted(),
                reason: "critical violation".to_string(),
            }
        }
    }

    struct Rig {
        workflow: TransitionWorkflow,
        levels: Arc<FlakyLevels>,
        transitions: Arc<FlakyTransitions>,
        agent: AgentId,
    }

    fn rig() -> Rig {
        let clock = Arc::new(ManualClock::new(start()));
        let levels = Arc::new(FlakyLevels {
            inner: InMemoryLevelStore::new(Arc::new(InMemoryHistoryLog::new()), clock.clone()),
            fail_set_level: AtomicBool::new(false),
        });
        let transitions = Arc::new(FlakyTransitions {
            inner: InMemoryTransitionStore::new(clock.clone()),
            fail_resolve: AtomicBool::new(false),
        });
        let agent = registered(&levels.inner, "a");
        let workflow = TransitionWorkflow::new(
            levels.clone(),
            transitions.clone(),
            Box::new(StepEvaluator),
            clock,
            WorkflowSettings::default(),
        );
        Rig { workflow, levels, transitions, agent }
    }

    impl Rig {
        fn level(&self) -> Level {
            self.levels.get(&self.agent).unwrap().unwrap().current_level
        }

        fn pending(&self) -> Option<LevelTransitionRequest> {
            self.transitions.pending_for(&self.agent).unwrap()
        }
    }

    #[test]
    fn failed_resolve_during_approve_leaves_level_untouched() {
        let rig = rig();
        let request = rig.workflow.request_promotion(&rig.agent).unwrap();

        rig.transitions.fail_resolve.store(true, Ordering::SeqCst);
        let err = rig.workflow.approve(request.id, "reviewer").unwrap_err();
        assert!(matches!(err, TierGuardError::StoreWriteFailed { .. }));
        assert_eq!(rig.level(), Level::Observer);
        assert!(rig.levels.history(&rig.agent).unwrap().is_empty());
        assert_eq!(rig.pending().map(|r| r.id), Some(request.id));

        rig.transitions.fail_resolve.store(false, Ordering::SeqCst);
        let applied = rig.workflow.approve(request.id, "reviewer").unwrap();
        assert_eq!(applied.request.status, TransitionStatus::Approved);
        assert_eq!(rig.level(), Level::Assistant);
    }

    #[test]
    fn failed_level_write_during_approve_reopens_request() {
        let rig = rig();
        let request = rig.workflow.request_promotion(&rig.agent).unwrap();

        rig.levels.fail_set_level.store(true, Ordering::SeqCst);
        let err = rig.workflow.approve(request.id, "reviewer").unwrap_err();
        assert!(matches!(err, TierGuardError::StoreWriteFailed { .. }));
        assert_eq!(rig.level(), Level::Observer);
        let reopened = rig.pending().unwrap();
        assert_eq!(reopened.id, request.id);
        assert_eq!(reopened.reviewed_by, None);

        // The agent is not wedged: no stale write, no duplicate pending.
        rig.levels.fail_set_level.store(false, Ordering::SeqCst);
        let applied = rig.workflow.approve(request.id, "reviewer").unwrap();
        assert_eq!(applied.history.request_id, Some(request.id));
        assert_eq!(rig.level(), Level::Assistant);
        assert_eq!(rig.levels.history(&rig.agent).unwrap().len(), 1);
    }

    #[test]
    fn failed_level_write_during_override_withdraws_its_record() {
        let rig = rig();
        let request = rig.workflow.request_promotion(&rig.agent).unwrap();

        rig.levels.fail_set_level.store(true, Ordering::SeqCst);
        let err = rig
            .workflow
            .set_agent_level(&rig.agent, 3, TransitionTrigger::ManualOverride, "ops", "admin@ops")
            .unwrap_err();
        assert!(matches!(err, TierGuardError::StoreWriteFailed { .. }));

        let all = rig.transitions.list(&TransitionFilter::default()).unwrap();
        assert_eq!(all.len(), 1, "no approved override record may survive");
        assert_eq!(all[0].id, request.id);
        assert_eq!(all[0].status, TransitionStatus::Pending);
        assert_eq!(rig.level(), Level::Observer);
        assert!(rig.levels.history(&rig.agent).unwrap().is_empty());
    }

    #[test]
    fn failed_demotion_keeps_the_pending_request() {
        let rig = rig();
        rig.levels.inner.set_level(change(&rig.agent, Level::Assistant)).unwrap();
        let request = rig.workflow.request_promotion(&rig.agent).unwrap();
        rig.levels
            .inner
            .set_metrics(
                &rig.agent,
                LevelMetricsSnapshot { critical_violations_7d: 1, ..LevelMetricsSnapshot::default() },
            )
            .unwrap();

        rig.levels.fail_set_level.store(true, Ordering::SeqCst);
        rig.workflow.run_evaluation_cycle(&rig.agent).unwrap_err();
        assert_eq!(rig.level(), Level::Assistant);
        assert_eq!(rig.pending().map(|r| r.id), Some(request.id));

        rig.levels.fail_set_level.store(false, Ordering::SeqCst);
        rig.workflow.run_evaluation_cycle(&rig.agent).unwrap();
        assert_eq!(rig.level(), Level::Observer);
        assert_eq!(rig.pending(), None, "the demotion supersedes the request");
    }

    #[test]
    fn unknown_agents_do_not_grow_the_lock_table() {
        let rig = rig();
        for n in 0..50 {
            let ghost = AgentId::new(format!("ghost-{}", n));
            assert!(rig.workflow.request_promotion(&ghost).is_err());
            assert!(rig.workflow.run_evaluation_cycle(&ghost).is_err());
            assert!(rig
                .workflow
                .set_agent_level(&ghost, 2, TransitionTrigger::ManualOverride, "ops", "admin@ops")
                .is_err());
        }
        assert_eq!(rig.workflow.tracked_agents(), 0);

        rig.workflow.request_promotion(&rig.agent).unwrap();
        assert_eq!(rig.workflow.tracked_agents(), 1);
    }
}
