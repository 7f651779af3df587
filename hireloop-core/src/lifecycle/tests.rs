use super::*;
use crate::config::LifecyclePolicy;
use crate::entities::acceptance::ProfessionalAcceptance;
use crate::entities::idempotency::IdempotencyRecord;
use crate::entities::service_request::{RequestDetails, RequestDetailsPatch};
use crate::entities::{AcceptanceOutcome, RequestStatus, Urgency};
use crate::events::{EventEmitter, LifecycleEvent, LifecycleEventReceiver, lifecycle_event_channel};
use crate::store::{MemoryStore, RequestStore, StoreError};
use async_trait::async_trait;
use hireloop_sdk::objects::Transition;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

struct Harness {
    engine: Arc<LifecycleEngine>,
    events: LifecycleEventReceiver,
    client: Uuid,
}

impl Harness {
    fn new() -> Self {
        Self::with_store(Arc::new(MemoryStore::new()))
    }

    fn with_store(store: Arc<dyn RequestStore>) -> Self {
        let (tx, rx) = lifecycle_event_channel(64);
        let engine = LifecycleEngine::new(store, EventEmitter::new(tx), LifecyclePolicy::default());
        Self {
            engine: Arc::new(engine),
            events: rx,
            client: Uuid::now_v7(),
        }
    }

    async fn create(&self) -> Uuid {
        self.engine
            .create_request(self.client, details(), None)
            .await
            .unwrap()
            .id
    }

    fn drain(&mut self) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    fn transitions(&mut self) -> Vec<Transition> {
        self.drain().into_iter().map(|e| e.transition).collect()
    }
}

fn details() -> RequestDetails {
    RequestDetails {
        category: "plumbing".to_string(),
        description: "Boiler pressure keeps dropping".to_string(),
        location: "27 Quay Street".to_string(),
        urgency: Urgency::High,
    }
}

fn is_conflict(err: &LifecycleError) -> bool {
    matches!(err, LifecycleError::Conflict { .. })
}

#[tokio::test]
async fn test_create_then_cancel() {
    let mut h = Harness::new();
    let id = h.create().await;
    let cancelled = h
        .engine
        .cancel_request(id, h.client, "no longer needed".to_string(), None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.selected_professional_id, None);
    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("no longer needed"));
    assert_eq!(
        h.transitions(),
        vec![Transition::RequestCreated, Transition::RequestCancelled]
    );
}

#[tokio::test]
async fn test_accept_twice_yields_one_row() {
    let mut h = Harness::new();
    let id = h.create().await;
    let pro = Uuid::now_v7();

    let first = h.engine.accept_request(id, pro, None).await.unwrap();
    let second = h.engine.accept_request(id, pro, None).await.unwrap();
    assert!(!first.duplicate);
    assert!(second.duplicate);
    assert_eq!(first.acceptance.id, second.acceptance.id);

    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    assert_eq!(aggregate.ledger.len(), 1);
    assert_eq!(
        h.transitions(),
        vec![Transition::RequestCreated, Transition::ProfessionalAccepted]
    );
}

#[tokio::test]
async fn test_scenarios_select_reselect_complete_rate() {
    let mut h = Harness::new();
    let id = h.create().await;
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

    // A then B accept.
    h.engine.accept_request(id, a, None).await.unwrap();
    let accepted_b = h.engine.accept_request(id, b, None).await.unwrap();
    assert_eq!(accepted_b.status, RequestStatus::ActiveForAcceptance);
    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    let order: Vec<Uuid> = aggregate.ledger.list().iter().map(|r| r.professional_id).collect();
    assert_eq!(order, vec![a, b]);

    // Client selects A.
    let selected = h
        .engine
        .select_professional(id, h.client, a, None)
        .await
        .unwrap();
    assert_eq!(selected.status, RequestStatus::InProgress);
    assert_eq!(selected.selected_professional_id, Some(a));
    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    assert_eq!(aggregate.ledger.find(a).unwrap().outcome, AcceptanceOutcome::Selected);
    assert_eq!(aggregate.ledger.find(b).unwrap().outcome, AcceptanceOutcome::NotSelected);

    // Selecting B afterwards is refused and A stays bound.
    let err = h
        .engine
        .select_professional(id, h.client, b, None)
        .await
        .unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(err.status(), Some(RequestStatus::InProgress));
    let current = h.engine.get_request(id, h.client).await.unwrap();
    assert_eq!(current.selected_professional_id, Some(a));

    // A completes, client rates.
    let completed = h.engine.complete_by_professional(id, a, None).await.unwrap();
    assert_eq!(completed.status, RequestStatus::AwaitingRating);
    let closed = h
        .engine
        .rate_and_close(id, h.client, 5, "Quick and tidy work".to_string(), None)
        .await
        .unwrap();
    assert_eq!(closed.status, RequestStatus::Closed);
    assert_eq!(closed.rating, Some(5));
    assert!(closed.closed_at.is_some());

    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    assert_eq!(aggregate.ledger.find(a).unwrap().outcome, AcceptanceOutcome::Completed);

    let events = h.drain();
    let transitions: Vec<Transition> = events.iter().map(|e| e.transition).collect();
    assert_eq!(
        transitions,
        vec![
            Transition::RequestCreated,
            Transition::ProfessionalAccepted,
            Transition::ProfessionalAccepted,
            Transition::ProfessionalSelected,
            Transition::RequestCompleted,
            Transition::RequestClosed,
        ]
    );
    let last = events.last().unwrap();
    assert_eq!(last.snapshot.rating_comment.as_deref(), Some("Quick and tidy work"));
    assert_eq!(last.actor_id, h.client);
}

#[tokio::test]
async fn test_close_without_selection_from_pending() {
    let mut h = Harness::new();
    let id = h.create().await;
    let closed = h
        .engine
        .close_without_selection(id, h.client, "found someone locally".to_string(), None)
        .await
        .unwrap();
    assert_eq!(closed.status, RequestStatus::Closed);
    assert_eq!(closed.selected_professional_id, None);
    assert_eq!(closed.close_reason.as_deref(), Some("found someone locally"));
    assert_eq!(
        h.transitions(),
        vec![Transition::RequestCreated, Transition::RequestClosed]
    );
}

#[tokio::test]
async fn test_close_without_selection_marks_waiting_rows() {
    let h = Harness::new();
    let id = h.create().await;
    let pro = Uuid::now_v7();
    h.engine.accept_request(id, pro, None).await.unwrap();
    h.engine
        .close_without_selection(id, h.client, String::new(), None)
        .await
        .unwrap();
    let listed = h.engine.list_acceptances_for(pro).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].outcome, AcceptanceOutcome::NotSelected);
    assert_eq!(listed[0].request_status, RequestStatus::Closed);
}

#[tokio::test]
async fn test_terminal_requests_reject_every_mutation() {
    let h = Harness::new();
    let id = h.create().await;
    let pro = Uuid::now_v7();
    h.engine
        .cancel_request(id, h.client, "duplicate post".to_string(), None)
        .await
        .unwrap();

    let results = vec![
        h.engine.accept_request(id, pro, None).await.map(|_| ()),
        h.engine
            .select_professional(id, h.client, pro, None)
            .await
            .map(|_| ()),
        h.engine
            .close_without_selection(id, h.client, "x".to_string(), None)
            .await
            .map(|_| ()),
        h.engine
            .rate_and_close(id, h.client, 4, "Could not rate this".to_string(), None)
            .await
            .map(|_| ()),
        h.engine
            .cancel_request(id, h.client, "again".to_string(), None)
            .await
            .map(|_| ()),
        h.engine
            .update_request_details(
                id,
                h.client,
                RequestDetailsPatch {
                    location: Some("Elsewhere".to_string()),
                    ..Default::default()
                },
                None,
            )
            .await
            .map(|_| ()),
    ];
    for result in results {
        let err = result.unwrap_err();
        assert!(is_conflict(&err), "expected conflict, got {err:?}");
        assert_eq!(err.status(), Some(RequestStatus::Cancelled));
    }
}

#[tokio::test]
async fn test_selected_professional_may_cancel() {
    let h = Harness::new();
    let id = h.create().await;
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
    h.engine.accept_request(id, a, None).await.unwrap();
    h.engine.accept_request(id, b, None).await.unwrap();
    h.engine.select_professional(id, h.client, a, None).await.unwrap();

    let err = h
        .engine
        .cancel_request(id, b, "not my job".to_string(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));

    let cancelled = h
        .engine
        .cancel_request(id, a, "van broke down".to_string(), None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
    assert_eq!(cancelled.cancelled_by, Some(a));
    // The binding survives cancellation.
    assert_eq!(cancelled.selected_professional_id, Some(a));
}

#[tokio::test]
async fn test_unknown_request_is_not_found() {
    let h = Harness::new();
    let err = h
        .engine
        .accept_request(Uuid::now_v7(), Uuid::now_v7(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::NotFound { status: None, .. }));
}

#[tokio::test]
async fn test_get_request_visibility() {
    let h = Harness::new();
    let id = h.create().await;
    let pro = Uuid::now_v7();
    let err = h.engine.get_request(id, pro).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));
    h.engine.accept_request(id, pro, None).await.unwrap();
    assert_eq!(h.engine.get_request(id, pro).await.unwrap().id, id);

    let err = h.engine.list_professionals(id, pro).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));
}

#[tokio::test]
async fn test_idempotency_key_replay_emits_nothing() {
    let mut h = Harness::new();
    let id = h.create().await;
    let pro = Uuid::now_v7();
    h.engine.accept_request(id, pro, None).await.unwrap();
    h.drain();

    let key = Some("select-1".to_string());
    let first = h
        .engine
        .select_professional(id, h.client, pro, key.clone())
        .await
        .unwrap();
    let replayed = h
        .engine
        .select_professional(id, h.client, pro, key.clone())
        .await
        .unwrap();
    assert_eq!(first, replayed);
    assert_eq!(h.transitions(), vec![Transition::ProfessionalSelected]);

    // Same caller and key, different operation.
    let err = h
        .engine
        .cancel_request(id, h.client, "changed my mind".to_string(), key)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation { .. }));
}

#[tokio::test]
async fn test_professionals_sharing_a_key_both_accept() {
    let mut h = Harness::new();
    let id = h.create().await;
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

    let first = h
        .engine
        .accept_request(id, a, Some("1".to_string()))
        .await
        .unwrap();
    let second = h
        .engine
        .accept_request(id, b, Some("1".to_string()))
        .await
        .unwrap();
    assert!(!first.duplicate);
    assert!(!second.duplicate);
    assert_eq!(second.acceptance.professional_id, b);
    assert_ne!(first.acceptance.id, second.acceptance.id);

    // Each professional replays only their own call.
    let again = h
        .engine
        .accept_request(id, b, Some("1".to_string()))
        .await
        .unwrap();
    assert!(again.duplicate);
    assert_eq!(again.acceptance.id, second.acceptance.id);

    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    assert_eq!(aggregate.ledger.len(), 2);
    assert_eq!(
        h.transitions(),
        vec![
            Transition::RequestCreated,
            Transition::ProfessionalAccepted,
            Transition::ProfessionalAccepted,
        ]
    );
}

#[tokio::test]
async fn test_another_callers_key_grants_nothing() {
    let mut h = Harness::new();
    let id = h.create().await;
    let stranger = Uuid::now_v7();
    let key = Some("k".to_string());
    h.engine
        .cancel_request(id, h.client, "moved house".to_string(), key.clone())
        .await
        .unwrap();
    h.drain();

    let err = h
        .engine
        .cancel_request(id, stranger, "moved house".to_string(), key)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Forbidden { .. }));
    assert_eq!(err.status(), Some(RequestStatus::Cancelled));
    assert!(h.transitions().is_empty());
}

#[tokio::test]
async fn test_key_replayed_with_different_arguments_is_rejected() {
    let mut h = Harness::new();
    let id = h.create().await;
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
    h.engine.accept_request(id, a, None).await.unwrap();
    h.engine.accept_request(id, b, None).await.unwrap();
    h.drain();

    let key = Some("select-1".to_string());
    h.engine
        .select_professional(id, h.client, a, key.clone())
        .await
        .unwrap();
    let err = h
        .engine
        .select_professional(id, h.client, b, key)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation { .. }));
    assert_eq!(err.status(), Some(RequestStatus::InProgress));
    let current = h.engine.get_request(id, h.client).await.unwrap();
    assert_eq!(current.selected_professional_id, Some(a));
    assert_eq!(h.transitions(), vec![Transition::ProfessionalSelected]);

    // The same holds for create.
    let key = Some("create-9".to_string());
    h.engine
        .create_request(h.client, details(), key.clone())
        .await
        .unwrap();
    let changed = RequestDetails {
        location: "1 Harbour Road".to_string(),
        ..details()
    };
    let err = h
        .engine
        .create_request(h.client, changed, key)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation { status: None, .. }));
}

#[tokio::test]
async fn test_terminal_replay_with_same_key_succeeds() {
    let mut h = Harness::new();
    let id = h.create().await;
    let key = Some("cancel-7".to_string());
    h.engine
        .cancel_request(id, h.client, "moved house".to_string(), key.clone())
        .await
        .unwrap();
    let again = h
        .engine
        .cancel_request(id, h.client, "moved house".to_string(), key)
        .await
        .unwrap();
    assert_eq!(again.status, RequestStatus::Cancelled);

    let err = h
        .engine
        .cancel_request(id, h.client, "moved house".to_string(), None)
        .await
        .unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(
        h.transitions(),
        vec![Transition::RequestCreated, Transition::RequestCancelled]
    );
}

#[tokio::test]
async fn test_create_replay_returns_same_request() {
    let mut h = Harness::new();
    let key = Some("  create-42 ".to_string());
    let first = h
        .engine
        .create_request(h.client, details(), key.clone())
        .await
        .unwrap();
    let second = h
        .engine
        .create_request(h.client, details(), Some("create-42".to_string()))
        .await
        .unwrap();
    assert_eq!(first.id, second.id);
    assert_eq!(h.transitions(), vec![Transition::RequestCreated]);

    // Keys are scoped per client.
    let other = h
        .engine
        .create_request(Uuid::now_v7(), details(), key)
        .await
        .unwrap();
    assert_ne!(other.id, first.id);
}

#[tokio::test]
async fn test_overlong_key_is_rejected() {
    let h = Harness::new();
    let err = h
        .engine
        .create_request(h.client, details(), Some("k".repeat(MAX_IDEMPOTENCY_KEY_LEN + 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Validation { .. }));
}

#[tokio::test]
async fn test_full_event_channel_never_fails_a_transition() {
    let (tx, _rx) = lifecycle_event_channel(1);
    let engine = LifecycleEngine::new(
        Arc::new(MemoryStore::new()),
        EventEmitter::new(tx),
        LifecyclePolicy::default(),
    );
    let client = Uuid::now_v7();
    let request = engine.create_request(client, details(), None).await.unwrap();
    // The channel is now full; later transitions still commit.
    let accepted = engine
        .accept_request(request.id, Uuid::now_v7(), None)
        .await
        .unwrap();
    assert_eq!(accepted.status, RequestStatus::ActiveForAcceptance);
    let cancelled = engine
        .cancel_request(request.id, client, "budget cut".to_string(), None)
        .await
        .unwrap();
    assert_eq!(cancelled.status, RequestStatus::Cancelled);
}

#[tokio::test]
async fn test_lock_timeout_is_unavailable() {
    let h = Harness::new();
    let id = h.create().await;
    let policy = LifecyclePolicy {
        lock_timeout: Duration::from_millis(20),
        ..LifecyclePolicy::default()
    };
    let engine = LifecycleEngine::new(Arc::new(MemoryStore::new()), EventEmitter::disabled(), policy);
    let _held = engine
        .locks()
        .acquire(id, Duration::from_secs(1))
        .await
        .unwrap();
    let err = engine
        .accept_request(id, Uuid::now_v7(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::Unavailable { .. }));
    assert!(err.kind().is_retryable());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_selects_have_one_winner() {
    let mut h = Harness::new();
    let id = h.create().await;
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());
    h.engine.accept_request(id, a, None).await.unwrap();
    h.engine.accept_request(id, b, None).await.unwrap();
    h.drain();

    let select = |pro: Uuid| {
        let engine = Arc::clone(&h.engine);
        let client = h.client;
        tokio::spawn(async move { engine.select_professional(id, client, pro, None).await })
    };
    let (first, second) = tokio::join!(select(a), select(b));
    let results = [first.unwrap(), second.unwrap()];

    let winners: Vec<Uuid> = results
        .iter()
        .filter_map(|r| r.as_ref().ok())
        .filter_map(|request| request.selected_professional_id)
        .collect();
    assert_eq!(winners.len(), 1);
    let loser = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert!(is_conflict(loser));

    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    assert_eq!(aggregate.request.selected_professional_id, Some(winners[0]));
    let selected: Vec<_> = aggregate
        .ledger
        .list()
        .iter()
        .filter(|row| row.outcome == AcceptanceOutcome::Selected)
        .collect();
    assert_eq!(selected.len(), 1);
    assert_eq!(h.transitions(), vec![Transition::ProfessionalSelected]);
    assert!(h.engine.locks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_all_land() {
    let h = Harness::new();
    let id = h.create().await;
    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&h.engine);
        handles.push(tokio::spawn(async move {
            engine.accept_request(id, Uuid::now_v7(), None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    let aggregate = h.engine.list_professionals(id, h.client).await.unwrap();
    assert_eq!(aggregate.ledger.len(), 10);
    let mut sequences: Vec<i32> = aggregate.ledger.list().iter().map(|r| r.sequence).collect();
    sequences.sort_unstable();
    assert_eq!(sequences, (1..=10).collect::<Vec<_>>());
}

/// Commits a competing transition right before the engine's first commit,
/// as a second node sharing the database would.
struct RacingStore {
    inner: MemoryStore,
    competitor: Mutex<Option<Operation>>,
}

#[async_trait]
impl RequestStore for RacingStore {
    async fn load(&self, request_id: Uuid) -> Result<Option<RequestAggregate>, StoreError> {
        self.inner.load(request_id).await
    }

    async fn insert(
        &self,
        aggregate: &RequestAggregate,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        self.inner.insert(aggregate, key).await
    }

    async fn commit(
        &self,
        aggregate: &RequestAggregate,
        expected_version: i64,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        if let Some(op) = self.competitor.lock().await.take() {
            let mut theirs = self.inner.load(aggregate.id()).await?.unwrap();
            let version = theirs.request.version;
            theirs
                .apply(&op, time::OffsetDateTime::now_utc(), &LifecyclePolicy::default())
                .unwrap();
            theirs.request.version = version + 1;
            self.inner.commit(&theirs, version, None).await?;
        }
        self.inner.commit(aggregate, expected_version, key).await
    }

    async fn idempotency_record(
        &self,
        scope: Uuid,
        actor_id: Uuid,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        self.inner.idempotency_record(scope, actor_id, key).await
    }

    async fn acceptances_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<ProfessionalAcceptance>, StoreError> {
        self.inner.acceptances_by_professional(professional_id).await
    }
}

#[tokio::test]
async fn test_stale_commit_is_reevaluated_into_conflict() {
    let store = Arc::new(RacingStore {
        inner: MemoryStore::new(),
        competitor: Mutex::new(None),
    });
    let mut h = Harness::with_store(store.clone());
    let id = h.create().await;
    let pro = Uuid::now_v7();
    h.engine.accept_request(id, pro, None).await.unwrap();
    h.drain();

    *store.competitor.lock().await = Some(Operation::Cancel {
        caller_id: h.client,
        reason: "cancelled from another device".to_string(),
    });
    let err = h
        .engine
        .select_professional(id, h.client, pro, None)
        .await
        .unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(err.status(), Some(RequestStatus::Cancelled));

    let stored = store.load(id).await.unwrap().unwrap();
    assert_eq!(stored.request.selected_professional_id, None);
    assert_eq!(stored.request.version, 2);
    // Only the winner's event would be emitted by its own node.
    assert!(h.transitions().is_empty());
}

#[tokio::test]
async fn test_stale_complete_loses_to_cancel() {
    let store = Arc::new(RacingStore {
        inner: MemoryStore::new(),
        competitor: Mutex::new(None),
    });
    let mut h = Harness::with_store(store.clone());
    let id = h.create().await;
    let pro = Uuid::now_v7();
    h.engine.accept_request(id, pro, None).await.unwrap();
    h.engine
        .select_professional(id, h.client, pro, None)
        .await
        .unwrap();
    h.drain();

    *store.competitor.lock().await = Some(Operation::Cancel {
        caller_id: h.client,
        reason: "no longer needed".to_string(),
    });
    let err = h
        .engine
        .complete_by_professional(id, pro, None)
        .await
        .unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(err.status(), Some(RequestStatus::Cancelled));
    assert!(h.transitions().is_empty());

    let stored = store.load(id).await.unwrap().unwrap();
    assert_eq!(stored.status(), RequestStatus::Cancelled);
    assert_eq!(stored.request.completed_at, None);
    assert_eq!(stored.ledger.find(pro).unwrap().outcome, AcceptanceOutcome::Selected);
}

#[tokio::test]
async fn test_stale_accept_is_reapplied() {
    let store = Arc::new(RacingStore {
        inner: MemoryStore::new(),
        competitor: Mutex::new(None),
    });
    let h = Harness::with_store(store.clone());
    let id = h.create().await;
    let (a, b) = (Uuid::now_v7(), Uuid::now_v7());

    *store.competitor.lock().await = Some(Operation::Accept { professional_id: a });
    let outcome = h.engine.accept_request(id, b, None).await.unwrap();
    assert!(!outcome.duplicate);
    assert_eq!(outcome.acceptance.sequence, 2);

    let aggregate = store.load(id).await.unwrap().unwrap();
    assert_eq!(aggregate.ledger.len(), 2);
}

/// Fails the first `failures` loads as if the database were down.
struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicU32,
}

#[async_trait]
impl RequestStore for FlakyStore {
    async fn load(&self, request_id: Uuid) -> Result<Option<RequestAggregate>, StoreError> {
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        self.inner.load(request_id).await
    }

    async fn insert(
        &self,
        aggregate: &RequestAggregate,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        self.inner.insert(aggregate, key).await
    }

    async fn commit(
        &self,
        aggregate: &RequestAggregate,
        expected_version: i64,
        key: Option<&IdempotencyRecord>,
    ) -> Result<(), StoreError> {
        self.inner.commit(aggregate, expected_version, key).await
    }

    async fn idempotency_record(
        &self,
        scope: Uuid,
        actor_id: Uuid,
        key: &str,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        self.inner.idempotency_record(scope, actor_id, key).await
    }

    async fn acceptances_by_professional(
        &self,
        professional_id: Uuid,
    ) -> Result<Vec<ProfessionalAcceptance>, StoreError> {
        self.inner.acceptances_by_professional(professional_id).await
    }
}

#[tokio::test(start_paused = true)]
async fn test_store_outage_is_retried_then_surfaces() {
    let store = Arc::new(FlakyStore {
        inner: MemoryStore::new(),
        failures: AtomicU32::new(0),
    });
    let h = Harness::with_store(store.clone());
    let id = h.create().await;

    store.failures.store(2, Ordering::SeqCst);
    let accepted = h
        .engine
        .accept_request(id, Uuid::now_v7(), None)
        .await
        .unwrap();
    assert_eq!(accepted.status, RequestStatus::ActiveForAcceptance);

    store.failures.store(10, Ordering::SeqCst);
    let err = h.engine.get_request(id, h.client).await.unwrap_err();
    assert!(matches!(err, LifecycleError::Unavailable { status: None, .. }));
}
