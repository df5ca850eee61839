//! Lease state machine tests against the in-memory store.

use scribeq::error::Error;
use scribeq::lease::LeaseManager;
use scribeq::model::{NewWorkItem, Status, WorkId, WorkItem};
use scribeq::store::{MemoryStore, WorkStore};
use std::sync::Arc;

async fn seed(store: &MemoryStore, group: &str, language: &str) -> WorkItem {
    store
        .insert(
            NewWorkItem::new(group, language)
                .source_locator(format!("https://example.net/{group}.mp3"))
                .cache_locator(format!("/cache/{language}/{group}.mp3")),
        )
        .await
        .unwrap()
}

fn manager(store: &Arc<MemoryStore>) -> LeaseManager {
    LeaseManager::new(Arc::clone(store) as Arc<dyn WorkStore>)
}

#[tokio::test]
async fn claim_then_submit_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;
    let leases = manager(&store);

    let claimed = leases.claim(item.id).await.unwrap();
    assert_eq!(claimed.status, Status::InProgress);
    assert!(claimed.claimed_at.is_some());

    let done = leases.submit(item.id, "/vtt/a.vtt").await.unwrap();
    assert_eq!(done.status, Status::Complete);
    assert_eq!(done.result_locator.as_deref(), Some("/vtt/a.vtt"));

    // Terminal: no further claims.
    let err = leases.claim(item.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyComplete(id) if id == item.id));
}

#[tokio::test]
async fn second_claim_reports_already_in_progress() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;
    let leases = manager(&store);

    leases.claim(item.id).await.unwrap();
    let err = leases.claim(item.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyInProgress(id) if id == item.id));
}

#[tokio::test]
async fn concurrent_claims_have_exactly_one_winner() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;

    let mut handles = Vec::new();
    for _ in 0..16 {
        let store = Arc::clone(&store);
        let id = item.id;
        handles.push(tokio::spawn(async move {
            manager(&store).claim(id).await
        }));
    }

    let mut wins = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(claimed) => {
                assert_eq!(claimed.status, Status::InProgress);
                wins += 1;
            }
            Err(Error::AlreadyInProgress(_)) => conflicts += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(wins, 1);
    assert_eq!(conflicts, 15);
}

#[tokio::test]
async fn cancel_returns_item_to_pool_once() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;
    let leases = manager(&store);

    leases.claim(item.id).await.unwrap();
    let cancelled = leases.cancel(item.id).await.unwrap();
    assert_eq!(cancelled.status, Status::Unassigned);
    assert!(cancelled.claimed_at.is_none());
    assert!(cancelled.result_locator.is_none());

    // Eligible again.
    let again = store.sample_unassigned("de", "Podcast A").await.unwrap();
    assert_eq!(again.unwrap().id, item.id);

    // Second cancel crosses the idempotence boundary.
    let err = leases.cancel(item.id).await.unwrap_err();
    assert!(matches!(err, Error::NotInProgress(id) if id == item.id));
}

#[tokio::test]
async fn cancel_after_completion_reports_already_complete() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;
    let leases = manager(&store);

    leases.claim(item.id).await.unwrap();
    leases.submit(item.id, "/vtt/a.vtt").await.unwrap();

    let err = leases.cancel(item.id).await.unwrap_err();
    assert!(matches!(err, Error::AlreadyComplete(id) if id == item.id));
}

#[tokio::test]
async fn submit_without_lease_reports_not_in_progress() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;
    let leases = manager(&store);

    let err = leases.submit(item.id, "/vtt/a.vtt").await.unwrap_err();
    assert!(matches!(err, Error::NotInProgress(id) if id == item.id));
    assert_eq!(store.get(item.id).await.unwrap().status, Status::Unassigned);
}

#[tokio::test]
async fn unknown_item_reports_not_found() {
    let store = Arc::new(MemoryStore::new());
    let leases = manager(&store);

    let err = leases.claim(WorkId::new()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn illegal_transition_fails_without_mutating() {
    let store = Arc::new(MemoryStore::new());
    let item = seed(&store, "Podcast A", "de").await;

    // Unassigned -> Complete is not in the transition table.
    let err = store
        .compare_and_set_status(item.id, Status::Unassigned, Status::Complete, Some("/vtt/a.vtt"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));
    assert_eq!(store.get(item.id).await.unwrap().status, Status::Unassigned);

    // Complete -> anything is not either.
    let leases = manager(&store);
    leases.claim(item.id).await.unwrap();
    leases.submit(item.id, "/vtt/a.vtt").await.unwrap();
    for to in [Status::Unassigned, Status::InProgress] {
        let err = store
            .compare_and_set_status(item.id, Status::Complete, to, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }
    let after = store.get(item.id).await.unwrap();
    assert_eq!(after.status, Status::Complete);
    assert_eq!(after.result_locator.as_deref(), Some("/vtt/a.vtt"));
}

#[tokio::test]
async fn reclaim_cancels_only_leases_past_the_threshold() {
    let store = Arc::new(MemoryStore::new());
    let old = seed(&store, "Podcast A", "de").await;
    let fresh = seed(&store, "Podcast B", "de").await;
    let leases = manager(&store);

    leases.claim(old.id).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    leases.claim(fresh.id).await.unwrap();

    let reclaimed = leases
        .reclaim_stale(chrono::Duration::milliseconds(50))
        .await
        .unwrap();

    assert_eq!(reclaimed, vec![old.id]);
    assert_eq!(store.get(old.id).await.unwrap().status, Status::Unassigned);
    assert_eq!(store.get(fresh.id).await.unwrap().status, Status::InProgress);
}
