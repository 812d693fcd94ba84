//! Cache store behavior under a paused tokio clock
//!
//! Freshness, garbage collection, and polling boundaries are asserted
//! with `tokio::time::advance`, so every timing check is exact.

use quokka_cache::{CachePolicy, CacheStore, FetchStatus, Fetcher, InvalidationScope, QueryKeys};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::advance;

fn policy(stale_ms: u64, gc_ms: u64) -> CachePolicy {
    CachePolicy::new(
        Duration::from_millis(stale_ms),
        Duration::from_millis(gc_ms),
    )
    .unwrap()
}

/// Fetcher that resolves immediately with a version counter
fn counting_fetcher(counter: Arc<AtomicU32>) -> Fetcher {
    Arc::new(move || {
        let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move { Ok(json!({ "version": version })) })
    })
}

/// Fetcher that takes `delay` of virtual time to resolve
fn slow_fetcher(counter: Arc<AtomicU32>, delay: Duration) -> Fetcher {
    Arc::new(move || {
        let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            Ok(json!({ "version": version }))
        })
    })
}

/// Let spawned fetch/gc/poll tasks run without advancing the clock
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn test_concurrent_gets_share_one_fetch() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(Arc::clone(&counter));

    let first = store.get(&key, policy(1000, 5000), Arc::clone(&fetcher));
    let second = store.get(&key, policy(1000, 5000), fetcher);

    assert_eq!(first.status, FetchStatus::Pending);
    assert_eq!(second.status, FetchStatus::Pending);

    settle().await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));
}

#[tokio::test(start_paused = true)]
async fn test_stale_while_revalidate() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(Arc::clone(&counter));

    store.get(&key, policy(1000, 5000), Arc::clone(&fetcher));
    settle().await;

    advance(Duration::from_millis(1500)).await;

    // stale read returns the old value immediately while refetching
    let snapshot = store.get(&key, policy(1000, 5000), fetcher);
    assert_eq!(snapshot.status, FetchStatus::Pending);
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));

    settle().await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "version": 2 })));
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_fresh_hit_serves_from_cache() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(Arc::clone(&counter));

    store.get(&key, policy(1000, 5000), Arc::clone(&fetcher));
    settle().await;

    advance(Duration::from_millis(500)).await;

    let snapshot = store.get(&key, policy(1000, 5000), fetcher);
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_gc_evicts_at_exact_boundary() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(counter);

    store.get(&key, policy(1000, 5000), fetcher);
    let sub = store.subscribe(&key);
    settle().await;

    drop(sub);
    settle().await;

    advance(Duration::from_millis(4999)).await;
    settle().await;
    assert!(store.contains(&key), "entry evicted before gc_time elapsed");

    advance(Duration::from_millis(2)).await;
    settle().await;
    assert!(!store.contains(&key), "entry survived past gc_time");
}

#[tokio::test(start_paused = true)]
async fn test_resubscribe_cancels_pending_eviction() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(counter);

    store.get(&key, policy(1000, 5000), fetcher);
    let sub = store.subscribe(&key);
    settle().await;

    drop(sub);
    advance(Duration::from_millis(4000)).await;

    // resubscribing before gc_time elapses keeps the entry alive
    let sub = store.subscribe(&key);
    advance(Duration::from_millis(2000)).await;
    settle().await;
    assert!(store.contains(&key));

    // dropping again restarts the countdown from scratch
    drop(sub);
    advance(Duration::from_millis(4999)).await;
    settle().await;
    assert!(store.contains(&key));

    advance(Duration::from_millis(2)).await;
    settle().await;
    assert!(!store.contains(&key));
}

#[tokio::test(start_paused = true)]
async fn test_fetch_failure_keeps_last_good_value() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = Arc::clone(&counter);

    // first call succeeds, second fails, third succeeds
    let fetcher: Fetcher = Arc::new(move || {
        let call = counter_clone.fetch_add(1, Ordering::SeqCst) + 1;
        Box::pin(async move {
            if call == 2 {
                Err(quokka_cache::SourceError::Unavailable(
                    "backend down".to_string(),
                ))
            } else {
                Ok(json!({ "version": call }))
            }
        })
    });

    store.get(&key, policy(1000, 5000), Arc::clone(&fetcher));
    settle().await;

    advance(Duration::from_millis(1500)).await;
    store.get(&key, policy(1000, 5000), Arc::clone(&fetcher));
    settle().await;

    // fail soft: error surfaced, stale value still displayed
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Error);
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));
    let error = snapshot.error.unwrap();
    assert!(error.message.contains("backend down"));

    // an errored entry refetches on the next read and recovers
    let snapshot = store.get(&key, policy(1000, 5000), fetcher);
    assert_eq!(snapshot.status, FetchStatus::Pending);
    settle().await;

    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "version": 3 })));
    assert!(snapshot.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_polling_runs_while_subscribed_and_stops_after() {
    let store = CacheStore::new();
    let key = QueryKeys::notifications("S1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(Arc::clone(&counter));

    let poll_policy = policy(1000, 300_000).with_poll_interval(Duration::from_millis(30_000));
    store.get(&key, poll_policy, fetcher);
    let sub = store.subscribe(&key);
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    advance(Duration::from_millis(30_000)).await;
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    advance(Duration::from_millis(30_000)).await;
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 3);

    drop(sub);
    settle().await;

    advance(Duration::from_millis(90_000)).await;
    settle().await;
    assert_eq!(
        counter.load(Ordering::SeqCst),
        3,
        "polling continued after last unsubscribe"
    );

    // resubscribing resumes polling
    let _sub = store.subscribe(&key);
    settle().await;
    advance(Duration::from_millis(30_000)).await;
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn test_invalidation_during_flight_runs_one_followup() {
    let store = CacheStore::new();
    let key = QueryKeys::course_threads("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = slow_fetcher(Arc::clone(&counter), Duration::from_millis(100));

    let _sub = store.subscribe(&key);
    store.get(&key, policy(1000, 5000), fetcher);
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // invalidated mid-flight: the running fetch still writes its result
    store.invalidate(InvalidationScope::Keys(vec![key.clone()]));
    settle().await;

    advance(Duration::from_millis(100)).await;
    settle().await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));
    assert_eq!(snapshot.status, FetchStatus::Pending, "follow-up not scheduled");
    assert_eq!(counter.load(Ordering::SeqCst), 2);

    advance(Duration::from_millis(100)).await;
    settle().await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "version": 2 })));

    // exactly one follow-up, not a refetch storm
    advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_invalidated_idle_entry_refetches_on_next_get() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(Arc::clone(&counter));

    store.get(&key, policy(60_000, 300_000), Arc::clone(&fetcher));
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    // no subscribers: invalidation marks stale without fetching
    store.invalidate(InvalidationScope::Keys(vec![key.clone()]));
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(
        store.snapshot(&key).unwrap().value,
        Some(json!({ "version": 1 }))
    );

    // the next read refetches despite being inside stale_time
    store.get(&key, policy(60_000, 300_000), fetcher);
    settle().await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(
        store.snapshot(&key).unwrap().value,
        Some(json!({ "version": 2 }))
    );
}

#[tokio::test(start_paused = true)]
async fn test_unsubscribe_does_not_cancel_inflight_fetch() {
    let store = CacheStore::new();
    let key = QueryKeys::thread("t1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = slow_fetcher(Arc::clone(&counter), Duration::from_millis(100));

    let sub = store.subscribe(&key);
    store.get(&key, policy(1000, 300_000), fetcher);
    settle().await;

    drop(sub);
    settle().await;

    // the fetch completes and is cached for future subscribers
    advance(Duration::from_millis(100)).await;
    settle().await;
    let snapshot = store.snapshot(&key).unwrap();
    assert_eq!(snapshot.status, FetchStatus::Success);
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));
    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_subscription_receives_fetch_updates() {
    let store = CacheStore::new();
    let key = QueryKeys::course("C1");
    let counter = Arc::new(AtomicU32::new(0));
    let fetcher = counting_fetcher(counter);

    let mut sub = store.subscribe(&key);
    store.get(&key, policy(1000, 5000), fetcher);

    // Pending first, then Success once the fetch lands
    let mut snapshot = sub.changed().await;
    while snapshot.status != FetchStatus::Success {
        snapshot = sub.changed().await;
    }
    assert_eq!(snapshot.value, Some(json!({ "version": 1 })));
}
