//! In-memory cache store
//!
//! Owns the key→entry map and everything that touches it: deduplicated
//! async fetches, stale-while-revalidate reads, scoped invalidation,
//! optimistic updates, reference-counted subscriptions, garbage
//! collection, and background polling.
//!
//! All in-memory operations take one lock over the map and never hold it
//! across an await; fetches run in spawned tasks and re-acquire the lock
//! only to apply their result (last write wins per key).

use crate::entry::{CacheEntry, EntrySnapshot, FetchStatus};
use crate::error::{ErrorInfo, SourceError};
use crate::key::QueryKey;
use crate::metrics::CacheMetrics;
use crate::mutation::OptimisticUpdate;
use crate::policy::CachePolicy;
use crate::source::Fetcher;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Predicate form of invalidation matching
pub type KeyPredicate = Box<dyn Fn(&QueryKey) -> bool + Send + Sync>;

/// Which entries an invalidation touches
///
/// `Keys` is the form mutations should produce: an explicit, narrow set
/// computed from the mutation's result payload. `Prefix` and `Where`
/// match broadly and exist for the rare change that genuinely affects a
/// whole entity class; reaching for them from a scoped mutation refetches
/// unrelated users' data and shows up as load the backend never needed to
/// serve.
pub enum InvalidationScope {
    Keys(Vec<QueryKey>),
    Prefix(QueryKey),
    Where(KeyPredicate),
}

impl InvalidationScope {
    fn matches(&self, key: &QueryKey) -> bool {
        match self {
            Self::Keys(keys) => keys.iter().any(|k| k == key),
            Self::Prefix(prefix) => key.starts_with(prefix),
            Self::Where(pred) => pred(key),
        }
    }
}

/// Pre-mutation values for every optimistic target, captured under one
/// lock before the first update is applied
#[derive(Debug, Clone)]
pub struct MutationSnapshot {
    entries: Vec<(QueryKey, Option<Value>)>,
}

impl MutationSnapshot {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QueryKey> {
        self.entries.iter().map(|(key, _)| key)
    }
}

/// Handle to one subscribed cache entry
///
/// Holds a subscriber reference: while any subscription for a key is
/// alive the entry is never garbage collected and background polling (if
/// configured) keeps running. Dropping the last subscription starts the
/// entry's GC countdown and stops polling.
pub struct Subscription {
    rx: watch::Receiver<EntrySnapshot>,
    _guard: SubscriberGuard,
}

impl Subscription {
    /// Current state of the entry
    pub fn current(&self) -> EntrySnapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next state change and return it
    pub async fn changed(&mut self) -> EntrySnapshot {
        // while this subscription is alive the entry cannot be evicted, so
        // a closed channel only means the store itself was dropped
        let _ = self.rx.changed().await;
        self.rx.borrow().clone()
    }
}

struct SubscriberGuard {
    store: Weak<StoreInner>,
    key: QueryKey,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        let Some(inner) = self.store.upgrade() else {
            return;
        };
        let mut gc: Option<(Duration, u64)> = None;
        {
            let mut entries = lock_entries(&inner);
            let Some(entry) = entries.get_mut(&self.key) else {
                return;
            };
            entry.subscriber_count = entry.subscriber_count.saturating_sub(1);
            entry.sub_epoch += 1;
            if entry.subscriber_count == 0 {
                entry.poll_epoch += 1;
                entry.polling = false;
                gc = Some((entry.policy.gc_time(), entry.sub_epoch));
            }
        }
        if let Some((gc_time, epoch)) = gc {
            debug!(key = %self.key, gc_ms = gc_time.as_millis() as u64, "last subscriber gone, gc countdown started");
            // a guard can be dropped outside the runtime during consumer
            // teardown; the entry then lingers until the store is dropped
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                let key = self.key.clone();
                handle.spawn(async move {
                    tokio::time::sleep(gc_time).await;
                    StoreInner::evict_if_idle(&inner, &key, epoch);
                });
            }
        }
    }
}

/// The authoritative in-memory cache
///
/// Instantiated explicitly and passed by reference to consumers — there
/// is no process-wide singleton, so tests and embedded views can each own
/// an independent store.
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<StoreInner>,
}

#[derive(Default)]
struct StoreInner {
    entries: Mutex<HashMap<QueryKey, CacheEntry>>,
    metrics: CacheMetrics,
}

fn lock_entries(inner: &StoreInner) -> MutexGuard<'_, HashMap<QueryKey, CacheEntry>> {
    inner.entries.lock().unwrap_or_else(PoisonError::into_inner)
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current state for `key`, scheduling a fetch if the entry
    /// is missing, stale, errored, or invalidated
    ///
    /// This is a synchronous, non-blocking read: while a fetch is in
    /// flight the snapshot carries the last known value with a `Pending`
    /// status. Concurrent callers for the same key share one in-flight
    /// fetch. The fetcher is retained on the entry so invalidation and
    /// polling can refetch later.
    pub fn get(&self, key: &QueryKey, policy: CachePolicy, fetcher: Fetcher) -> EntrySnapshot {
        let now = Instant::now();

        let (snapshot, to_fetch, to_poll) = {
            let mut entries = lock_entries(&self.inner);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), policy.clone()));
            entry.policy = policy;
            entry.fetcher = Some(Arc::clone(&fetcher));

            let mut to_fetch = None;
            if entry.needs_fetch(now) {
                if entry.value.is_some() {
                    self.inner.metrics.record_stale_hit(key);
                    debug!(key = %key, "cache stale, revalidating");
                } else {
                    self.inner.metrics.record_miss(key);
                    debug!(key = %key, "cache miss");
                }
                entry.begin_fetch();
                entry.publish();
                to_fetch = Some(fetcher);
            } else if entry.in_flight {
                debug!(key = %key, "fetch already in flight, sharing it");
            } else {
                self.inner.metrics.record_hit(key);
                debug!(key = %key, "cache hit");
            }

            (entry.snapshot(), to_fetch, maybe_start_poll(entry))
        };

        if let Some(fetcher) = to_fetch {
            StoreInner::spawn_fetch(&self.inner, key.clone(), fetcher);
        }
        if let Some((interval, epoch)) = to_poll {
            StoreInner::spawn_poll(&self.inner, key.clone(), interval, epoch);
        }
        snapshot
    }

    /// Mark matching entries stale without clearing their values
    ///
    /// Entries with live subscribers refetch immediately with their
    /// retained fetcher; idle entries refetch on their next `get`. An
    /// entry whose fetch is already in flight lets that fetch write, then
    /// runs one follow-up fetch.
    pub fn invalidate(&self, scope: InvalidationScope) {
        let mut refetches: Vec<(QueryKey, Fetcher)> = Vec::new();
        {
            let mut entries = lock_entries(&self.inner);
            for (key, entry) in entries.iter_mut() {
                if !scope.matches(key) {
                    continue;
                }
                self.inner.metrics.record_invalidation(key);
                entry.invalidated = true;

                if entry.in_flight {
                    entry.refetch_queued = true;
                    debug!(key = %key, "invalidated while fetch in flight, follow-up queued");
                    continue;
                }

                if entry.subscriber_count > 0 {
                    if let Some(fetcher) = entry.fetcher.clone() {
                        entry.begin_fetch();
                        entry.publish();
                        refetches.push((key.clone(), fetcher));
                        continue;
                    }
                }
                debug!(key = %key, "entry marked stale");
            }
        }
        for (key, fetcher) in refetches {
            StoreInner::spawn_fetch(&self.inner, key, fetcher);
        }
    }

    /// Apply an immediate local update to `key` without marking the entry
    /// as fetched; returns the prior value for rollback
    pub fn set_optimistic<F>(&self, key: &QueryKey, updater: F) -> Option<Value>
    where
        F: FnOnce(Option<&Value>) -> Value,
    {
        let mut entries = lock_entries(&self.inner);
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| CacheEntry::new(key.clone(), CachePolicy::default()));
        let previous = entry.value.take();
        entry.value = Some(updater(previous.as_ref()));
        entry.publish();
        debug!(key = %key, "optimistic update applied");
        previous
    }

    /// Apply every optimistic update under one lock, snapshotting prior
    /// values so a failed mutation can restore all targets together
    pub fn apply_optimistic(&self, updates: &[OptimisticUpdate]) -> MutationSnapshot {
        let mut entries = lock_entries(&self.inner);
        let mut captured = Vec::with_capacity(updates.len());
        for update in updates {
            let entry = entries
                .entry(update.key.clone())
                .or_insert_with(|| CacheEntry::new(update.key.clone(), CachePolicy::default()));
            let previous = entry.value.take();
            entry.value = Some((update.apply)(previous.as_ref()));
            entry.publish();
            captured.push((update.key.clone(), previous));
        }
        MutationSnapshot { entries: captured }
    }

    /// Restore every value captured in `snapshot`, all under one lock
    pub fn restore(&self, snapshot: MutationSnapshot) {
        let mut entries = lock_entries(&self.inner);
        for (key, previous) in snapshot.entries {
            if let Some(entry) = entries.get_mut(&key) {
                self.inner.metrics.record_rollback(&key);
                entry.value = previous;
                entry.publish();
                debug!(key = %key, "optimistic update rolled back");
            }
        }
    }

    /// Subscribe to `key`, incrementing its reference count
    ///
    /// A pending GC countdown for the entry is cancelled. If the entry's
    /// policy polls and this is the first subscriber, background polling
    /// starts.
    pub fn subscribe(&self, key: &QueryKey) -> Subscription {
        let (rx, to_poll) = {
            let mut entries = lock_entries(&self.inner);
            let entry = entries
                .entry(key.clone())
                .or_insert_with(|| CacheEntry::new(key.clone(), CachePolicy::default()));
            entry.subscriber_count += 1;
            entry.sub_epoch += 1;
            (entry.watch(), maybe_start_poll(entry))
        };
        if let Some((interval, epoch)) = to_poll {
            StoreInner::spawn_poll(&self.inner, key.clone(), interval, epoch);
        }
        Subscription {
            rx,
            _guard: SubscriberGuard {
                store: Arc::downgrade(&self.inner),
                key: key.clone(),
            },
        }
    }

    /// Current state for `key` without scheduling anything
    pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        lock_entries(&self.inner).get(key).map(|e| e.snapshot())
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        lock_entries(&self.inner).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock_entries(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        lock_entries(&self.inner).is_empty()
    }
}

/// Start polling for an entry if its policy asks for it, it has
/// subscribers, and no poll task is running. Caller must hold the lock.
fn maybe_start_poll(entry: &mut CacheEntry) -> Option<(Duration, u64)> {
    let interval = entry.policy.poll_interval()?;
    if entry.subscriber_count == 0 || entry.polling {
        return None;
    }
    entry.polling = true;
    entry.poll_epoch += 1;
    Some((interval, entry.poll_epoch))
}

impl StoreInner {
    fn spawn_fetch(inner: &Arc<StoreInner>, key: QueryKey, fetcher: Fetcher) {
        let inner = Arc::clone(inner);
        tokio::spawn(async move {
            let result = fetcher().await;
            StoreInner::apply_fetch_result(&inner, &key, result);
        });
    }

    fn apply_fetch_result(inner: &Arc<StoreInner>, key: &QueryKey, result: Result<Value, SourceError>) {
        let mut follow_up: Option<Fetcher> = None;
        {
            let mut entries = lock_entries(inner);
            // evicted while the fetch was in flight; drop the result
            let Some(entry) = entries.get_mut(key) else {
                return;
            };
            entry.in_flight = false;

            match result {
                Ok(value) => {
                    entry.value = Some(value);
                    entry.fetched_at = Some(Instant::now());
                    entry.status = FetchStatus::Success;
                    entry.error = None;
                    entry.invalidated = false;
                    inner.metrics.record_fetch(key);
                    debug!(key = %key, "fetch complete");
                }
                Err(err) => {
                    warn!(key = %key, error = %err, "fetch failed, keeping last good value");
                    entry.status = FetchStatus::Error;
                    entry.error = Some(ErrorInfo::from_source(&err));
                    inner.metrics.record_fetch_error(key);
                }
            }

            if entry.refetch_queued {
                entry.refetch_queued = false;
                if entry.subscriber_count > 0 {
                    if let Some(fetcher) = entry.fetcher.clone() {
                        entry.begin_fetch();
                        follow_up = Some(fetcher);
                    }
                }
            }
            entry.publish();
        }

        if let Some(fetcher) = follow_up {
            StoreInner::spawn_fetch(inner, key.clone(), fetcher);
        }
    }

    fn spawn_poll(inner: &Arc<StoreInner>, key: QueryKey, interval: Duration, epoch: u64) {
        let inner = Arc::clone(inner);
        debug!(key = %key, interval_ms = interval.as_millis() as u64, "background polling started");
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // the first tick of a tokio interval fires immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let fetcher = {
                    let mut entries = lock_entries(&inner);
                    let Some(entry) = entries.get_mut(&key) else {
                        break;
                    };
                    if entry.subscriber_count == 0 || entry.poll_epoch != epoch {
                        debug!(key = %key, "background polling stopped");
                        break;
                    }
                    if entry.in_flight {
                        None
                    } else {
                        match entry.fetcher.clone() {
                            Some(fetcher) => {
                                entry.begin_fetch();
                                entry.publish();
                                Some(fetcher)
                            }
                            None => None,
                        }
                    }
                };
                if let Some(fetcher) = fetcher {
                    let result = fetcher().await;
                    StoreInner::apply_fetch_result(&inner, &key, result);
                }
            }
        });
    }

    fn evict_if_idle(inner: &Arc<StoreInner>, key: &QueryKey, epoch: u64) {
        let mut entries = lock_entries(inner);
        let Some(entry) = entries.get(key) else {
            return;
        };
        if entry.subscriber_count == 0 && entry.sub_epoch == epoch {
            entries.remove(key);
            inner.metrics.record_eviction(key);
            debug!(key = %key, "entry evicted");
        }
    }
}
