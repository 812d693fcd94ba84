//! Cache entry state

use crate::error::ErrorInfo;
use crate::key::QueryKey;
use crate::policy::CachePolicy;
use crate::source::Fetcher;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use tokio::time::Instant;

/// Fetch lifecycle of one cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStatus {
    Idle,
    Pending,
    Success,
    Error,
}

/// Read-only view of one cache entry
///
/// Returned by `get` and delivered to subscribers. While a refetch is in
/// flight the snapshot carries the last known `value` alongside
/// `Pending` (stale-while-revalidate); after a failed fetch it carries
/// the last good `value` alongside `Error`.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    pub key: QueryKey,
    pub value: Option<Value>,
    pub status: FetchStatus,
    pub error: Option<ErrorInfo>,
    pub fetched_at: Option<Instant>,
}

impl EntrySnapshot {
    /// Deserialize the cached value into a concrete type
    pub fn value_as<T: serde::de::DeserializeOwned>(&self) -> Option<T> {
        self.value
            .as_ref()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Internal entry state, owned exclusively by the store
pub(crate) struct CacheEntry {
    pub(crate) key: QueryKey,
    pub(crate) value: Option<Value>,
    pub(crate) status: FetchStatus,
    pub(crate) error: Option<ErrorInfo>,
    pub(crate) fetched_at: Option<Instant>,
    pub(crate) policy: CachePolicy,
    /// Marked stale by invalidation; cleared by the next successful fetch
    pub(crate) invalidated: bool,
    pub(crate) in_flight: bool,
    /// Invalidated while a fetch was in flight; one follow-up fetch runs
    /// after the current one writes
    pub(crate) refetch_queued: bool,
    /// Last fetcher seen for this key, retained for invalidation-driven
    /// refetches and background polling
    pub(crate) fetcher: Option<Fetcher>,
    pub(crate) subscriber_count: usize,
    /// Bumped on every subscribe/unsubscribe; a pending GC task only
    /// evicts if the epoch it captured is still current
    pub(crate) sub_epoch: u64,
    /// Bumped when polling starts or must stop
    pub(crate) poll_epoch: u64,
    pub(crate) polling: bool,
    watch_tx: watch::Sender<EntrySnapshot>,
}

impl CacheEntry {
    pub(crate) fn new(key: QueryKey, policy: CachePolicy) -> Self {
        let initial = EntrySnapshot {
            key: key.clone(),
            value: None,
            status: FetchStatus::Idle,
            error: None,
            fetched_at: None,
        };
        let (watch_tx, _) = watch::channel(initial);
        Self {
            key,
            value: None,
            status: FetchStatus::Idle,
            error: None,
            fetched_at: None,
            policy,
            invalidated: false,
            in_flight: false,
            refetch_queued: false,
            fetcher: None,
            subscriber_count: 0,
            sub_epoch: 0,
            poll_epoch: 0,
            polling: false,
            watch_tx,
        }
    }

    pub(crate) fn snapshot(&self) -> EntrySnapshot {
        EntrySnapshot {
            key: self.key.clone(),
            value: self.value.clone(),
            status: self.status,
            error: self.error.clone(),
            fetched_at: self.fetched_at,
        }
    }

    /// Whether a fetch should be scheduled for this entry right now
    pub(crate) fn needs_fetch(&self, now: Instant) -> bool {
        if self.in_flight {
            return false;
        }
        if self.invalidated || self.status == FetchStatus::Error {
            return true;
        }
        match self.fetched_at {
            None => true,
            Some(at) => now.duration_since(at) > self.policy.stale_time(),
        }
    }

    /// Transition into a pending fetch, keeping the last known value
    pub(crate) fn begin_fetch(&mut self) {
        self.in_flight = true;
        self.status = FetchStatus::Pending;
    }

    /// Push the current state to all subscribers
    pub(crate) fn publish(&self) {
        self.watch_tx.send_replace(self.snapshot());
    }

    pub(crate) fn watch(&self) -> watch::Receiver<EntrySnapshot> {
        self.watch_tx.subscribe()
    }
}
