//! Freshness and retention policies

use crate::error::{CacheError, CacheResult};
use std::time::Duration;

/// Per-entry freshness, retention, and polling configuration
///
/// `stale_time` is how long a fetched value is considered fresh;
/// `gc_time` is how long an entry with no subscribers is retained before
/// eviction. A retention window shorter than the freshness window would
/// evict data while it is still fresh, so construction rejects it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    stale_time: Duration,
    gc_time: Duration,
    poll_interval: Option<Duration>,
}

impl CachePolicy {
    pub fn new(stale_time: Duration, gc_time: Duration) -> CacheResult<Self> {
        if gc_time < stale_time {
            return Err(CacheError::InvalidPolicy {
                stale_ms: stale_time.as_millis() as u64,
                gc_ms: gc_time.as_millis() as u64,
            });
        }
        Ok(Self {
            stale_time,
            gc_time,
            poll_interval: None,
        })
    }

    /// Refetch in the background at this interval while the entry has
    /// subscribers
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    pub fn gc_time(&self) -> Duration {
        self.gc_time
    }

    pub fn poll_interval(&self) -> Option<Duration> {
        self.poll_interval
    }
}

impl Default for CachePolicy {
    /// Always-stale with a five minute retention window; entries created
    /// outside an explicit `get` (optimistic targets, bare subscriptions)
    /// start from this and pick up a real policy on their first read.
    fn default() -> Self {
        Self {
            stale_time: Duration::ZERO,
            gc_time: Duration::from_secs(300),
            poll_interval: None,
        }
    }
}

/// Default policies per entity, shared by all consumers
pub mod defaults {
    use super::CachePolicy;
    use std::time::Duration;

    /// Course detail and roster change rarely: 5min fresh, 30min retained
    pub fn course() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(300), Duration::from_secs(1800))
            .expect("valid default policy")
    }

    /// Thread listings move quickly during office hours: 30s fresh, 5min retained
    pub fn threads() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(30), Duration::from_secs(300))
            .expect("valid default policy")
    }

    /// Dashboards: 30s fresh, 5min retained
    pub fn dashboard() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(30), Duration::from_secs(300))
            .expect("valid default policy")
    }

    /// Notifications: 15s fresh, polled every 30s while visible
    pub fn notifications() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(15), Duration::from_secs(300))
            .expect("valid default policy")
            .with_poll_interval(Duration::from_secs(30))
    }

    /// Search results: 1min fresh, 5min retained
    pub fn search() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(60), Duration::from_secs(300))
            .expect("valid default policy")
    }

    /// Course metrics sparklines: 1min fresh, 10min retained
    pub fn course_metrics() -> CachePolicy {
        CachePolicy::new(Duration::from_secs(60), Duration::from_secs(600))
            .expect("valid default policy")
    }
}
