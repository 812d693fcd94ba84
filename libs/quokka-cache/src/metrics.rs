//! Cache metrics for observability

use crate::key::QueryKey;
use prometheus::{CounterVec, Opts, Registry};
use std::sync::OnceLock;

static METRICS: OnceLock<CacheMetricsInner> = OnceLock::new();

struct CacheMetricsInner {
    hits: CounterVec,
    stale_hits: CounterVec,
    misses: CounterVec,
    fetches: CounterVec,
    fetch_errors: CounterVec,
    invalidations: CounterVec,
    evictions: CounterVec,
    rollbacks: CounterVec,
}

impl CacheMetricsInner {
    fn new() -> Self {
        Self {
            hits: CounterVec::new(
                Opts::new("quokka_cache_hits_total", "Total fresh cache hits"),
                &["entity"],
            )
            .expect("valid metric definition"),
            stale_hits: CounterVec::new(
                Opts::new(
                    "quokka_cache_stale_hits_total",
                    "Total stale hits served while revalidating",
                ),
                &["entity"],
            )
            .expect("valid metric definition"),
            misses: CounterVec::new(
                Opts::new("quokka_cache_misses_total", "Total cache misses"),
                &["entity"],
            )
            .expect("valid metric definition"),
            fetches: CounterVec::new(
                Opts::new("quokka_cache_fetches_total", "Total completed fetches"),
                &["entity"],
            )
            .expect("valid metric definition"),
            fetch_errors: CounterVec::new(
                Opts::new("quokka_cache_fetch_errors_total", "Total failed fetches"),
                &["entity"],
            )
            .expect("valid metric definition"),
            invalidations: CounterVec::new(
                Opts::new(
                    "quokka_cache_invalidations_total",
                    "Total entries marked stale by invalidation",
                ),
                &["entity"],
            )
            .expect("valid metric definition"),
            evictions: CounterVec::new(
                Opts::new(
                    "quokka_cache_evictions_total",
                    "Total entries evicted by garbage collection",
                ),
                &["entity"],
            )
            .expect("valid metric definition"),
            rollbacks: CounterVec::new(
                Opts::new(
                    "quokka_cache_rollbacks_total",
                    "Total optimistic values restored after failed mutations",
                ),
                &["entity"],
            )
            .expect("valid metric definition"),
        }
    }

    fn register(&self, registry: &Registry) -> Result<(), prometheus::Error> {
        registry.register(Box::new(self.hits.clone()))?;
        registry.register(Box::new(self.stale_hits.clone()))?;
        registry.register(Box::new(self.misses.clone()))?;
        registry.register(Box::new(self.fetches.clone()))?;
        registry.register(Box::new(self.fetch_errors.clone()))?;
        registry.register(Box::new(self.invalidations.clone()))?;
        registry.register(Box::new(self.evictions.clone()))?;
        registry.register(Box::new(self.rollbacks.clone()))?;
        Ok(())
    }
}

fn get_metrics() -> &'static CacheMetricsInner {
    METRICS.get_or_init(CacheMetricsInner::new)
}

/// Cache metrics wrapper, labeled by the key's entity name
#[derive(Clone, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn new() -> Self {
        Self
    }

    /// Register metrics with a Prometheus registry
    pub fn register(registry: &Registry) -> Result<(), prometheus::Error> {
        get_metrics().register(registry)
    }

    pub fn record_hit(&self, key: &QueryKey) {
        get_metrics().hits.with_label_values(&[key.entity()]).inc();
    }

    pub fn record_stale_hit(&self, key: &QueryKey) {
        get_metrics()
            .stale_hits
            .with_label_values(&[key.entity()])
            .inc();
    }

    pub fn record_miss(&self, key: &QueryKey) {
        get_metrics()
            .misses
            .with_label_values(&[key.entity()])
            .inc();
    }

    pub fn record_fetch(&self, key: &QueryKey) {
        get_metrics()
            .fetches
            .with_label_values(&[key.entity()])
            .inc();
    }

    pub fn record_fetch_error(&self, key: &QueryKey) {
        get_metrics()
            .fetch_errors
            .with_label_values(&[key.entity()])
            .inc();
    }

    pub fn record_invalidation(&self, key: &QueryKey) {
        get_metrics()
            .invalidations
            .with_label_values(&[key.entity()])
            .inc();
    }

    pub fn record_eviction(&self, key: &QueryKey) {
        get_metrics()
            .evictions
            .with_label_values(&[key.entity()])
            .inc();
    }

    pub fn record_rollback(&self, key: &QueryKey) {
        get_metrics()
            .rollbacks
            .with_label_values(&[key.entity()])
            .inc();
    }
}
