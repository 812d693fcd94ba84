//! Mutation coordinator
//!
//! Runs a write against the data source with optimistic local feedback:
//! snapshot the affected entries, apply the optimistic updates, execute,
//! then either invalidate the narrow set of keys the result names or
//! restore every snapshot together. Rollback is all-or-nothing; a failed
//! mutation never leaves a partially reverted cache visible to consumers.
//!
//! Mutations with overlapping optimistic targets are serialized by the
//! caller; the coordinator does not lock across mutations. Each
//! mutation's lifecycle (`snapshotting → executing → committing |
//! rolling_back`) is traced so interleaving shows up in logs.

use crate::error::{MutationError, SourceError};
use crate::key::QueryKey;
use crate::source::{DataSource, WriteCommand};
use crate::store::{CacheStore, InvalidationScope};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::{debug, warn};

/// Future returned by a mutation's execute closure
pub type ExecuteFuture = Pin<Box<dyn Future<Output = Result<Value, SourceError>> + Send>>;

/// One optimistic local update applied before the write is confirmed
pub struct OptimisticUpdate {
    pub key: QueryKey,
    pub apply: Box<dyn Fn(Option<&Value>) -> Value + Send + Sync>,
}

impl OptimisticUpdate {
    pub fn new(
        key: QueryKey,
        apply: impl Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            key,
            apply: Box::new(apply),
        }
    }
}

/// Everything the coordinator needs to run one write
///
/// `invalidates` receives the mutation's result payload and must return
/// only the keys that payload names as affected. Invalidating a blanket
/// entity prefix from a scoped mutation refetches every user's data and
/// is the defect this layer exists to prevent; use
/// [`InvalidationScope::Prefix`] directly for the rare genuinely-global
/// change instead.
pub struct MutationSpec {
    optimistic: Vec<OptimisticUpdate>,
    execute: Box<dyn FnOnce() -> ExecuteFuture + Send>,
    invalidates: Box<dyn Fn(&Value) -> Vec<QueryKey> + Send + Sync>,
}

impl MutationSpec {
    pub fn new<F, Fut>(execute: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, SourceError>> + Send + 'static,
    {
        let execute: Box<dyn FnOnce() -> ExecuteFuture + Send> =
            Box::new(move || Box::pin(execute()));
        Self {
            optimistic: Vec::new(),
            execute,
            invalidates: Box::new(|_| Vec::new()),
        }
    }

    /// Build a spec whose execute phase forwards one command to a data
    /// source
    pub fn via_source(source: Arc<dyn DataSource>, command: WriteCommand) -> Self {
        Self::new(move || async move { source.execute(command).await })
    }

    /// Add an optimistic update applied before the write executes
    pub fn optimistic(mut self, update: OptimisticUpdate) -> Self {
        self.optimistic.push(update);
        self
    }

    /// Set the function that computes the invalidation set from the
    /// mutation's result payload
    pub fn invalidates(
        mut self,
        compute: impl Fn(&Value) -> Vec<QueryKey> + Send + Sync + 'static,
    ) -> Self {
        self.invalidates = Box::new(compute);
        self
    }
}

/// Coordinates optimistic writes against one cache store
#[derive(Clone)]
pub struct MutationCoordinator {
    store: CacheStore,
}

impl MutationCoordinator {
    pub fn new(store: CacheStore) -> Self {
        Self { store }
    }

    /// Run one mutation to completion
    ///
    /// Resolves with the data source's result payload after the
    /// invalidation set has been applied, or rejects with
    /// [`MutationError`] after every optimistic target has been restored.
    pub async fn mutate(&self, spec: MutationSpec) -> Result<Value, MutationError> {
        let MutationSpec {
            optimistic,
            execute,
            invalidates,
        } = spec;

        debug!(targets = optimistic.len(), phase = "snapshotting", "mutation started");
        let snapshot = self.store.apply_optimistic(&optimistic);

        debug!(phase = "executing", "mutation executing");
        match execute().await {
            Ok(result) => {
                let keys = invalidates(&result);
                debug!(
                    phase = "committing",
                    invalidated = keys.len(),
                    "mutation committed"
                );
                if !keys.is_empty() {
                    self.store.invalidate(InvalidationScope::Keys(keys));
                }
                Ok(result)
            }
            Err(err) => {
                warn!(
                    phase = "rolling_back",
                    error = %err,
                    restored = snapshot.len(),
                    "mutation failed, rolling back"
                );
                self.store.restore(snapshot);
                Err(MutationError::Source(err))
            }
        }
    }
}
