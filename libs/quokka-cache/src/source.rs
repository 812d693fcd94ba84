//! Data source collaborator boundary
//!
//! The cache never talks to a network or storage layer directly; it calls
//! an opaque [`DataSource`] that resolves reads and writes. The mock
//! implementation lives in the `quokka-mock-source` crate; a real backend
//! client implements the same trait.

use crate::error::SourceError;
use crate::key::QueryKey;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Future returned by a fetcher closure
pub type FetchFuture = Pin<Box<dyn Future<Output = Result<Value, SourceError>> + Send>>;

/// Closure the store schedules for fetches
///
/// Cloned and retained per entry so invalidation and background polling
/// can refetch without the original caller.
pub type Fetcher = Arc<dyn Fn() -> FetchFuture + Send + Sync>;

/// A write forwarded to the data source
///
/// The result payload of a write must carry enough identifying data
/// (affected entity ids, scope ids like course and instructors) for the
/// caller to compute a narrow invalidation set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteCommand {
    pub operation: String,
    pub payload: Value,
}

impl WriteCommand {
    pub fn new(operation: impl Into<String>, payload: Value) -> Self {
        Self {
            operation: operation.into(),
            payload,
        }
    }
}

/// The external collaborator that actually performs reads and writes
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Idempotent read for one query key. Safe to de-duplicate and retry.
    async fn fetch(&self, key: &QueryKey) -> Result<Value, SourceError>;

    /// Write operation. The result payload must carry the scope ids that
    /// narrow invalidation needs.
    async fn execute(&self, command: WriteCommand) -> Result<Value, SourceError>;
}

/// Adapt a [`DataSource`] read for one key to the store's fetcher shape
pub fn source_fetcher(source: Arc<dyn DataSource>, key: QueryKey) -> Fetcher {
    Arc::new(move || {
        let source = Arc::clone(&source);
        let key = key.clone();
        Box::pin(async move { source.fetch(&key).await })
    })
}
