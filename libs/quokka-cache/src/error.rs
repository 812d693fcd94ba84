//! Error types for the query cache

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Caller bugs caught at construction time. Never retried or recovered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A query key was built with an empty entity name
    #[error("query key requires a non-empty entity name")]
    EmptyEntityName,

    /// A retention window shorter than the freshness window would evict
    /// entries that are still fresh
    #[error("invalid cache policy: gc_time {gc_ms}ms is shorter than stale_time {stale_ms}ms")]
    InvalidPolicy { stale_ms: u64, gc_ms: u64 },
}

/// Failures reported by the data source collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// A read failed; the cache keeps serving the last good value
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// A write was rejected by the data source
    #[error("write rejected: {0}")]
    Rejected(String),

    /// The data source could not be reached
    #[error("data source unavailable: {0}")]
    Unavailable(String),

    /// The data source has no data for the requested key
    #[error("no data for key: {0}")]
    NotFound(String),
}

/// Mutation failure, propagated to the caller after rollback completed
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    #[error("mutation failed and optimistic updates were rolled back: {0}")]
    Source(#[from] SourceError),
}

/// Error details surfaced on a cache entry after a failed fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorInfo {
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ErrorInfo {
    pub fn from_source(err: &SourceError) -> Self {
        Self {
            message: err.to_string(),
            occurred_at: Utc::now(),
        }
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CacheError::InvalidPolicy {
            stale_ms: 5000,
            gc_ms: 1000,
        };
        assert_eq!(
            err.to_string(),
            "invalid cache policy: gc_time 1000ms is shorter than stale_time 5000ms"
        );

        let err = SourceError::Fetch("connection reset".to_string());
        assert_eq!(err.to_string(), "fetch failed: connection reset");
    }

    #[test]
    fn test_mutation_error_from_source() {
        let err: MutationError = SourceError::Rejected("duplicate endorsement".to_string()).into();
        assert!(matches!(err, MutationError::Source(_)));
        assert!(err.to_string().contains("rolled back"));
    }

    #[test]
    fn test_error_info_from_source() {
        let info = ErrorInfo::from_source(&SourceError::Unavailable("timeout".to_string()));
        assert_eq!(info.message, "data source unavailable: timeout");
    }
}
