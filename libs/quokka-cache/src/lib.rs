//! QuokkaQ client-side query cache
//!
//! In-process cache and invalidation layer for the QuokkaQ dashboards,
//! thread views, and notification feeds:
//! - Canonical query keys with deterministic construction and free-text
//!   normalization
//! - Stale-while-revalidate reads with per-key fetch de-duplication
//! - Reference-counted subscriptions, garbage collection, and background
//!   polling
//! - Optimistic mutations with all-or-nothing rollback and narrow,
//!   result-driven invalidation
//!
//! # Architecture
//!
//! ```text
//! UI consumer ──get/subscribe──▶ CacheStore ──fetch──▶ DataSource
//!      │                             ▲
//!      │              invalidate/rollback
//!      │                             │
//!      └────mutate────▶ MutationCoordinator ──execute──▶ DataSource
//! ```
//!
//! The store serves reads synchronously from memory and revalidates in
//! the background; the coordinator applies optimistic updates before a
//! write confirms and restores them together if it fails. Stores are
//! constructed explicitly and passed by reference — there is no global
//! instance.
//!
//! # Example
//!
//! ```no_run
//! use quokka_cache::{policy, CacheStore, Fetcher, QueryKeys};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = CacheStore::new();
//!     let key = QueryKeys::course("C1");
//!
//!     let fetcher: Fetcher = Arc::new(|| {
//!         Box::pin(async { Ok(serde_json::json!({ "id": "C1", "name": "Intro" })) })
//!     });
//!
//!     // first read schedules a fetch; the snapshot is Pending until it lands
//!     let snapshot = store.get(&key, policy::defaults::course(), fetcher);
//!     println!("status: {:?}", snapshot.status);
//! }
//! ```

mod entry;
mod error;
mod key;
mod keys;
mod metrics;
mod mutation;
mod source;
mod store;

pub mod policy;
pub mod retry;

pub use entry::{EntrySnapshot, FetchStatus};
pub use error::{CacheError, CacheResult, ErrorInfo, MutationError, SourceError};
pub use key::{normalize_search_text, QueryKey, Segment};
pub use keys::QueryKeys;
pub use metrics::CacheMetrics;
pub use mutation::{ExecuteFuture, MutationCoordinator, MutationSpec, OptimisticUpdate};
pub use policy::CachePolicy;
pub use source::{source_fetcher, DataSource, FetchFuture, Fetcher, WriteCommand};
pub use store::{CacheStore, InvalidationScope, KeyPredicate, MutationSnapshot, Subscription};
