//! Collaborator interfaces: the document store and the key-value cache.
//!
//! The engine only ever talks to these traits. [`MemoryStore`] and
//! [`MemoryCache`] are the in-process implementations.
//!
//! [`MemoryStore`]: crate::MemoryStore
//! [`MemoryCache`]: crate::MemoryCache

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::filter::{Document, ParseError};
use crate::sort::SortSpec;

/// One window fetch: `filter AND predicate`, sorted, skipped and limited.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WindowQuery {
    /// Caller filter (Mongo-style document).
    pub filter: Document,
    /// Extra pipeline stages applied before sort/skip/limit.
    pub extra_stages: Vec<Value>,
    /// Effective sort; already reversed for "before" fetches.
    pub sort: SortSpec,
    /// Maximum rows to return.
    pub limit: u64,
    /// Rows to skip after sorting.
    pub skip: u64,
    /// Anchor predicate to AND with `filter`, if any.
    pub predicate: Option<Value>,
    /// Per-query deadline to pass through to the store.
    pub max_time: Option<Duration>,
}

/// Options for count operations.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CountOptions {
    /// Pipeline stages the paged windows apply; counted the same way.
    pub extra_stages: Vec<Value>,
    /// Per-count deadline to pass through to the store.
    pub max_time: Option<Duration>,
}

/// Failure reported by a [`DocumentStore`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The filter or predicate could not be interpreted.
    #[error("invalid filter: {0}")]
    InvalidFilter(#[from] ParseError),
    /// A pipeline stage is not supported by this store.
    #[error("unsupported pipeline stage: {0}")]
    UnsupportedStage(String),
    /// The operation hit its deadline.
    #[error("operation exceeded {0:?}")]
    Timeout(Duration),
    /// Any other backend failure.
    #[error("{0}")]
    Backend(String),
}

/// Failure reported by a [`Cache`].
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The backend could not be reached or refused the operation.
    #[error("cache backend error: {0}")]
    Backend(String),
    /// A cached value had an unexpected shape.
    #[error("cached value is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Query side of a document collection.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Name of the backing store, used in cache key dimensions.
    fn store_name(&self) -> &str;

    /// Name of the collection, used in cache key dimensions.
    fn collection_name(&self) -> &str;

    /// Fetch one sorted window.
    async fn query(&self, query: &WindowQuery) -> Result<Vec<Document>, StoreError>;

    /// Exact number of documents matching `filter` and `options.extra_stages`.
    async fn count(&self, filter: &Document, options: &CountOptions) -> Result<u64, StoreError>;

    /// Cheap metadata-based document count, ignoring any filter.
    async fn estimated_count(&self, options: &CountOptions) -> Result<u64, StoreError>;
}

/// TTL key-value cache holding bookmarks and totals.
///
/// Patterns are globs where `*` matches any run of characters.
#[async_trait]
pub trait Cache: Send + Sync {
    /// Read a value; `None` when missing or expired.
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    /// Write a value that expires after `ttl`.
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Keys matching `pattern`.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;

    /// Delete keys matching `pattern`, returning how many were removed.
    async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError>;
}
