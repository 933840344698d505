//! In-process [`DocumentStore`] and [`Cache`] implementations.
//!
//! Both keep simple call counters and support failure injection, which is
//! what the engine tests, benches and demos drive.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tokio::time::Instant;

use crate::filter::{Document, FilterExpr};
use crate::store::{Cache, CacheError, CountOptions, DocumentStore, StoreError, WindowQuery};

/// Vec-backed collection evaluating Mongo-style filters in memory.
///
/// Supports `$match` as the only extra pipeline stage.
pub struct MemoryStore {
    store_name: String,
    collection: String,
    rows: RwLock<Vec<Document>>,
    query_calls: AtomicU64,
    count_calls: AtomicU64,
    estimated_calls: AtomicU64,
    fail_queries: AtomicBool,
    fail_counts: AtomicBool,
    count_delay: Mutex<Duration>,
    queries: Mutex<Vec<WindowQuery>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("store", &self.store_name)
            .field("collection", &self.collection)
            .field("rows", &self.rows.read().len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// An empty collection.
    #[must_use]
    pub fn new(store_name: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            store_name: store_name.into(),
            collection: collection.into(),
            rows: RwLock::new(Vec::new()),
            query_calls: AtomicU64::new(0),
            count_calls: AtomicU64::new(0),
            estimated_calls: AtomicU64::new(0),
            fail_queries: AtomicBool::new(false),
            fail_counts: AtomicBool::new(false),
            count_delay: Mutex::new(Duration::ZERO),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Builder: seed the collection.
    #[must_use]
    pub fn with_documents(self, docs: impl IntoIterator<Item = Document>) -> Self {
        self.rows.write().extend(docs);
        self
    }

    /// Add one document.
    pub fn insert(&self, doc: Document) {
        self.rows.write().push(doc);
    }

    /// Keep only documents for which `keep` returns true.
    pub fn retain(&self, keep: impl FnMut(&Document) -> bool) {
        self.rows.write().retain(keep);
    }

    /// Number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// True if the collection holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Number of [`DocumentStore::query`] calls so far.
    #[must_use]
    pub fn query_calls(&self) -> u64 {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Number of [`DocumentStore::count`] calls so far.
    #[must_use]
    pub fn count_calls(&self) -> u64 {
        self.count_calls.load(Ordering::SeqCst)
    }

    /// Number of [`DocumentStore::estimated_count`] calls so far.
    #[must_use]
    pub fn estimated_calls(&self) -> u64 {
        self.estimated_calls.load(Ordering::SeqCst)
    }

    /// Every window query received, oldest first.
    #[must_use]
    pub fn queries(&self) -> Vec<WindowQuery> {
        self.queries.lock().clone()
    }

    /// Make every subsequent `query` fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `count` and `estimated_count` fail.
    pub fn fail_counts(&self, fail: bool) {
        self.fail_counts.store(fail, Ordering::SeqCst);
    }

    /// Delay every count by `delay` (on the tokio clock).
    pub fn set_count_delay(&self, delay: Duration) {
        *self.count_delay.lock() = delay;
    }

    fn matching(&self, conditions: &[FilterExpr]) -> Vec<Document> {
        self.rows
            .read()
            .iter()
            .filter(|doc| conditions.iter().all(|c| c.matches(doc)))
            .cloned()
            .collect()
    }

    fn check_counts(&self) -> Result<(), StoreError> {
        if self.fail_counts.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected count failure".into()));
        }
        Ok(())
    }

    async fn count_delay(&self) {
        let delay = *self.count_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

fn condition(document: &Value) -> Result<Option<FilterExpr>, StoreError> {
    Ok(FilterExpr::from_document(document)?)
}

fn stage_condition(stage: &Value) -> Result<Option<FilterExpr>, StoreError> {
    match stage.as_object().and_then(|s| s.get("$match")) {
        Some(filter) if stage.as_object().is_some_and(|s| s.len() == 1) => condition(filter),
        _ => Err(StoreError::UnsupportedStage(stage.to_string())),
    }
}

fn to_usize(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    fn collection_name(&self) -> &str {
        &self.collection
    }

    async fn query(&self, query: &WindowQuery) -> Result<Vec<Document>, StoreError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.queries.lock().push(query.clone());
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("injected query failure".into()));
        }

        let mut conditions = Vec::new();
        conditions.extend(condition(&Value::Object(query.filter.clone()))?);
        for stage in &query.extra_stages {
            conditions.extend(stage_condition(stage)?);
        }
        if let Some(predicate) = &query.predicate {
            conditions.extend(condition(predicate)?);
        }

        let mut rows = self.matching(&conditions);
        rows.sort_by(|a, b| query.sort.compare_rows(a, b));
        Ok(rows
            .into_iter()
            .skip(to_usize(query.skip))
            .take(to_usize(query.limit))
            .collect())
    }

    async fn count(&self, filter: &Document, options: &CountOptions) -> Result<u64, StoreError> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        self.count_delay().await;
        self.check_counts()?;

        let mut conditions: Vec<FilterExpr> =
            condition(&Value::Object(filter.clone()))?.into_iter().collect();
        for stage in &options.extra_stages {
            conditions.extend(stage_condition(stage)?);
        }
        Ok(self.matching(&conditions).len() as u64)
    }

    async fn estimated_count(&self, _options: &CountOptions) -> Result<u64, StoreError> {
        self.estimated_calls.fetch_add(1, Ordering::SeqCst);
        self.check_counts()?;
        Ok(self.len() as u64)
    }
}

struct Entry {
    value: Value,
    expires_at: Instant,
}

/// Map-backed TTL cache. Expiry follows the tokio clock.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<BTreeMap<String, Entry>>,
    get_calls: AtomicU64,
    set_calls: AtomicU64,
    failing: AtomicBool,
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCache")
            .field("entries", &self.entries.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent operation fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `get` calls so far.
    #[must_use]
    pub fn get_calls(&self) -> u64 {
        self.get_calls.load(Ordering::SeqCst)
    }

    /// Number of `set` calls so far.
    #[must_use]
    pub fn set_calls(&self) -> u64 {
        self.set_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), CacheError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Backend("injected cache failure".into()));
        }
        Ok(())
    }

    fn purge_expired(entries: &mut BTreeMap<String, Entry>) {
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        Ok(entries.get(key).map(|entry| entry.value.clone()))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.set_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let expires_at = Instant::now() + ttl;
        self.entries
            .lock()
            .insert(key.to_owned(), Entry { value, expires_at });
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        self.check()?;
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries);
        Ok(entries
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }

    async fn del_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        self.check()?;
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !glob_match(pattern, key));
        Ok((before - entries.len()) as u64)
    }
}

/// Match `text` against a glob where `*` is the only wildcard.
fn glob_match(pattern: &str, text: &str) -> bool {
    let mut parts = pattern.split('*');
    let head = parts.next().unwrap_or_default();
    let Some(mut rest) = text.strip_prefix(head) else {
        return false;
    };

    let segments: Vec<&str> = parts.collect();
    let Some((tail, middle)) = segments.split_last() else {
        return rest.is_empty();
    };

    for segment in middle {
        match rest.find(segment) {
            Some(at) => rest = &rest[at + segment.len()..],
            None => return false,
        }
    }
    rest.ends_with(tail)
}
