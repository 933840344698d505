//! Total counts in sync, async and approximate modes.
//!
//! Counts run through the [`BoundedCountQueue`], results are cached with a
//! TTL, and concurrent requests for the same key share one running count.
//! A failed count is cached as a negative record rather than returned as an
//! error; only queue admission failures reach the caller.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::filter::Document;
use crate::queue::{BoundedCountQueue, QueueError};
use crate::store::{Cache, CountOptions, DocumentStore};

/// Soft-failure tag for a count that raised.
pub const COUNT_FAILED: &str = "count_failed";

/// How totals are computed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalsMode {
    /// Count inline.
    #[default]
    Sync,
    /// Count in the background; poll with the returned token.
    Async,
    /// Use the store's estimate for unfiltered queries.
    Approx,
}

impl TotalsMode {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sync => "sync",
            Self::Async => "async",
            Self::Approx => "approx",
        }
    }
}

/// A cached or freshly computed total.
///
/// `total: None` serializes as `null`: either still pending or failed
/// (then `error` is set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalsRecord {
    /// Mode that produced the record.
    pub mode: TotalsMode,
    /// Matching documents.
    pub total: Option<u64>,
    /// `ceil(total / limit)`.
    pub total_pages: Option<u64>,
    /// Poll token for async mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub ts: u64,
    /// Soft-failure tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set when the total is an estimate.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub approx: bool,
}

impl TotalsRecord {
    /// A known total.
    #[must_use]
    pub fn counted(mode: TotalsMode, total: u64, limit: u64) -> Self {
        Self {
            mode,
            total: Some(total),
            total_pages: Some(total.div_ceil(limit.max(1))),
            token: None,
            ts: now_ms(),
            error: None,
            approx: mode == TotalsMode::Approx,
        }
    }

    /// A total that is not known yet.
    #[must_use]
    pub fn pending(mode: TotalsMode) -> Self {
        Self {
            mode,
            total: None,
            total_pages: None,
            token: None,
            ts: now_ms(),
            error: None,
            approx: false,
        }
    }

    /// A total that could not be computed.
    #[must_use]
    pub fn failed(mode: TotalsMode, reason: &str) -> Self {
        Self {
            error: Some(reason.to_owned()),
            ..Self::pending(mode)
        }
    }

    /// Builder: attach a poll token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// One totals computation.
#[derive(Debug, Clone)]
pub struct TotalsJob {
    /// Cache key of the record.
    pub key: String,
    /// Poll token derived from the key dimensions.
    pub token: String,
    /// Filter to count.
    pub filter: Document,
    /// Pipeline stages applied by the page windows.
    pub extra_stages: Vec<Value>,
    /// Page size, for `total_pages`.
    pub limit: u64,
    /// Mode.
    pub mode: TotalsMode,
    /// Record lifetime.
    pub ttl: Duration,
    /// Store deadline for the count.
    pub max_time: Option<Duration>,
}

type SharedCount = Shared<BoxFuture<'static, Result<TotalsRecord, QueueError>>>;

struct Inflight {
    id: u64,
    started_at: Instant,
    task: SharedCount,
}

type Registry = Arc<Mutex<HashMap<String, Inflight>>>;

/// Computes and caches totals.
pub struct TotalsComputer {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    queue: Arc<BoundedCountQueue>,
    inflight: Registry,
    coalesce_window: Duration,
    next_id: AtomicU64,
}

impl std::fmt::Debug for TotalsComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TotalsComputer")
            .field("inflight", &self.inflight.lock().len())
            .field("coalesce_window", &self.coalesce_window)
            .finish_non_exhaustive()
    }
}

impl TotalsComputer {
    /// Create a computer sharing `queue` with its owner.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
        queue: Arc<BoundedCountQueue>,
        coalesce_window: Duration,
    ) -> Self {
        Self {
            store,
            cache,
            queue,
            inflight: Arc::new(Mutex::new(HashMap::new())),
            coalesce_window,
            next_id: AtomicU64::new(0),
        }
    }

    /// Number of counts currently registered as in flight.
    #[must_use]
    pub fn inflight_len(&self) -> usize {
        self.inflight.lock().len()
    }

    /// Cached record, or compute one according to `job.mode`.
    pub async fn compute(&self, job: TotalsJob) -> Result<TotalsRecord, QueueError> {
        if let Some(cached) = read_record(self.cache.as_ref(), &job.key).await {
            debug!(key = %job.key, mode = job.mode.as_str(), "totals cache hit");
            return Ok(match job.mode {
                TotalsMode::Async => cached.with_token(job.token),
                TotalsMode::Sync | TotalsMode::Approx => cached,
            });
        }

        match job.mode {
            TotalsMode::Sync | TotalsMode::Approx => self.coalesced(&job).await,
            TotalsMode::Async => {
                let task = self.coalesced(&job);
                tokio::spawn(async move {
                    if let Err(err) = task.await {
                        debug!(error = %err, "background count not run");
                    }
                });
                Ok(TotalsRecord::pending(TotalsMode::Async).with_token(job.token))
            }
        }
    }

    /// Cached record for `key`, if any.
    pub async fn cached(&self, key: &str) -> Option<TotalsRecord> {
        read_record(self.cache.as_ref(), key).await
    }

    /// Join a running count for `job.key`, or start one.
    fn coalesced(&self, job: &TotalsJob) -> SharedCount {
        let mut inflight = self.inflight.lock();
        let now = Instant::now();
        // Entries past the window can no longer be joined, including ones whose
        // callers went away before polling them
        inflight.retain(|_, entry| now.duration_since(entry.started_at) < self.coalesce_window);

        if let Some(entry) = inflight.get(&job.key)
            && now.duration_since(entry.started_at) < self.coalesce_window
        {
            debug!(key = %job.key, "joining inflight count");
            return entry.task.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let run = run_count(
            Arc::clone(&self.store),
            Arc::clone(&self.cache),
            Arc::clone(&self.queue),
            job.clone(),
        );
        let registry = Arc::clone(&self.inflight);
        let key = job.key.clone();
        let task = async move {
            let result = run.await;
            let mut inflight = registry.lock();
            if inflight.get(&key).is_some_and(|entry| entry.id == id) {
                inflight.remove(&key);
            }
            result
        }
        .boxed()
        .shared();

        inflight.insert(job.key.clone(), Inflight {
            id,
            started_at: now,
            task: task.clone(),
        });
        task
    }
}

async fn run_count(
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    queue: Arc<BoundedCountQueue>,
    job: TotalsJob,
) -> Result<TotalsRecord, QueueError> {
    let options = CountOptions {
        extra_stages: job.extra_stages.clone(),
        max_time: job.max_time,
    };
    let unfiltered = job.filter.is_empty() && job.extra_stages.is_empty();

    let counted = if job.mode == TotalsMode::Approx && unfiltered {
        store.estimated_count(&options).await
    } else {
        let filter = job.filter.clone();
        queue
            .execute(async move { store.count(&filter, &options).await })
            .await?
    };

    let record = match counted {
        Ok(total) => TotalsRecord::counted(job.mode, total, job.limit),
        Err(err) => {
            warn!(key = %job.key, error = %err, "count failed; caching negative totals");
            TotalsRecord::failed(job.mode, COUNT_FAILED)
        }
    };

    write_record(cache.as_ref(), &job.key, &record, job.ttl).await;
    Ok(record)
}

async fn read_record(cache: &dyn Cache, key: &str) -> Option<TotalsRecord> {
    match cache.get(key).await {
        Ok(Some(value)) => match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!(key, error = %err, "ignoring malformed totals record");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            warn!(key, error = %err, "totals cache read failed");
            None
        }
    }
}

async fn write_record(cache: &dyn Cache, key: &str, record: &TotalsRecord, ttl: Duration) {
    let value = match serde_json::to_value(record) {
        Ok(value) => value,
        Err(err) => {
            warn!(key, error = %err, "could not serialize totals record");
            return;
        }
    };
    if let Err(err) = cache.set(key, value, ttl).await {
        warn!(key, error = %err, "totals cache write failed");
    }
}
