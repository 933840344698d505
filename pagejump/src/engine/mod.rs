//! The `find_page` orchestrator.
//!
//! ```text
//! VALIDATE -> DIRECT_CURSOR | FIRST_PAGE | OFFSET_FALLBACK | BOOKMARK_HOP
//!          -> ATTACH_TOTALS? -> DONE
//! ```

mod hop;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, warn};

use crate::bookmark::{CacheKeys, KeyDims};
use crate::config::EngineConfig;
use crate::cursor::{CursorCodec, CursorDirection, CursorError};
use crate::error::PagerError;
use crate::filter::Document;
use crate::keyset::KeysetPredicate;
use crate::page::{PageAssembler, PageInfo, PageMeta, PagePath, PageResult};
use crate::queue::{BoundedCountQueue, QueueStats};
use crate::request::PageRequest;
use crate::sort::{SortSpec, ensure_stable_sort, reverse_sort};
use crate::store::{Cache, CacheError, DocumentStore, WindowQuery};
use crate::totals::{TotalsComputer, TotalsJob, TotalsRecord};
use crate::validate::{RequestValidator, assert_cursor_sort_compatible};

/// Keyset pagination engine with bookmark-assisted page jumps.
///
/// Owns its count queue and inflight-totals registry; two engines never
/// share either.
///
/// ```
/// # tokio_test_block_on(async {
/// use std::sync::Arc;
/// use pagejump::{MemoryCache, MemoryStore, PageJumpEngine, PageRequest, SortSpec};
/// use serde_json::json;
///
/// let store = MemoryStore::new("mem", "users").with_documents(
///     (1..=7).map(|i| json!({"_id": i}).as_object().unwrap().clone()),
/// );
/// let engine = PageJumpEngine::new(Arc::new(store), Arc::new(MemoryCache::new()));
///
/// let page = engine
///     .find_page(&PageRequest::new(3).sort(SortSpec::new().asc("_id")).page(3))
///     .await
///     .unwrap();
/// assert_eq!(page.items.len(), 1);
/// assert_eq!(page.page_info.current_page, Some(3));
/// # });
/// # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
/// #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
/// # }
/// ```
pub struct PageJumpEngine {
    store: Arc<dyn DocumentStore>,
    cache: Arc<dyn Cache>,
    config: EngineConfig,
    codec: CursorCodec,
    keys: CacheKeys,
    validator: RequestValidator,
    queue: Arc<BoundedCountQueue>,
    totals: TotalsComputer,
}

impl fmt::Debug for PageJumpEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageJumpEngine")
            .field("store", &self.store.store_name())
            .field("collection", &self.store.collection_name())
            .field("config", &self.config)
            .field("codec", &self.codec)
            .field("queue", &self.queue)
            .finish_non_exhaustive()
    }
}

/// What a dispatch path produced, before totals and meta.
struct Fetched {
    items: Vec<Document>,
    page_info: PageInfo,
    path: PagePath,
    bookmark_hit: bool,
    hops: u64,
}

/// Per-call values shared by every path.
struct Plan<'r> {
    request: &'r PageRequest,
    sort: SortSpec,
    limit: u64,
}

impl Plan<'_> {
    fn window(&self, sort: SortSpec, predicate: Option<serde_json::Value>, skip: u64) -> WindowQuery {
        WindowQuery {
            filter: self.request.filter.clone(),
            extra_stages: self.request.extra_stages.clone(),
            sort,
            limit: self.limit + 1,
            skip,
            predicate,
            max_time: None,
        }
    }

    fn dims(&self, store: &dyn DocumentStore) -> KeyDims {
        KeyDims::new(
            store.store_name(),
            store.collection_name(),
            &self.sort,
            self.limit,
            &self.request.filter,
            &self.request.extra_stages,
        )
        .with_scope(self.request.cache_scope.clone())
    }
}

impl PageJumpEngine {
    /// An engine with default configuration.
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, cache: Arc<dyn Cache>) -> Self {
        Self::with_config(store, cache, EngineConfig::default())
    }

    /// An engine with explicit configuration.
    #[must_use]
    pub fn with_config(
        store: Arc<dyn DocumentStore>,
        cache: Arc<dyn Cache>,
        config: EngineConfig,
    ) -> Self {
        let queue = Arc::new(BoundedCountQueue::new(config.queue.clone()));
        let totals = TotalsComputer::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            Arc::clone(&queue),
            Duration::from_millis(config.totals.coalesce_window_ms),
        );
        Self {
            keys: CacheKeys::new(config.key_prefix.clone()),
            validator: RequestValidator::new(config.max_limit),
            codec: CursorCodec::new(),
            store,
            cache,
            config,
            queue,
            totals,
        }
    }

    /// Builder: replace the cursor codec (e.g. with a signing one).
    #[must_use]
    pub fn with_codec(mut self, codec: CursorCodec) -> Self {
        self.codec = codec;
        self
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The cursor codec pages are encoded with.
    #[must_use]
    pub const fn codec(&self) -> &CursorCodec {
        &self.codec
    }

    /// Count queue counters.
    #[must_use]
    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Fetch one page.
    ///
    /// Fails with exactly one [`PagerError`]; requested totals never cause a
    /// failure.
    pub async fn find_page(&self, request: &PageRequest) -> Result<PageResult, PagerError> {
        let started = Instant::now();
        self.validator.validate(request)?;

        let plan = Plan {
            request,
            sort: ensure_stable_sort(&request.sort, &self.config.id_field),
            limit: request.limit.unsigned_abs(),
        };

        let fetched = if let Some(token) = &request.after {
            self.direct_cursor(&plan, token, CursorDirection::After).await?
        } else if let Some(token) = &request.before {
            self.direct_cursor(&plan, token, CursorDirection::Before).await?
        } else {
            match request.page.map(i64::unsigned_abs) {
                None => self.first_page(&plan, None).await?,
                Some(1) => self.first_page(&plan, Some(1)).await?,
                Some(page) => self.jump_to(&plan, page).await?,
            }
        };

        let totals = match &request.totals {
            Some(_) => Some(self.attach_totals(&plan).await),
            None => None,
        };

        let meta = request.meta.then(|| PageMeta {
            op: "findPage".to_owned(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            path: fetched.path,
            bookmark_hit: fetched.bookmark_hit,
            hops: fetched.hops,
        });

        Ok(PageResult {
            items: fetched.items,
            page_info: fetched.page_info,
            totals,
            meta,
        })
    }

    /// Cached totals for an async-mode token; `None` while pending.
    pub async fn poll_totals(&self, token: &str) -> Option<TotalsRecord> {
        let record = self.totals.cached(&self.keys.totals_key(token)).await?;
        Some(record.with_token(token))
    }

    /// Drop every bookmark of this engine's collection.
    pub async fn invalidate_bookmarks(&self) -> Result<u64, CacheError> {
        let pattern = self.keys.bookmark_pattern(self.store.collection_name());
        let removed = self.cache.del_pattern(&pattern).await?;
        debug!(%pattern, removed, "bookmarks invalidated");
        Ok(removed)
    }

    /// Drop every cached totals record under this engine's prefix.
    pub async fn invalidate_totals(&self) -> Result<u64, CacheError> {
        let pattern = self.keys.totals_pattern();
        let removed = self.cache.del_pattern(&pattern).await?;
        debug!(%pattern, removed, "totals invalidated");
        Ok(removed)
    }

    /// Keys of the bookmarks currently cached for this collection.
    pub async fn cached_bookmark_keys(&self) -> Result<Vec<String>, CacheError> {
        let pattern = self.keys.bookmark_pattern(self.store.collection_name());
        self.cache.keys(&pattern).await
    }

    async fn direct_cursor(
        &self,
        plan: &Plan<'_>,
        token: &str,
        direction: CursorDirection,
    ) -> Result<Fetched, PagerError> {
        let cursor = self.codec.decode(token)?;
        assert_cursor_sort_compatible(&plan.sort, &cursor.sort)?;
        if cursor.anchor.is_empty() {
            return Err(PagerError::InvalidCursor(CursorError::MissingFields));
        }

        let (query_sort, predicate) = match direction {
            CursorDirection::After => (
                plan.sort.clone(),
                KeysetPredicate::after(&plan.sort, &cursor.anchor),
            ),
            CursorDirection::Before => (
                reverse_sort(&plan.sort),
                KeysetPredicate::before(&plan.sort, &cursor.anchor),
            ),
        };
        debug!(direction = direction.as_str(), sort = %plan.sort, "direct cursor fetch");

        let rows = self
            .query(plan.window(query_sort, predicate.map(|p| p.to_document()), 0))
            .await?;
        let (items, page_info) = self
            .assembler(plan)
            .assemble(rows, Some(direction), true)?;

        Ok(Fetched {
            items,
            page_info,
            path: PagePath::DirectCursor,
            bookmark_hit: false,
            hops: 1,
        })
    }

    async fn first_page(&self, plan: &Plan<'_>, page: Option<u64>) -> Result<Fetched, PagerError> {
        debug!(sort = %plan.sort, limit = plan.limit, "first page fetch");
        let rows = self.query(plan.window(plan.sort.clone(), None, 0)).await?;
        let (items, mut page_info) = self.assembler(plan).assemble(rows, None, false)?;
        page_info.current_page = page;

        Ok(Fetched {
            items,
            page_info,
            path: PagePath::FirstPage,
            bookmark_hit: false,
            hops: 1,
        })
    }

    async fn attach_totals(&self, plan: &Plan<'_>) -> TotalsRecord {
        let options = plan.request.totals.unwrap_or_default();
        let dims = plan.dims(self.store.as_ref());
        let token = self.keys.totals_token(&dims, options.mode.as_str());

        let job = TotalsJob {
            key: self.keys.totals_key(&token),
            token,
            filter: plan.request.filter.clone(),
            extra_stages: plan.request.extra_stages.clone(),
            limit: plan.limit,
            mode: options.mode,
            ttl: options
                .ttl()
                .unwrap_or(Duration::from_millis(self.config.totals.ttl_ms)),
            max_time: options
                .max_time()
                .or(self.config.totals.max_time_ms.map(Duration::from_millis)),
        };

        match self.totals.compute(job).await {
            Ok(record) => record,
            Err(err) => {
                warn!(error = %err, mode = options.mode.as_str(), "totals unavailable");
                TotalsRecord::failed(options.mode, err.reason())
            }
        }
    }

    async fn query(&self, mut window: WindowQuery) -> Result<Vec<Document>, PagerError> {
        window.max_time = self.config.query_max_time();
        Ok(self.store.query(&window).await?)
    }

    fn assembler<'a>(&'a self, plan: &'a Plan<'_>) -> PageAssembler<'a> {
        PageAssembler::new(
            &self.codec,
            &plan.sort,
            usize::try_from(plan.limit).unwrap_or(usize::MAX),
        )
    }
}
