//! Page request shape and builder.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::filter::Document;
use crate::sort::SortSpec;
use crate::totals::TotalsMode;

/// Page size used when a request does not name one.
pub const DEFAULT_LIMIT: i64 = 20;

/// Per-request overrides of the engine's hop bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct JumpOptions {
    /// Pages between bookmarks.
    pub step: Option<u64>,
    /// Sequential fetches allowed in this call.
    pub max_hops: Option<u64>,
}

/// Per-request overrides of skip-based jumping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OffsetJumpOptions {
    /// Whether skip may be used.
    pub enable: Option<bool>,
    /// Largest skip served this way.
    pub max_skip: Option<u64>,
}

/// Totals requested alongside the page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TotalsOptions {
    /// Consistency mode.
    pub mode: TotalsMode,
    /// Record lifetime override.
    pub ttl_ms: Option<u64>,
    /// Store deadline for the count.
    #[serde(rename = "maxTimeMS")]
    pub max_time_ms: Option<u64>,
}

impl TotalsOptions {
    /// Totals in `mode` with engine defaults for everything else.
    #[must_use]
    pub const fn new(mode: TotalsMode) -> Self {
        Self {
            mode,
            ttl_ms: None,
            max_time_ms: None,
        }
    }

    /// `ttl_ms` as a [`Duration`].
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }

    /// `max_time_ms` as a [`Duration`].
    #[must_use]
    pub fn max_time(&self) -> Option<Duration> {
        self.max_time_ms.map(Duration::from_millis)
    }
}

/// One `find_page` call.
///
/// `after`, `before` and `page` are mutually exclusive. With none of them
/// the first page is returned.
///
/// ```
/// use pagejump::{PageRequest, SortSpec, TotalsMode};
/// use serde_json::json;
///
/// let request = PageRequest::new(25)
///     .filter(json!({"status": "active"}).as_object().unwrap().clone())
///     .sort(SortSpec::new().desc("createdAt"))
///     .page(7)
///     .totals(TotalsMode::Async);
///
/// assert_eq!(request.page, Some(7));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    /// Mongo-style filter.
    pub filter: Document,
    /// Extra pipeline stages run before sorting.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_stages: Vec<Value>,
    /// Caller sort; the id field is appended as tiebreaker.
    pub sort: SortSpec,
    /// Page size.
    pub limit: i64,
    /// Resume strictly after this cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    /// Resume strictly before this cursor.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
    /// 1-based page number to jump to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    /// Hop bound overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jump: Option<JumpOptions>,
    /// Offset jump overrides.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset_jump: Option<OffsetJumpOptions>,
    /// Totals to attach.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub totals: Option<TotalsOptions>,
    /// Attach timing and path metadata.
    pub meta: bool,
    /// Extra discriminator mixed into bookmark and totals keys.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_scope: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(DEFAULT_LIMIT)
    }
}

impl PageRequest {
    /// First page of `limit` rows over the whole collection, sorted by id.
    #[must_use]
    pub fn new(limit: i64) -> Self {
        Self {
            filter: Document::new(),
            extra_stages: Vec::new(),
            sort: SortSpec::new(),
            limit,
            after: None,
            before: None,
            page: None,
            jump: None,
            offset_jump: None,
            totals: None,
            meta: false,
            cache_scope: None,
        }
    }

    /// Set the filter.
    pub fn filter(mut self, filter: Document) -> Self {
        self.filter = filter;
        self
    }

    /// Append a pipeline stage.
    pub fn stage(mut self, stage: Value) -> Self {
        self.extra_stages.push(stage);
        self
    }

    /// Set the sort.
    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = sort;
        self
    }

    /// Resume after `cursor`.
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.after = Some(cursor.into());
        self
    }

    /// Resume before `cursor`.
    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.before = Some(cursor.into());
        self
    }

    /// Jump to a 1-based page.
    pub const fn page(mut self, page: i64) -> Self {
        self.page = Some(page);
        self
    }

    /// Override hop bounds.
    pub const fn jump(mut self, step: u64, max_hops: u64) -> Self {
        self.jump = Some(JumpOptions {
            step: Some(step),
            max_hops: Some(max_hops),
        });
        self
    }

    /// Allow skip-based jumps up to `max_skip`.
    pub const fn offset_jump(mut self, max_skip: u64) -> Self {
        self.offset_jump = Some(OffsetJumpOptions {
            enable: Some(true),
            max_skip: Some(max_skip),
        });
        self
    }

    /// Attach totals in `mode`.
    pub const fn totals(mut self, mode: TotalsMode) -> Self {
        self.totals = Some(TotalsOptions::new(mode));
        self
    }

    /// Attach totals with explicit options.
    pub const fn totals_with(mut self, options: TotalsOptions) -> Self {
        self.totals = Some(options);
        self
    }

    /// Attach metadata.
    pub const fn with_meta(mut self) -> Self {
        self.meta = true;
        self
    }

    /// Mix `scope` into cache keys.
    pub fn cache_scope(mut self, scope: impl Into<String>) -> Self {
        self.cache_scope = Some(scope.into());
        self
    }
}
