// =============================================================================
// CRATE-LEVEL QUALITY LINTS (following Tokio/Serde standards)
// =============================================================================
#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]
#![warn(unreachable_pub)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
// =============================================================================
// CLIPPY CONFIGURATION
// =============================================================================
#![allow(clippy::doc_markdown)] // Mongo operators in docs
#![allow(clippy::missing_errors_doc)] // # Errors sections - doc-heavy
#![allow(clippy::missing_panics_doc)] // # Panics sections - doc-heavy
#![allow(clippy::module_name_repetitions)] // Type names matching module - acceptable
#![allow(clippy::return_self_not_must_use)] // Builder pattern methods return Self
#![allow(clippy::must_use_candidate)] // Builder methods - fluent API doesn't need must_use
#![allow(clippy::cast_possible_truncation)] // usize/u64 counts
#![allow(clippy::indexing_slicing)] // Glob matching slices at `find` offsets

//! # pagejump - Keyset Pagination with Page Jumps
//!
//! Stable, deep pagination over mutable document collections without
//! `O(skip)` scans, while still answering "go to page N".
//!
//! - **Cursors** resume strictly after (or before) an anchor row under a
//!   stable composite sort, built from an OR-of-ANDs keyset predicate.
//! - **Page jumps** walk forward from the nearest cached bookmark, writing
//!   a new bookmark every `step` pages and refusing walks longer than
//!   `max_hops`.
//! - **Totals** are optional, computed through a bounded count queue in
//!   sync, async or approximate mode, cached with a TTL and coalesced
//!   across concurrent callers.
//!
//! ## Quick Start
//!
//! ```
//! # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
//! use std::sync::Arc;
//! use pagejump::prelude::*;
//! use serde_json::json;
//!
//! let store = MemoryStore::new("mem", "orders").with_documents(
//!     (1..=50).map(|i| json!({"_id": i, "total": i * 10}).as_object().unwrap().clone()),
//! );
//! let engine = PageJumpEngine::new(Arc::new(store), Arc::new(MemoryCache::new()));
//!
//! let sort = SortSpec::new().desc("total");
//! let first = engine.find_page(&PageRequest::new(10).sort(sort.clone())).await.unwrap();
//! assert_eq!(first.items[0]["_id"], json!(50));
//! assert!(first.page_info.has_next);
//!
//! // Resume from the end cursor
//! let next = PageRequest::new(10)
//!     .sort(sort.clone())
//!     .after(first.page_info.end_cursor.unwrap());
//! let second = engine.find_page(&next).await.unwrap();
//! assert_eq!(second.items[0]["_id"], json!(40));
//!
//! // Or jump straight to a page number
//! let fourth = engine.find_page(&PageRequest::new(10).sort(sort).page(4)).await.unwrap();
//! assert_eq!(fourth.items[0]["_id"], json!(20));
//! # });
//! ```
//!
//! ## Cursor Format
//!
//! A cursor is URL-safe base64 (no padding) of a length-prefixed JSON
//! envelope `{"v":1,"s":<sort>,"a":<anchor>,"d":"after"}`. Cursors are
//! opaque to callers and are rejected when replayed against a different
//! sort. See [`cursor`] for signing.

pub mod bookmark;
pub mod config;
pub mod cursor;
mod engine;
pub mod error;
pub mod filter;
pub mod keyset;
mod memory;
pub mod page;
pub mod queue;
pub mod request;
pub mod sort;
pub mod store;
pub mod totals;
pub mod validate;

pub use bookmark::{CacheKeys, KeyDims, shape_of, shape_paths};
pub use config::{EngineConfig, JumpConfig, OffsetJumpConfig, TotalsConfig};
pub use cursor::{
    Cursor, CursorCodec, CursorDirection, CursorError, CursorSigner, EncodeError, decode_cursor,
    encode_cursor,
};
pub use engine::PageJumpEngine;
pub use error::PagerError;
pub use filter::{CompoundFilter, Document, Filter, FilterExpr, LogicalOp, Operator, ParseError};
pub use keyset::{KeysetPredicate, anchor_predicate};
pub use memory::{MemoryCache, MemoryStore};
pub use page::{PageAssembler, PageInfo, PageMeta, PagePath, PageResult};
pub use queue::{BoundedCountQueue, QueueConfig, QueueError, QueueStats};
pub use request::{JumpOptions, OffsetJumpOptions, PageRequest, TotalsOptions};
pub use sort::{SortDir, SortField, SortSpec, ensure_stable_sort, pick_anchor, reverse_sort};
pub use store::{Cache, CacheError, CountOptions, DocumentStore, StoreError, WindowQuery};
pub use totals::{TotalsComputer, TotalsJob, TotalsMode, TotalsRecord};
pub use validate::{RequestValidator, ValidationError, assert_cursor_sort_compatible};

/// Prelude for convenient imports.
///
/// ```
/// use pagejump::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Cache, CursorCodec, CursorDirection, DocumentStore, EngineConfig, MemoryCache,
        MemoryStore, PageInfo, PageJumpEngine, PageRequest, PageResult, PagerError, SortDir,
        SortSpec, TotalsMode, TotalsRecord,
    };
}
