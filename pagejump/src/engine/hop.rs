//! Page-number jumps: skip-based fallback and the bookmark walk.
//!
//! A bookmark stored for page `p` is the end cursor of page `p`, i.e. the
//! anchor page `p + 1` resumes after.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Fetched, PageJumpEngine, Plan};
use crate::bookmark::KeyDims;
use crate::cursor::CursorDirection;
use crate::error::PagerError;
use crate::filter::Document;
use crate::keyset::KeysetPredicate;
use crate::page::{PageInfo, PagePath};
use crate::sort::pick_anchor;

impl PageJumpEngine {
    /// Serve `page >= 2`.
    pub(super) async fn jump_to(&self, plan: &Plan<'_>, page: u64) -> Result<Fetched, PagerError> {
        let jump = plan.request.jump.unwrap_or_default();
        let step = jump.step.unwrap_or(self.config.jump.step).max(1);
        let max_hops = jump.max_hops.unwrap_or(self.config.jump.max_hops).max(1);

        let offset = plan.request.offset_jump.unwrap_or_default();
        let offset_enabled = offset.enable.unwrap_or(self.config.offset_jump.enable);
        let max_skip = offset.max_skip.unwrap_or(self.config.offset_jump.max_skip);

        let dims = plan.dims(self.store.as_ref());
        let skip = (page - 1).saturating_mul(plan.limit);

        if offset_enabled && skip <= max_skip {
            return self.offset_fallback(plan, &dims, page, skip).await;
        }
        self.bookmark_hop(plan, &dims, page, step, max_hops).await
    }

    async fn offset_fallback(
        &self,
        plan: &Plan<'_>,
        dims: &KeyDims,
        page: u64,
        skip: u64,
    ) -> Result<Fetched, PagerError> {
        debug!(page, skip, "offset jump");
        let rows = self.query(plan.window(plan.sort.clone(), None, skip)).await?;
        let (items, mut page_info) = self.assembler(plan).assemble(rows, None, true)?;
        page_info.current_page = Some(page);

        if let Some(end) = &page_info.end_cursor {
            self.save_bookmark(dims, page, end).await;
        }

        Ok(Fetched {
            items,
            page_info,
            path: PagePath::OffsetFallback,
            bookmark_hit: false,
            hops: 1,
        })
    }

    async fn bookmark_hop(
        &self,
        plan: &Plan<'_>,
        dims: &KeyDims,
        target: u64,
        step: u64,
        max_hops: u64,
    ) -> Result<Fetched, PagerError> {
        let (start_page, mut anchor) = match self.nearest_bookmark(plan, dims, target, step).await {
            Some((page, anchor)) => (page, Some(anchor)),
            None => (0, None),
        };

        let remaining = target - start_page;
        if remaining > max_hops {
            debug!(page = target, start_page, remaining, max_hops, "jump exceeds hop bound");
            return Err(PagerError::JumpTooFar {
                target_page: target,
                remaining,
                max_hops,
            });
        }
        let bookmark_hit = start_page > 0;
        if bookmark_hit {
            info!(page = target, from = start_page, "resuming from bookmark");
        }

        let limit = usize::try_from(plan.limit).unwrap_or(usize::MAX);
        let mut hops = 0;

        for current in (start_page + 1)..=target {
            let predicate = anchor
                .as_ref()
                .and_then(|a| KeysetPredicate::after(&plan.sort, a))
                .map(|p| p.to_document());
            let mut rows = self.query(plan.window(plan.sort.clone(), predicate, 0)).await?;
            hops += 1;
            debug!(page = current, target_page = target, rows = rows.len(), "hop");

            if current == target {
                let (items, mut page_info) =
                    self.assembler(plan).assemble(rows, None, target > 1)?;
                page_info.current_page = Some(target);
                if target % step == 0
                    && let Some(end) = &page_info.end_cursor
                {
                    self.save_bookmark(dims, target, end).await;
                }
                return Ok(Fetched {
                    items,
                    page_info,
                    path: PagePath::BookmarkHop,
                    bookmark_hit,
                    hops,
                });
            }

            let has_more = rows.len() > limit;
            rows.truncate(limit);
            let Some(last) = rows.last() else {
                break;
            };
            let next = pick_anchor(last, &plan.sort);

            if current % step == 0 {
                let token = self
                    .codec
                    .encode(&plan.sort, &next, Some(CursorDirection::After))?;
                self.save_bookmark(dims, current, &token).await;
            }
            if !has_more {
                break;
            }
            anchor = Some(next);
        }

        debug!(page = target, hops, "rows ran out before target page");
        Ok(Fetched {
            items: Vec::new(),
            page_info: PageInfo::past_end(target),
            path: PagePath::BookmarkHop,
            bookmark_hit,
            hops,
        })
    }

    /// Closest usable bookmark below `target`: the page right before it,
    /// then the last `step` boundary.
    async fn nearest_bookmark(
        &self,
        plan: &Plan<'_>,
        dims: &KeyDims,
        target: u64,
        step: u64,
    ) -> Option<(u64, Document)> {
        let previous = target - 1;
        let boundary = previous / step * step;

        let mut candidates = vec![previous];
        if boundary != previous {
            candidates.push(boundary);
        }

        for page in candidates.into_iter().filter(|p| *p > 0) {
            if let Some(anchor) = self.load_bookmark(plan, dims, page).await {
                return Some((page, anchor));
            }
        }
        None
    }

    async fn load_bookmark(&self, plan: &Plan<'_>, dims: &KeyDims, page: u64) -> Option<Document> {
        let key = self.keys.bookmark_key(dims, page);
        let value = match self.cache.get(&key).await {
            Ok(value) => value?,
            Err(err) => {
                warn!(%key, error = %err, "bookmark read failed");
                return None;
            }
        };

        let Some(token) = value.as_str() else {
            warn!(%key, "ignoring non-string bookmark");
            return None;
        };
        match self.codec.decode(token) {
            Ok(cursor) if cursor.sort == plan.sort && !cursor.anchor.is_empty() => {
                Some(cursor.anchor)
            }
            Ok(_) => {
                warn!(%key, "ignoring bookmark taken under another sort");
                None
            }
            Err(err) => {
                warn!(%key, error = %err, "ignoring undecodable bookmark");
                None
            }
        }
    }

    async fn save_bookmark(&self, dims: &KeyDims, page: u64, token: &str) {
        let key = self.keys.bookmark_key(dims, page);
        match self
            .cache
            .set(&key, Value::from(token), self.config.bookmark_ttl())
            .await
        {
            Ok(()) => debug!(%key, page, "bookmark written"),
            Err(err) => warn!(%key, error = %err, "bookmark write failed"),
        }
    }
}
