//! Page results and the window-to-page assembler.

use serde::{Deserialize, Serialize};

use crate::cursor::{CursorCodec, CursorDirection, EncodeError};
use crate::filter::Document;
use crate::sort::{SortSpec, pick_anchor};
use crate::totals::TotalsRecord;

/// Page information for paginated responses.
///
/// `start_cursor` and `end_cursor` always resume forwards, whichever
/// direction the page itself was fetched in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// Whether there are more items after this page.
    pub has_next: bool,
    /// Whether there are items before this page.
    pub has_prev: bool,
    /// Cursor at the first item.
    pub start_cursor: Option<String>,
    /// Cursor at the last item.
    pub end_cursor: Option<String>,
    /// 1-based page number, for page-addressed requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_page: Option<u64>,
}

impl PageInfo {
    /// Info for a page past the end of the data.
    #[must_use]
    pub const fn past_end(page: u64) -> Self {
        Self {
            has_next: false,
            has_prev: true,
            start_cursor: None,
            end_cursor: None,
            current_page: Some(page),
        }
    }
}

/// Which dispatch path produced a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePath {
    /// `after`/`before` cursor.
    DirectCursor,
    /// No cursor and no page beyond the first.
    FirstPage,
    /// Skip-based jump.
    OffsetFallback,
    /// Bookmark-assisted walk.
    BookmarkHop,
}

/// Timing and dispatch details, attached when requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Always `"findPage"`.
    pub op: String,
    /// Wall time of the call.
    pub duration_ms: u64,
    /// Dispatch path taken.
    pub path: PagePath,
    /// Whether a cached bookmark was used.
    pub bookmark_hit: bool,
    /// Store window fetches performed.
    pub hops: u64,
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult {
    /// Rows in forward sort order.
    pub items: Vec<Document>,
    /// Navigation state.
    pub page_info: PageInfo,
    /// Totals, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totals: Option<TotalsRecord>,
    /// Metadata, when requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Turns an over-fetched window (`limit + 1` rows) into a page.
#[derive(Debug, Clone, Copy)]
pub struct PageAssembler<'a> {
    codec: &'a CursorCodec,
    sort: &'a SortSpec,
    limit: usize,
}

impl<'a> PageAssembler<'a> {
    /// Assemble pages of `limit` rows sorted by `sort`.
    #[must_use]
    pub const fn new(codec: &'a CursorCodec, sort: &'a SortSpec, limit: usize) -> Self {
        Self { codec, sort, limit }
    }

    /// Trim the lookahead row and work out navigation.
    ///
    /// For [`CursorDirection::Before`], `rows` arrive in reverse sort order
    /// and are restored to forward order here.
    pub fn assemble(
        &self,
        mut rows: Vec<Document>,
        direction: Option<CursorDirection>,
        has_cursor: bool,
    ) -> Result<(Vec<Document>, PageInfo), EncodeError> {
        let has_more = rows.len() > self.limit;
        rows.truncate(self.limit);

        let (has_next, has_prev) = match direction {
            Some(CursorDirection::Before) => {
                rows.reverse();
                (has_cursor, has_more)
            }
            Some(CursorDirection::After) | None => (has_more, has_cursor),
        };

        let start_cursor = rows.first().map(|row| self.cursor_at(row)).transpose()?;
        let end_cursor = rows.last().map(|row| self.cursor_at(row)).transpose()?;

        Ok((rows, PageInfo {
            has_next,
            has_prev,
            start_cursor,
            end_cursor,
            current_page: None,
        }))
    }

    fn cursor_at(&self, row: &Document) -> Result<String, EncodeError> {
        self.codec.encode(
            self.sort,
            &pick_anchor(row, self.sort),
            Some(CursorDirection::After),
        )
    }
}
