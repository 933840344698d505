//! Request-shape checks that run before any store access.

use thiserror::Error;

use crate::error::PagerError;
use crate::request::PageRequest;
use crate::sort::SortSpec;

/// Default upper bound on `limit`.
pub const DEFAULT_MAX_LIMIT: i64 = 500;

/// A request that cannot be served as written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ValidationError {
    /// `limit` is not in `1..=max`.
    #[error("limit must be an integer between 1 and {max}, got {limit}")]
    InvalidLimit {
        /// The requested limit.
        limit: i64,
        /// The configured maximum.
        max: i64,
    },
    /// Both `after` and `before` were given.
    #[error("after and before are mutually exclusive")]
    CursorConflict,
    /// `page` was combined with `after` or `before`.
    #[error("page cannot be combined with after/before")]
    PageWithCursor,
    /// `page` is below 1.
    #[error("page must be >= 1, got {0}")]
    InvalidPage(i64),
    /// A jump option is zero.
    #[error("{0} must be >= 1")]
    InvalidJumpOption(&'static str),
}

/// Validates [`PageRequest`] shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestValidator {
    max_limit: i64,
}

impl Default for RequestValidator {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LIMIT)
    }
}

impl RequestValidator {
    /// A validator accepting limits up to `max_limit`.
    #[must_use]
    pub const fn new(max_limit: i64) -> Self {
        Self { max_limit }
    }

    /// The configured maximum limit.
    #[must_use]
    pub const fn max_limit(&self) -> i64 {
        self.max_limit
    }

    /// Check limit bounds, cursor exclusivity and page/jump values.
    pub fn validate(&self, request: &PageRequest) -> Result<(), ValidationError> {
        if request.limit < 1 || request.limit > self.max_limit {
            return Err(ValidationError::InvalidLimit {
                limit: request.limit,
                max: self.max_limit,
            });
        }

        if request.after.is_some() && request.before.is_some() {
            return Err(ValidationError::CursorConflict);
        }

        if let Some(page) = request.page {
            if request.after.is_some() || request.before.is_some() {
                return Err(ValidationError::PageWithCursor);
            }
            if page < 1 {
                return Err(ValidationError::InvalidPage(page));
            }
        }

        if let Some(jump) = &request.jump {
            if jump.step == Some(0) {
                return Err(ValidationError::InvalidJumpOption("jump.step"));
            }
            if jump.max_hops == Some(0) {
                return Err(ValidationError::InvalidJumpOption("jump.maxHops"));
            }
        }

        Ok(())
    }
}

/// Require a decoded cursor's sort to equal the request's effective sort.
///
/// Field set, order and direction must all match.
pub fn assert_cursor_sort_compatible(
    current: &SortSpec,
    cursor_sort: &SortSpec,
) -> Result<(), PagerError> {
    if current == cursor_sort {
        Ok(())
    } else {
        Err(PagerError::CursorSortMismatch {
            expected: current.clone(),
            found: cursor_sort.clone(),
        })
    }
}
