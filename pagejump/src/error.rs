//! Error type returned by [`PageJumpEngine::find_page`](crate::PageJumpEngine::find_page).

use thiserror::Error;

use crate::cursor::{CursorError, EncodeError};
use crate::sort::SortSpec;
use crate::store::StoreError;
use crate::validate::ValidationError;

/// Everything `find_page` can fail with.
///
/// Totals never produce one of these; their failures are folded into the
/// returned [`TotalsRecord`](crate::TotalsRecord).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PagerError {
    /// The request shape is invalid.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The cursor token is malformed or structurally incomplete.
    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    /// The cursor was produced under a different sort.
    #[error("cursor sort {found} does not match request sort {expected}")]
    CursorSortMismatch {
        /// The request's effective stable sort.
        expected: SortSpec,
        /// The sort carried by the cursor.
        found: SortSpec,
    },

    /// The target page is further than one call may walk.
    #[error(
        "page {target_page} needs {remaining} sequential hops, more than the {max_hops} allowed per call"
    )]
    JumpTooFar {
        /// Requested page.
        target_page: u64,
        /// Hops needed from the nearest usable bookmark.
        remaining: u64,
        /// Configured hop bound.
        max_hops: u64,
    },

    /// A page cursor could not be encoded.
    #[error("failed to encode cursor: {0}")]
    Encode(#[from] EncodeError),

    /// The document store failed while fetching a page window.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PagerError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidCursor(_) => "INVALID_CURSOR",
            Self::CursorSortMismatch { .. } => "CURSOR_SORT_MISMATCH",
            Self::JumpTooFar { .. } => "JUMP_TOO_FAR",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }

    /// True for malformed cursors and for sort mismatches.
    #[must_use]
    pub const fn is_invalid_cursor(&self) -> bool {
        matches!(self, Self::InvalidCursor(_) | Self::CursorSortMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            PagerError::from(ValidationError::CursorConflict).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            PagerError::from(CursorError::InvalidBase64).code(),
            "INVALID_CURSOR"
        );
        assert_eq!(
            PagerError::from(EncodeError::MissingSort).code(),
            "ENCODE_ERROR"
        );

        let err = PagerError::JumpTooFar {
            target_page: 25,
            remaining: 25,
            max_hops: 5,
        };
        assert_eq!(err.code(), "JUMP_TOO_FAR");
        assert!(!err.is_invalid_cursor());
        assert_eq!(
            err.to_string(),
            "page 25 needs 25 sequential hops, more than the 5 allowed per call"
        );
    }

    #[test]
    fn test_validation_message_is_transparent() {
        let err = PagerError::from(ValidationError::InvalidLimit { limit: 0, max: 500 });
        assert_eq!(err.to_string(), "limit must be an integer between 1 and 500, got 0");
    }
}
