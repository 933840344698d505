//! Opaque pagination cursors.
//!
//! A cursor carries the sort it was produced under and the anchor values of
//! the row it points at:
//!
//! ```text
//! {"v":1,"s":{"createdAt":-1,"_id":1},"a":{"createdAt":"2024-01-15","_id":42},"d":"after"}
//! ```
//!
//! # Security Note
//!
//! Cursors are encoded, **not encrypted or signed**. Anyone can decode
//! one and read the anchor values, and a client can forge one. Keep
//! sensitive fields out of sort keys, or install a [`CursorSigner`] on the
//! [`CursorCodec`] to reject tampered tokens.
//!
//! ```
//! use pagejump::{CursorCodec, CursorDirection, SortSpec};
//! use serde_json::json;
//!
//! let codec = CursorCodec::new();
//! let sort = SortSpec::new().desc("createdAt").asc("_id");
//! let anchor = json!({"createdAt": "2024-01-15", "_id": 42});
//! let token = codec
//!     .encode(&sort, anchor.as_object().unwrap(), Some(CursorDirection::After))
//!     .unwrap();
//!
//! let cursor = codec.decode(&token).unwrap();
//! assert_eq!(cursor.sort, sort);
//! assert_eq!(cursor.anchor.get("_id"), Some(&json!(42)));
//! ```

mod codec;
mod encoding;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filter::Document;
use crate::sort::SortSpec;

pub use codec::{CursorCodec, CursorSigner, decode_cursor, encode_cursor};

/// Envelope version written by this crate.
pub const CURSOR_VERSION: u64 = 1;

/// Maximum accepted token length (16KB).
///
/// Anchors may hold nested values, so this is looser than a plain id
/// cursor would need, but still caps the decode work per request.
pub const MAX_CURSOR_SIZE: usize = 16 * 1024;

/// Which side of the anchor a cursor resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CursorDirection {
    /// Rows strictly after the anchor.
    After,
    /// Rows strictly before the anchor.
    Before,
}

impl CursorDirection {
    /// Wire tag: `"after"` or `"before"`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::After => "after",
            Self::Before => "before",
        }
    }
}

/// A decoded cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    /// Envelope version (`v`).
    pub version: u64,
    /// Sort the anchor was taken under (`s`). Empty if the token omitted it.
    pub sort: SortSpec,
    /// Anchor values in sort-key order (`a`). Empty if the token omitted it.
    pub anchor: Document,
    /// Direction tag (`d`), if present.
    pub direction: Option<CursorDirection>,
}

/// Errors that can occur when decoding a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CursorError {
    /// The token is not URL-safe base64.
    #[error("invalid base64 encoding in cursor")]
    InvalidBase64,
    /// The payload is not a framed JSON envelope.
    #[error("invalid cursor format")]
    InvalidFormat,
    /// `v` is missing or not the supported version.
    #[error("unsupported cursor version")]
    UnsupportedVersion,
    /// The envelope carries neither a sort nor an anchor.
    #[error("cursor carries neither sort nor anchor")]
    MissingFields,
    /// The token exceeds [`MAX_CURSOR_SIZE`].
    #[error("cursor exceeds maximum size ({}KB limit)", MAX_CURSOR_SIZE / 1024)]
    TooLarge,
    /// A signer is configured and the signature is absent or wrong.
    #[error("cursor signature missing or invalid")]
    BadSignature,
}

/// Errors that can occur when encoding a cursor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum EncodeError {
    /// No sort keys were given.
    #[error("cannot encode a cursor without a sort specification")]
    MissingSort,
    /// No anchor values were given.
    #[error("cannot encode a cursor without anchor values")]
    MissingAnchor,
}
