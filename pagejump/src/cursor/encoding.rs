//! Framing and base64 helpers for cursor serialization.
//!
//! A cursor body is the canonical JSON of its envelope behind a decimal
//! byte-length prefix (`"57:{...}"`), then URL-safe base64 without
//! padding, so tokens can travel in query strings as-is.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Prefix `body` with its byte length.
pub(super) fn frame(body: &str) -> String {
    format!("{}:{body}", body.len())
}

/// Strip and check the length prefix written by [`frame`].
pub(super) fn unframe(text: &str) -> Option<&str> {
    let (len, body) = text.split_once(':')?;
    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let len: usize = len.parse().ok()?;
    (body.len() == len).then_some(body)
}

pub(super) fn base64_encode(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

pub(super) fn base64_decode(input: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(input).ok()
}
