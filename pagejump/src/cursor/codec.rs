//! Cursor encode/decode with an optional signing hook.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};

use super::encoding::{base64_decode, base64_encode, frame, unframe};
use super::{CURSOR_VERSION, Cursor, CursorDirection, CursorError, EncodeError, MAX_CURSOR_SIZE};
use crate::filter::Document;
use crate::sort::SortSpec;

/// Signs and verifies cursor payloads.
///
/// Nothing ships implementing this; it is the hook for services that need
/// tamper-evident cursors (e.g. an HMAC keyed by a server secret).
pub trait CursorSigner: Send + Sync {
    /// Produce a signature over `payload`.
    fn sign(&self, payload: &[u8]) -> Vec<u8>;
    /// Check `signature` against `payload`.
    fn verify(&self, payload: &[u8], signature: &[u8]) -> bool;
}

/// Encodes and decodes cursor tokens.
///
/// Without a signer a token is `base64url(frame(json))`. With a signer the
/// token gains a `.`-separated base64url signature over the framed payload.
#[derive(Clone, Default)]
pub struct CursorCodec {
    signer: Option<Arc<dyn CursorSigner>>,
}

impl fmt::Debug for CursorCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CursorCodec")
            .field("signed", &self.signer.is_some())
            .finish()
    }
}

impl CursorCodec {
    /// A codec without signing.
    #[must_use]
    pub const fn new() -> Self {
        Self { signer: None }
    }

    /// A codec that signs on encode and verifies on decode.
    #[must_use]
    pub fn with_signer(signer: Arc<dyn CursorSigner>) -> Self {
        Self {
            signer: Some(signer),
        }
    }

    /// Encode `sort` and `anchor` (and optionally a direction tag) as a token.
    pub fn encode(
        &self,
        sort: &SortSpec,
        anchor: &Document,
        direction: Option<CursorDirection>,
    ) -> Result<String, EncodeError> {
        if sort.is_empty() {
            return Err(EncodeError::MissingSort);
        }
        if anchor.is_empty() {
            return Err(EncodeError::MissingAnchor);
        }

        let mut envelope = Map::new();
        envelope.insert("v".into(), Value::from(CURSOR_VERSION));
        envelope.insert("s".into(), sort.to_document());
        envelope.insert("a".into(), Value::Object(anchor.clone()));
        if let Some(direction) = direction {
            envelope.insert("d".into(), Value::from(direction.as_str()));
        }

        let framed = frame(&Value::Object(envelope).to_string());
        let mut token = base64_encode(framed.as_bytes());
        if let Some(signer) = &self.signer {
            token.push('.');
            token.push_str(&base64_encode(&signer.sign(framed.as_bytes())));
        }
        Ok(token)
    }

    /// Decode a token produced by [`encode`](Self::encode).
    pub fn decode(&self, token: &str) -> Result<Cursor, CursorError> {
        // Check size before decoding to bound the work per token
        if token.len() > MAX_CURSOR_SIZE {
            return Err(CursorError::TooLarge);
        }

        let (body, signature) = match token.split_once('.') {
            Some((body, sig)) => (body, Some(sig)),
            None => (token, None),
        };

        let payload = base64_decode(body).ok_or(CursorError::InvalidBase64)?;

        if let Some(signer) = &self.signer {
            let signature = signature
                .and_then(base64_decode)
                .ok_or(CursorError::BadSignature)?;
            if !signer.verify(&payload, &signature) {
                return Err(CursorError::BadSignature);
            }
        } else if signature.is_some() {
            return Err(CursorError::InvalidFormat);
        }

        let text = String::from_utf8(payload).map_err(|_| CursorError::InvalidFormat)?;
        let json = unframe(&text).ok_or(CursorError::InvalidFormat)?;
        let envelope: Value = serde_json::from_str(json).map_err(|_| CursorError::InvalidFormat)?;
        parse_envelope(&envelope)
    }
}

fn parse_envelope(envelope: &Value) -> Result<Cursor, CursorError> {
    let obj = envelope.as_object().ok_or(CursorError::InvalidFormat)?;

    let version = obj
        .get("v")
        .and_then(Value::as_u64)
        .ok_or(CursorError::UnsupportedVersion)?;
    if version != CURSOR_VERSION {
        return Err(CursorError::UnsupportedVersion);
    }

    let sort = obj.get("s");
    let anchor = obj.get("a");
    if sort.is_none() && anchor.is_none() {
        return Err(CursorError::MissingFields);
    }

    let sort = match sort {
        Some(value) => SortSpec::from_document(value).map_err(|_| CursorError::InvalidFormat)?,
        None => SortSpec::new(),
    };
    let anchor = match anchor {
        Some(Value::Object(values)) => values.clone(),
        Some(_) => return Err(CursorError::InvalidFormat),
        None => Document::new(),
    };
    let direction = match obj.get("d") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s == "after" => Some(CursorDirection::After),
        Some(Value::String(s)) if s == "before" => Some(CursorDirection::Before),
        Some(_) => return Err(CursorError::InvalidFormat),
    };

    Ok(Cursor {
        version,
        sort,
        anchor,
        direction,
    })
}

/// Encode with an unsigned [`CursorCodec`].
pub fn encode_cursor(
    sort: &SortSpec,
    anchor: &Document,
    direction: Option<CursorDirection>,
) -> Result<String, EncodeError> {
    CursorCodec::new().encode(sort, anchor, direction)
}

/// Decode with an unsigned [`CursorCodec`].
pub fn decode_cursor(token: &str) -> Result<Cursor, CursorError> {
    CursorCodec::new().decode(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn raw_token(json: &str) -> String {
        base64_encode(frame(json).as_bytes())
    }

    #[test]
    fn test_cursor_encode_decode() {
        let sort = SortSpec::new().desc("createdAt").asc("_id");
        let anchor = doc(json!({"createdAt": "2024-01-01", "_id": 100}));

        let token = encode_cursor(&sort, &anchor, Some(CursorDirection::After)).unwrap();
        let cursor = decode_cursor(&token).unwrap();

        assert_eq!(cursor.version, 1);
        assert_eq!(cursor.sort, sort);
        assert_eq!(cursor.anchor, anchor);
        assert_eq!(cursor.direction, Some(CursorDirection::After));
    }

    #[test]
    fn test_cursor_without_direction() {
        let sort = SortSpec::new().asc("_id");
        let token = encode_cursor(&sort, &doc(json!({"_id": 1})), None).unwrap();
        assert_eq!(decode_cursor(&token).unwrap().direction, None);
    }

    #[test]
    fn test_cursor_with_special_json_characters() {
        let sort = SortSpec::new().asc("name").asc("_id");
        let anchor = doc(json!({
            "name": "say \"hello\"\n\t\u{0}\u{1f} path\\to",
            "_id": {"nested": [null, 1.5, {"deep": "ü"}]}
        }));

        let token = encode_cursor(&sort, &anchor, None).unwrap();
        assert!(!token.contains(['+', '/', '=']));
        assert_eq!(decode_cursor(&token).unwrap().anchor, anchor);
    }

    #[test]
    fn test_encode_requires_sort_and_anchor() {
        let anchor = doc(json!({"_id": 1}));
        assert_eq!(
            encode_cursor(&SortSpec::new(), &anchor, None),
            Err(EncodeError::MissingSort)
        );
        assert_eq!(
            encode_cursor(&SortSpec::new().asc("_id"), &Document::new(), None),
            Err(EncodeError::MissingAnchor)
        );
    }

    #[test]
    fn test_cursor_invalid_base64() {
        assert_eq!(
            decode_cursor("not valid base64!!!"),
            Err(CursorError::InvalidBase64)
        );
    }

    #[test]
    fn test_cursor_not_json() {
        assert_eq!(decode_cursor(&raw_token("nope")), Err(CursorError::InvalidFormat));
        assert_eq!(
            decode_cursor(&base64_encode(b"{\"v\":1}")),
            Err(CursorError::InvalidFormat),
            "unframed payloads are rejected"
        );
    }

    #[test]
    fn test_cursor_wrong_version() {
        assert_eq!(
            decode_cursor(&raw_token(r#"{"v":2,"s":{"_id":1},"a":{"_id":1}}"#)),
            Err(CursorError::UnsupportedVersion)
        );
        assert_eq!(
            decode_cursor(&raw_token(r#"{"s":{"_id":1},"a":{"_id":1}}"#)),
            Err(CursorError::UnsupportedVersion)
        );
    }

    #[test]
    fn test_cursor_missing_sort_and_anchor() {
        assert_eq!(
            decode_cursor(&raw_token(r#"{"v":1}"#)),
            Err(CursorError::MissingFields)
        );
    }

    #[test]
    fn test_cursor_with_only_anchor_decodes_with_empty_sort() {
        let cursor = decode_cursor(&raw_token(r#"{"v":1,"a":{"_id":5}}"#)).unwrap();
        assert!(cursor.sort.is_empty());
        assert_eq!(cursor.anchor.get("_id"), Some(&json!(5)));
    }

    #[test]
    fn test_cursor_too_large() {
        let oversized = "a".repeat(MAX_CURSOR_SIZE + 1);
        assert_eq!(decode_cursor(&oversized), Err(CursorError::TooLarge));
    }

    struct XorSigner(u8);

    impl CursorSigner for XorSigner {
        fn sign(&self, payload: &[u8]) -> Vec<u8> {
            payload.iter().rev().map(|b| b ^ self.0).collect()
        }

        fn verify(&self, payload: &[u8], signature: &[u8]) -> bool {
            self.sign(payload) == signature
        }
    }

    #[test]
    fn test_signed_codec_roundtrip_and_tamper_detection() {
        let codec = CursorCodec::with_signer(Arc::new(XorSigner(0x5a)));
        let sort = SortSpec::new().asc("_id");
        let token = codec.encode(&sort, &doc(json!({"_id": 9})), None).unwrap();
        assert!(token.contains('.'));
        assert_eq!(codec.decode(&token).unwrap().anchor.get("_id"), Some(&json!(9)));

        let unsigned = encode_cursor(&sort, &doc(json!({"_id": 10})), None).unwrap();
        assert_eq!(codec.decode(&unsigned), Err(CursorError::BadSignature));

        let (_, sig) = token.split_once('.').unwrap();
        let forged = format!("{unsigned}.{sig}");
        assert_eq!(codec.decode(&forged), Err(CursorError::BadSignature));
    }
}
