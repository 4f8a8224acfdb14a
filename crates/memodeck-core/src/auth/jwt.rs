//! JWT payload inspection.
//!
//! `decode_jwt_payload` splits a compact JWT and base64url-decodes the
//! claims segment so callers can read expiry and user metadata.
//!
//! This is a trust-but-inspect decoder: it performs **no signature
//! verification** and must never be used as an authorization check on its
//! own. Tokens reaching this layer were issued by the backend and already
//! authenticated there; the decoder only answers "what does this token
//! claim", not "is this token genuine".

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims carried in a memodeck access token.
///
/// Unknown claims are preserved in `extra` so callers can inspect
/// backend-specific fields without this type needing to know them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JwtPayload {
    /// Subject of the token.
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Issued-at, epoch seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Expiry, epoch seconds. Absent means the token is treated as expired.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Any further claims, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Decode the claims segment of a compact JWT.
///
/// Returns `None` for anything that is not a well-formed three-segment
/// token with base64url-encoded JSON claims: wrong segment count, invalid
/// base64, non-UTF-8 bytes, or claims that are not a JSON object. Never
/// panics.
pub fn decode_jwt_payload(token: &str) -> Option<JwtPayload> {
    let mut segments = token.split('.');
    let (_header, payload) = (segments.next()?, segments.next()?);
    let _signature = segments.next()?;
    if segments.next().is_some() {
        return None;
    }

    // Tokens arrive both padded and unpadded in the wild; strip padding
    // before handing to the no-pad engine.
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    serde_json::from_str(&text).ok()
}

#[cfg(test)]
pub(crate) fn encode_jwt_payload(payload: &JwtPayload) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(payload).unwrap());
    format!("{}.{}.signature", header, claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload_with(exp: Option<i64>) -> JwtPayload {
        JwtPayload {
            user_id: Some("user-42".to_string()),
            iat: Some(1_700_000_000),
            exp,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn test_round_trip() {
        let mut payload = payload_with(Some(1_700_003_600));
        payload
            .extra
            .insert("deckCount".to_string(), json!(12));

        let token = encode_jwt_payload(&payload);
        let decoded = decode_jwt_payload(&token).expect("round trip should decode");
        assert_eq!(decoded, payload);
    }

    #[test]
    fn test_accepts_padded_segment() {
        // A claims segment whose length forces '=' padding under plain base64.
        let claims = base64::engine::general_purpose::URL_SAFE
            .encode(br#"{"userId":"u","exp":5}"#);
        let token = format!("header.{}.sig", claims);
        let decoded = decode_jwt_payload(&token).expect("padded segment should decode");
        assert_eq!(decoded.user_id.as_deref(), Some("u"));
        assert_eq!(decoded.exp, Some(5));
    }

    #[test]
    fn test_wrong_segment_count() {
        assert!(decode_jwt_payload("").is_none());
        assert!(decode_jwt_payload("only-one-segment").is_none());
        assert!(decode_jwt_payload("two.segments").is_none());
        assert!(decode_jwt_payload("a.b.c.d").is_none());
    }

    #[test]
    fn test_invalid_base64() {
        assert!(decode_jwt_payload("header.!!!not-base64!!!.sig").is_none());
    }

    #[test]
    fn test_invalid_json() {
        let claims = URL_SAFE_NO_PAD.encode(b"not json at all");
        assert!(decode_jwt_payload(&format!("h.{}.s", claims)).is_none());
    }

    #[test]
    fn test_non_object_claims() {
        let claims = URL_SAFE_NO_PAD.encode(b"[1,2,3]");
        assert!(decode_jwt_payload(&format!("h.{}.s", claims)).is_none());
    }

    #[test]
    fn test_missing_optional_claims() {
        let claims = URL_SAFE_NO_PAD.encode(br#"{"custom":"value"}"#);
        let decoded = decode_jwt_payload(&format!("h.{}.s", claims)).unwrap();
        assert!(decoded.user_id.is_none());
        assert!(decoded.exp.is_none());
        assert_eq!(decoded.extra.get("custom"), Some(&json!("value")));
    }
}
