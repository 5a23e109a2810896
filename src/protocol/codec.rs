//! Query codec: deterministic serialization into URL-query-safe strings.
//!
//! Used by the URL-scheme transport, which has no way to hand the host a
//! structured value and must flatten everything into
//! `scheme://method?parameters=<encoded>`.
//!
//! # Encoding Rules
//!
//! | Input | [`encode_value`] output |
//! |-------|-------------------------|
//! | `null`, `""` | `""` |
//! | string | percent-encoded string |
//! | anything else | percent-encoded compact JSON |
//!
//! [`encode_query`] adds the query-string layer: arrays join their encoded
//! elements with `&` (positional, no keys), objects emit
//! `encodedKey=encodedValue` pairs (bare key when the value is empty).
//!
//! # Round Trip
//!
//! [`decode_value`] (percent-decode, JSON-parse, fall back to raw string)
//! reproduces any JSON-serializable input of [`encode_value`]. The one
//! deliberate unification: both `null` and `""` encode to the empty string,
//! which decodes to `null`.

// ============================================================================
// Imports
// ============================================================================

use std::borrow::Cow;

use serde_json::Value;

// ============================================================================
// Encoding
// ============================================================================

/// Encodes a single value into a URL-safe string.
///
/// `Null` and the empty string encode to `""`. Other strings are
/// percent-encoded directly (no JSON quoting), everything else is
/// percent-encoded compact JSON.
#[must_use]
pub fn encode_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) if s.is_empty() => String::new(),
        Value::String(s) => urlencoding::encode(s).into_owned(),
        other => urlencoding::encode(&other.to_string()).into_owned(),
    }
}

/// Encodes a value as a query string.
///
/// - Array: each element through [`encode_value`], joined with `&`. Element
///   positions carry the meaning; no keys are emitted.
/// - Object: per key, `encodedKey=encodedValue`, or the bare encoded key
///   when the value is empty (`null` / `""`), joined with `&`.
/// - String / scalar: [`encode_value`].
/// - `Null`: `""`.
#[must_use]
pub fn encode_query(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(encode_value)
            .collect::<Vec<_>>()
            .join("&"),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| {
                let encoded_key = urlencoding::encode(key);
                if is_empty_value(value) {
                    encoded_key.into_owned()
                } else {
                    format!("{}={}", encoded_key, encode_value(value))
                }
            })
            .collect::<Vec<_>>()
            .join("&"),
        other => encode_value(other),
    }
}

/// Returns `true` for values an object entry emits as a bare key.
#[inline]
fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

// ============================================================================
// Decoding
// ============================================================================

/// Decodes a string produced by [`encode_value`].
///
/// Percent-decodes, then attempts a JSON parse; inputs that are not valid
/// JSON come back as plain strings. The empty string decodes to `Null`.
#[must_use]
pub fn decode_value(encoded: &str) -> Value {
    if encoded.is_empty() {
        return Value::Null;
    }

    let decoded: Cow<'_, str> = urlencoding::decode(encoded)
        .unwrap_or_else(|_| Cow::Borrowed(encoded));

    serde_json::from_str(&decoded).unwrap_or_else(|_| Value::String(decoded.into_owned()))
}

// ============================================================================
// Tests
// ============================================================================
