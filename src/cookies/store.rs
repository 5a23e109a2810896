//! Cookie storage backends.
//!
//! The jar talks to a `document.cookie`-shaped backend: reads see a single
//! header of live pairs, writes hand over one `Set-Cookie`-compatible pair
//! at a time. Embedders wrap their webview's cookie access in this trait;
//! [`MemoryCookieStore`] backs tests and headless embedders.

// ============================================================================
// Imports
// ============================================================================

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::trace;

// ============================================================================
// CookieStore
// ============================================================================

/// Backend abstraction over the embedder's cookie access.
pub trait CookieStore: Send + Sync {
    /// Returns the live cookie header: `k=v; k2=v2` (encoded halves).
    fn header(&self) -> String;

    /// Applies one `key=value; expires=<RFC date>` pair.
    ///
    /// An expiry in the past deletes the cookie.
    fn set(&self, pair: &str);
}

// ============================================================================
// MemoryCookieStore
// ============================================================================

/// In-process [`CookieStore`] honoring `expires` attributes.
#[derive(Default)]
pub struct MemoryCookieStore {
    /// Encoded key → encoded value.
    pairs: Mutex<FxHashMap<String, String>>,
}

impl MemoryCookieStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of live cookies.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.lock().len()
    }

    /// Returns `true` if the store holds no cookies.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.lock().is_empty()
    }
}

impl CookieStore for MemoryCookieStore {
    fn header(&self) -> String {
        let pairs = self.pairs.lock();
        let mut entries: Vec<String> = pairs
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        // Deterministic header for tests and logs.
        entries.sort();
        entries.join("; ")
    }

    fn set(&self, pair: &str) {
        let mut attributes = pair.split("; ");

        let Some((key, value)) = attributes.next().and_then(|kv| kv.split_once('=')) else {
            trace!(pair = %pair, "Ignoring malformed cookie pair");
            return;
        };

        let expired = attributes
            .filter_map(|attr| attr.split_once('='))
            .find(|(name, _)| name.eq_ignore_ascii_case("expires"))
            .and_then(|(_, stamp)| parse_expiry(stamp))
            .is_some_and(|expiry| expiry <= Utc::now());

        let mut pairs = self.pairs.lock();
        if expired {
            pairs.remove(key);
        } else {
            pairs.insert(key.to_string(), value.to_string());
        }
    }
}

/// Parses an `expires` stamp (`Fri, 29 Aug 2026 12:00:00 GMT`).
fn parse_expiry(stamp: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(stamp)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_header() {
        let store = MemoryCookieStore::new();
        store.set("b=2; expires=Fri, 01 Jan 2100 00:00:00 GMT");
        store.set("a=1; expires=Fri, 01 Jan 2100 00:00:00 GMT");

        assert_eq!(store.header(), "a=1; b=2");
    }

    #[test]
    fn test_past_expiry_deletes() {
        let store = MemoryCookieStore::new();
        store.set("k=v; expires=Fri, 01 Jan 2100 00:00:00 GMT");
        assert_eq!(store.len(), 1);

        store.set("k=; expires=Thu, 01 Jan 1970 00:00:00 GMT");
        assert!(store.is_empty());
    }

    #[test]
    fn test_pair_without_expiry_is_stored() {
        let store = MemoryCookieStore::new();
        store.set("session=abc");
        assert_eq!(store.header(), "session=abc");
    }

    #[test]
    fn test_malformed_pair_ignored() {
        let store = MemoryCookieStore::new();
        store.set("no-equals-sign");
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_expiry() {
        let expiry = parse_expiry("Thu, 01 Jan 1970 00:00:00 GMT").expect("parse");
        assert_eq!(expiry.timestamp(), 0);
        assert!(parse_expiry("not a date").is_none());
    }
}
