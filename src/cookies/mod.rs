//! Turn-scoped cookie cache.
//!
//! Higher-level modules persist small pieces of state in the embedder's
//! cookie store. Parsing the cookie header is not free, so the jar caches a
//! parsed snapshot for the duration of the current event-loop turn:
//!
//! - Reads within one turn are stable even if the underlying store changes
//!   externally.
//! - Writes go through to the store *and* update a live snapshot in place,
//!   so the bridge never observes its own writes as stale.
//! - The snapshot is discarded at the next turn boundary, and on
//!   page-visibility-restore (so cross-page writes become observable).
//!
//! # Wire Format
//!
//! Standard `Set-Cookie`-compatible pairs: `key=value; expires=<RFC date>`.
//! Keys and values are percent-encoded; non-string values are
//! JSON-serialized before encoding.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `store` | [`CookieStore`] backend trait, [`MemoryCookieStore`] |

// ============================================================================
// Submodules
// ============================================================================

/// Cookie storage backends.
pub mod store;

// ============================================================================
// Re-exports
// ============================================================================

pub use store::{CookieStore, MemoryCookieStore};

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace};

// ============================================================================
// Constants
// ============================================================================

/// Default cookie lifetime: 30 days.
pub const DEFAULT_COOKIE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Expiry stamp used to delete a cookie.
const EPOCH_EXPIRY: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

// ============================================================================
// CookieJar
// ============================================================================

/// Read-through, write-through cache over a [`CookieStore`].
///
/// Cloning is cheap; clones share the snapshot and backend.
#[derive(Clone)]
pub struct CookieJar {
    store: Arc<dyn CookieStore>,
    /// Parsed header snapshot, live for the current turn only.
    snapshot: Arc<Mutex<Option<FxHashMap<String, String>>>>,
    default_ttl: Duration,
}

impl CookieJar {
    /// Creates a jar over the given backend.
    pub fn new(store: Arc<dyn CookieStore>, default_ttl: Duration) -> Self {
        Self {
            store,
            snapshot: Arc::new(Mutex::new(None)),
            default_ttl,
        }
    }

    /// Reads a cookie value.
    ///
    /// Populates the snapshot from the backend header on first read of the
    /// turn; subsequent reads in the same turn hit the snapshot.
    #[must_use]
    pub fn read(&self, key: &str) -> Option<String> {
        let mut snapshot = self.snapshot.lock();

        if snapshot.is_none() {
            *snapshot = Some(parse_header(&self.store.header()));
            self.schedule_invalidation();
            trace!("Cookie snapshot populated");
        }

        snapshot.as_ref().and_then(|map| map.get(key).cloned())
    }

    /// Writes a cookie with the default TTL (30 days).
    pub fn write(&self, key: &str, value: &str) {
        self.write_with_ttl(key, value, self.default_ttl);
    }

    /// Writes a cookie with an explicit TTL.
    pub fn write_with_ttl(&self, key: &str, value: &str, ttl: Duration) {
        let expires = Utc::now() + chrono::Duration::from_std(ttl).unwrap_or_default();
        let pair = format!(
            "{}={}; expires={}",
            urlencoding::encode(key),
            urlencoding::encode(value),
            expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        );
        self.store.set(&pair);

        // Write-through: a live snapshot must observe this turn's writes.
        if let Some(map) = self.snapshot.lock().as_mut() {
            map.insert(key.to_string(), value.to_string());
        }

        debug!(key = %key, ttl_secs = ttl.as_secs(), "Cookie written");
    }

    /// Writes a non-string value, JSON-serializing it first.
    pub fn write_value(&self, key: &str, value: &Value) {
        match value {
            Value::String(s) => self.write(key, s),
            other => self.write(key, &other.to_string()),
        }
    }

    /// Deletes a cookie (expiry in the past).
    pub fn delete(&self, key: &str) {
        let pair = format!(
            "{}=; expires={}",
            urlencoding::encode(key),
            EPOCH_EXPIRY,
        );
        self.store.set(&pair);

        if let Some(map) = self.snapshot.lock().as_mut() {
            map.remove(key);
        }

        debug!(key = %key, "Cookie deleted");
    }

    /// Forces snapshot discard.
    ///
    /// Called on page-show so cookie writes from other pages are observed.
    pub fn invalidate(&self) {
        *self.snapshot.lock() = None;
        trace!("Cookie snapshot invalidated");
    }

    /// Schedules snapshot discard for the end of the current turn.
    ///
    /// Outside a tokio runtime the snapshot stays live until an explicit
    /// [`CookieJar::invalidate`].
    fn schedule_invalidation(&self) {
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let snapshot = Arc::clone(&self.snapshot);
            handle.spawn(async move {
                *snapshot.lock() = None;
            });
        }
    }
}

// ============================================================================
// Header Parsing
// ============================================================================

/// Parses a cookie header (`k=v; k2=v2`) into a key→value map.
///
/// Both halves are percent-decoded; pairs without `=` are skipped.
fn parse_header(header: &str) -> FxHashMap<String, String> {
    let mut map = FxHashMap::default();

    for pair in header.split("; ") {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        let key = urlencoding::decode(key)
            .map(|k| k.into_owned())
            .unwrap_or_else(|_| key.to_string());
        let value = urlencoding::decode(value)
            .map(|v| v.into_owned())
            .unwrap_or_else(|_| value.to_string());
        map.insert(key, value);
    }

    map
}

// ============================================================================
// Tests
// ============================================================================
