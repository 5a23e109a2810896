//! Builder pattern for bridge configuration.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use webview_bridge::{Bridge, MemoryCookieStore};
//!
//! let bridge = Bridge::builder()
//!     .cookie_store(Arc::new(MemoryCookieStore::new()))
//!     .build();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::cookies::{CookieJar, CookieStore, MemoryCookieStore, DEFAULT_COOKIE_TTL};
use crate::transport::URL_GRACE_PERIOD;

use super::Bridge;

// ============================================================================
// BridgeBuilder
// ============================================================================

/// Builder for configuring a [`Bridge`] instance.
///
/// Use [`Bridge::builder()`] to create a new builder. All settings have
/// defaults; `build()` cannot fail.
pub struct BridgeBuilder {
    /// Cookie backend. Defaults to an in-memory store.
    cookie_store: Option<Arc<dyn CookieStore>>,
    /// Default cookie lifetime.
    cookie_ttl: Duration,
    /// Removal grace for URL-scheme navigables.
    url_grace: Duration,
}

impl Default for BridgeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeBuilder {
    /// Creates a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            cookie_store: None,
            cookie_ttl: DEFAULT_COOKIE_TTL,
            url_grace: URL_GRACE_PERIOD,
        }
    }

    /// Sets the cookie backend.
    ///
    /// Embedders wrap their webview's cookie access; without this the
    /// bridge uses an in-memory store.
    #[inline]
    #[must_use]
    pub fn cookie_store(mut self, store: Arc<dyn CookieStore>) -> Self {
        self.cookie_store = Some(store);
        self
    }

    /// Sets the default cookie lifetime (30 days if unset).
    #[inline]
    #[must_use]
    pub fn cookie_ttl(mut self, ttl: Duration) -> Self {
        self.cookie_ttl = ttl;
        self
    }

    /// Sets the removal grace window for URL-scheme navigables (2s if
    /// unset).
    #[inline]
    #[must_use]
    pub fn url_grace(mut self, grace: Duration) -> Self {
        self.url_grace = grace;
        self
    }

    /// Builds the bridge.
    #[must_use]
    pub fn build(self) -> Bridge {
        let store = self
            .cookie_store
            .unwrap_or_else(|| Arc::new(MemoryCookieStore::new()));
        let cookies = CookieJar::new(store, self.cookie_ttl);

        Bridge::from_parts(self.url_grace, cookies)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use crate::bridge::ReadinessState;

    use super::*;

    #[test]
    fn test_defaults() {
        let builder = BridgeBuilder::new();
        assert_eq!(builder.cookie_ttl, DEFAULT_COOKIE_TTL);
        assert_eq!(builder.url_grace, URL_GRACE_PERIOD);
        assert!(builder.cookie_store.is_none());
    }

    #[test]
    fn test_build_starts_unregistered() {
        let bridge = BridgeBuilder::new()
            .cookie_ttl(Duration::from_secs(60))
            .url_grace(Duration::from_millis(100))
            .build();

        assert_eq!(bridge.state(), ReadinessState::NotRegistered);
        assert!(bridge.mode().is_none());
        assert_eq!(bridge.pending_callbacks(), 0);
    }
}
