//! Host configuration delivered by the readiness handshake.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// Configuration
// ============================================================================

/// Opaque configuration value supplied once by the host.
///
/// The core never mutates it: the handshake stores it, and every extension
/// function receives a shared reference. The typed getters return defaults
/// for missing keys, so extensions can probe without error plumbing.
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    value: Value,
}

impl Configuration {
    /// Wraps the raw handshake value.
    #[inline]
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    /// Returns the raw configuration value.
    #[inline]
    #[must_use]
    pub fn raw(&self) -> &Value {
        &self.value
    }

    /// Returns the value for `key`, if present.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.value.get(key)
    }

    /// Gets a string value. Empty string if missing or not a string.
    #[inline]
    #[must_use]
    pub fn get_str(&self, key: &str) -> &str {
        self.get(key).and_then(Value::as_str).unwrap_or_default()
    }

    /// Gets a u64 value. Zero if missing or not a number.
    #[inline]
    #[must_use]
    pub fn get_u64(&self, key: &str) -> u64 {
        self.get(key).and_then(Value::as_u64).unwrap_or_default()
    }

    /// Gets a boolean value. False if missing or not a boolean.
    #[inline]
    #[must_use]
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).and_then(Value::as_bool).unwrap_or_default()
    }
}

impl From<Value> for Configuration {
    #[inline]
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_typed_getters() {
        let config = Configuration::new(json!({
            "platform": "ios",
            "apiLevel": 7,
            "darkMode": true
        }));

        assert_eq!(config.get_str("platform"), "ios");
        assert_eq!(config.get_u64("apiLevel"), 7);
        assert!(config.get_bool("darkMode"));
    }

    #[test]
    fn test_missing_keys_return_defaults() {
        let config = Configuration::new(json!({}));
        assert_eq!(config.get_str("missing"), "");
        assert_eq!(config.get_u64("missing"), 0);
        assert!(!config.get_bool("missing"));
        assert!(config.get("missing").is_none());
    }
}
