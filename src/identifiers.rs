//! Type-safe identifiers for bridge entities.
//!
//! Newtype wrappers prevent mixing incompatible identifiers at compile time.
//! The only identifier crossing the serialization boundary is
//! [`CallbackToken`]: the opaque string the host echoes back when it answers
//! a call.
//!
//! # Token Format
//!
//! Tokens are prefixed counter strings (`wvb_cb_1`, `wvb_cb_2`, ...). The
//! counter is process-wide and monotonic, so a token is never reused even
//! after the entry it named has been consumed or cancelled.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// CallbackToken
// ============================================================================

/// Opaque string token identifying a pending callback.
///
/// Tokens are the serialization-safe analogue of a function pointer crossing
/// the page/host boundary: the bridge hands the token to the host, and the
/// host later invokes [`Bridge::dispatch`](crate::Bridge::dispatch) with it.
///
/// Tokens are minted by the [`CallbackRegistry`](crate::CallbackRegistry)
/// and are unique for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackToken(String);

impl CallbackToken {
    /// Prefix for minted tokens.
    const PREFIX: &'static str = "wvb_cb_";

    /// Mints a token from a counter value.
    ///
    /// Only the registry mints tokens; everything else receives them.
    #[inline]
    #[must_use]
    pub(crate) fn mint(sequence: u64) -> Self {
        Self(format!("{}{}", Self::PREFIX, sequence))
    }

    /// Reconstructs a token from a raw string received from the host.
    ///
    /// No validation is performed: an unknown token is handled (and logged)
    /// at resolution time, not at construction time.
    #[inline]
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Returns the token as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallbackToken {
    #[inline]
    fn from(raw: &str) -> Self {
        Self::from_raw(raw)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_format() {
        let token = CallbackToken::mint(7);
        assert_eq!(token.as_str(), "wvb_cb_7");
    }

    #[test]
    fn test_from_raw_round_trip() {
        let token = CallbackToken::mint(42);
        let echoed = CallbackToken::from_raw(token.as_str());
        assert_eq!(token, echoed);
    }

    #[test]
    fn test_display() {
        let token = CallbackToken::mint(1);
        assert_eq!(token.to_string(), "wvb_cb_1");
    }

    #[test]
    fn test_serde_transparent() {
        let token = CallbackToken::mint(3);
        let json = serde_json::to_string(&token).expect("serialize");
        assert_eq!(json, "\"wvb_cb_3\"");
    }
}
