//! Error types for the webview bridge.
//!
//! Internal operations return [`Result<T>`]; the public [`Bridge`] facade
//! never propagates these errors across its boundary. A failure at a public
//! entry point is reported through the logger and collapsed into a
//! null-equivalent return (`None` / `false`), because an error thrown into a
//! host-delivered callback would be unrecoverable on the other side of the
//! bridge.
//!
//! [`Bridge`]: crate::Bridge
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Malformed call | [`Error::InvalidMethod`], [`Error::ReservedMethod`] |
//! | Dispatch | [`Error::NoDelegate`], [`Error::UnknownMethod`] |
//! | Registry | [`Error::UnknownToken`] |
//! | Capabilities | [`Error::DuplicateCapability`] |
//! | Transport | [`Error::MalformedUrl`] |
//! | External | [`Error::Json`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::CallbackToken;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
///
/// Each variant carries the context a log line needs. None of these cross
/// the public bridge surface (see module docs).
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Malformed Call Errors
    // ========================================================================
    /// Method name is empty or otherwise unusable.
    #[error("Invalid method name: {message}")]
    InvalidMethod {
        /// Description of what was wrong with the name.
        message: String,
    },

    /// Method name is reserved for the bridge itself.
    ///
    /// Only the readiness pipeline may issue the handshake method.
    #[error("Method name is reserved: {method}")]
    ReservedMethod {
        /// The reserved method name.
        method: String,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    /// No delegate has been registered yet.
    #[error("No delegate registered")]
    NoDelegate,

    /// Delegate has no handler for the requested method.
    #[error("Unknown method on delegate: {method}")]
    UnknownMethod {
        /// The method the delegate does not support.
        method: String,
    },

    // ========================================================================
    // Registry Errors
    // ========================================================================
    /// Callback token is not resolvable.
    ///
    /// The token was already consumed, cancelled, or never issued.
    #[error("Unknown callback token: {token}")]
    UnknownToken {
        /// The unresolvable token.
        token: CallbackToken,
    },

    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// A capability with this name is already registered.
    ///
    /// The first registration wins; the duplicate is rejected.
    #[error("Duplicate capability: {name}")]
    DuplicateCapability {
        /// The colliding capability name.
        name: String,
    },

    // ========================================================================
    // Transport Errors
    // ========================================================================
    /// Constructed URL-scheme call did not parse as a URL.
    #[error("Malformed bridge URL: {url}")]
    MalformedUrl {
        /// The URL that failed to parse.
        url: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates an invalid method error.
    #[inline]
    pub fn invalid_method(message: impl Into<String>) -> Self {
        Self::InvalidMethod {
            message: message.into(),
        }
    }

    /// Creates a reserved method error.
    #[inline]
    pub fn reserved_method(method: impl Into<String>) -> Self {
        Self::ReservedMethod {
            method: method.into(),
        }
    }

    /// Creates an unknown method error.
    #[inline]
    pub fn unknown_method(method: impl Into<String>) -> Self {
        Self::UnknownMethod {
            method: method.into(),
        }
    }

    /// Creates an unknown token error.
    #[inline]
    pub fn unknown_token(token: CallbackToken) -> Self {
        Self::UnknownToken { token }
    }

    /// Creates a duplicate capability error.
    #[inline]
    pub fn duplicate_capability(name: impl Into<String>) -> Self {
        Self::DuplicateCapability { name: name.into() }
    }

    /// Creates a malformed URL error.
    #[inline]
    pub fn malformed_url(url: impl Into<String>) -> Self {
        Self::MalformedUrl { url: url.into() }
    }
}

// ============================================================================
// Tests
// ============================================================================
