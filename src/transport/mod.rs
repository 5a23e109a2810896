//! Transport layer: call strategies between page-side code and the host.
//!
//! The bridge performs no I/O of its own. Every call is handed to a
//! host-provided [`Delegate`], using one of four calling conventions:
//!
//! ```text
//! ┌──────────────┐                            ┌──────────────┐
//! │  Bridge      │  invoke(method, params)    │  Host        │
//! │              │───────────────────────────►│  Delegate    │
//! │  Callback    │                            │              │
//! │  Registry    │◄───────────────────────────│              │
//! └──────────────┘  dispatch(token, args)     └──────────────┘
//! ```
//!
//! # Transport Modes
//!
//! | Mode | Delegate shape |
//! |------|----------------|
//! | `UrlScheme` | synthetic `scheme://method?parameters=...` navigation |
//! | `PrimitiveProxy` | methods taking primitives / JSON strings only |
//! | `ObjectProxy` | methods taking arbitrary values and live callbacks |
//! | `FunctionProxy` | one function `(method, params, token)` |
//!
//! Every delegate call is deferred by at least one task boundary, even in
//! modes where the underlying call could be synchronous. Callers must never
//! assume synchronous completion.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `delegate` | Delegate traits, the [`Delegate`] tagged union, [`MethodMap`] |
//! | `dispatcher` | Strategy selection and delivery |

// ============================================================================
// Submodules
// ============================================================================

/// Delegate traits and the per-mode tagged union.
pub mod delegate;

/// Call strategy selection and delivery.
pub mod dispatcher;

// ============================================================================
// Re-exports
// ============================================================================

pub use delegate::{
    Delegate, FunctionDelegate, HostCallback, MethodMap, ObjectDelegate, PrimitiveDelegate,
    UrlOpener, UrlSink,
};
pub use dispatcher::URL_GRACE_PERIOD;

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// TransportMode
// ============================================================================

/// The agreed calling convention between page and host.
///
/// The mode identifier is the sole parameter of the readiness handshake, so
/// the host knows which convention the page selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransportMode {
    /// Calls become synthetic navigations to `scheme://method?...`.
    UrlScheme,
    /// Delegate methods accept only primitives and JSON-stringified values.
    PrimitiveProxy,
    /// Delegate methods accept arbitrary values and live callbacks.
    ObjectProxy,
    /// Delegate is a single function `(method, params, token)`.
    FunctionProxy,
}

impl TransportMode {
    /// Returns the wire identifier sent in the handshake.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UrlScheme => "urlScheme",
            Self::PrimitiveProxy => "primitiveProxy",
            Self::ObjectProxy => "objectProxy",
            Self::FunctionProxy => "functionProxy",
        }
    }
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Tests
// ============================================================================
