//! Webview Bridge - transport-agnostic call bridge between embedded web
//! content and a native host.
//!
//! Page-side code invokes named host operations and receives asynchronous
//! results; the host invokes page-side callbacks through opaque string
//! tokens. The bridge performs no I/O itself — the host delegate does the
//! native work.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ Bridge                                        │
//! │  ┌────────────┐  ┌────────────┐  ┌─────────┐  │     ┌──────────┐
//! │  │ Readiness  │  │ Transport  │  │Callback │  │     │  Host    │
//! │  │ Pipeline   │─►│ Dispatcher │─►│Registry │◄─┼─────│ Delegate │
//! │  └────────────┘  └────────────┘  └─────────┘  │     └──────────┘
//! │  ┌────────────┐                               │
//! │  │ Cookie Jar │                               │
//! │  └────────────┘                               │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! Key design principles:
//!
//! - One explicit [`Bridge`] context object, cheap to clone, no globals
//! - Four call strategies behind one [`Delegate`] tagged union
//! - Callbacks cross the boundary as [`CallbackToken`] strings, resolved
//!   through a process-wide registry
//! - Every delegate call is deferred by at least one task boundary
//! - Errors never cross the public surface: failures are logged and
//!   collapsed into null-equivalent returns
//!
//! # Quick Start
//!
//! ```no_run
//! use serde_json::json;
//! use webview_bridge::{Bridge, Delegate};
//!
//! #[tokio::main]
//! async fn main() {
//!     let bridge = Bridge::new();
//!
//!     // Capabilities and ready callbacks queue until the host answers.
//!     bridge.on_ready(|| println!("host is ready"));
//!
//!     // The host side: answers every method through the dispatch entry.
//!     let host_bridge = bridge.clone();
//!     bridge.register(Delegate::function_fn(move |method, params, token| {
//!         println!("host got {method} {params:?}");
//!         if let Some(token) = token {
//!             host_bridge.dispatch(token.as_str(), vec![json!({"ok": true})]);
//!         }
//!     }));
//!
//!     // Embedder signals document load; the handshake goes out.
//!     bridge.notify_load_complete();
//!
//!     bridge.invoke_with("getUser", vec![json!("self")], |args| {
//!         println!("host answered: {args:?}");
//!         serde_json::Value::Null
//!     });
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | [`Bridge`] context object, readiness pipeline, capabilities |
//! | [`cookies`] | Turn-scoped cookie cache |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe token wrappers |
//! | [`protocol`] | Query codec and handshake constants |
//! | [`transport`] | Delegate traits and call strategies |

// ============================================================================
// Modules
// ============================================================================

/// Bridge context object and readiness pipeline.
///
/// The crate's public surface: [`Bridge`], [`BridgeBuilder`],
/// [`CapabilitySet`], [`Configuration`].
pub mod bridge;

/// Turn-scoped cookie cache.
///
/// [`CookieJar`] over a [`CookieStore`] backend.
pub mod cookies;

/// Error types and result aliases.
///
/// Internal fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers for bridge entities.
///
/// Newtype wrappers prevent mixing incompatible tokens at compile time.
pub mod identifiers;

/// Query codec and wire constants.
///
/// Internal module defining the URL-transport value encoding.
pub mod protocol;

/// Callback registry.
///
/// Process-wide token table backing pending invocations.
pub mod registry;

/// Transport layer.
///
/// Delegate traits, the [`Delegate`] tagged union, and the per-mode call
/// strategies.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Bridge types
pub use bridge::{
    Bridge, BridgeBuilder, Capability, CapabilitySet, Configuration, ReadinessState,
};

// Cookie types
pub use cookies::{CookieJar, CookieStore, MemoryCookieStore};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::CallbackToken;

// Registry types
pub use registry::CallbackRegistry;

// Transport types
pub use transport::{
    Delegate, FunctionDelegate, HostCallback, MethodMap, ObjectDelegate, PrimitiveDelegate,
    TransportMode, UrlOpener, UrlSink,
};
