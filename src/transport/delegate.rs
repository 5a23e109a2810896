//! Host delegate traits and the per-mode tagged union.
//!
//! A [`Delegate`] is the host endpoint that actually performs native work.
//! The variant selects the calling convention, so a registered delegate can
//! never disagree with its transport mode.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::error;

use crate::identifiers::CallbackToken;
use crate::registry::CallbackRegistry;

use super::TransportMode;

// ============================================================================
// Delegate Traits
// ============================================================================

/// Delegate whose methods accept only primitives and JSON-stringified
/// complex values.
///
/// Models constrained native bridges that cannot marshal arbitrary objects.
/// The dispatcher flattens parameters before calling; a callback token, if
/// any, arrives appended as a plain string argument.
#[async_trait]
pub trait PrimitiveDelegate: Send + Sync {
    /// Returns `true` if the delegate has a handler for `method`.
    fn supports(&self, method: &str) -> bool;

    /// Performs the call. `args` contains only primitives and JSON strings.
    async fn call(&self, method: &str, args: Vec<Value>);
}

/// Delegate whose methods accept arbitrary values and a live callback.
#[async_trait]
pub trait ObjectDelegate: Send + Sync {
    /// Returns `true` if the delegate has a handler for `method`.
    fn supports(&self, method: &str) -> bool;

    /// Performs the call. `callback`, when present, answers the invocation.
    async fn call(&self, method: &str, params: Vec<Value>, callback: Option<HostCallback>);
}

/// Delegate that is a single function receiving every method.
///
/// The host answers by dispatching `token` through the bridge's public
/// dispatch entry point.
#[async_trait]
pub trait FunctionDelegate: Send + Sync {
    /// Performs the call.
    async fn call(&self, method: &str, params: Vec<Value>, token: Option<CallbackToken>);
}

/// Opener for transient navigable elements in URL-scheme mode.
///
/// `open` creates the invisible navigable targeting the bridge URL and
/// returns a handle; the dispatcher calls `close` with that handle after the
/// removal grace window so the host side does not accumulate elements.
#[async_trait]
pub trait UrlOpener: Send + Sync {
    /// Opens a transient navigable targeting `url`; returns its handle.
    async fn open(&self, url: &str) -> u64;

    /// Removes the navigable identified by `handle`.
    async fn close(&self, handle: u64);
}

// ============================================================================
// UrlSink
// ============================================================================

/// Delivery endpoint for URL-scheme calls.
#[derive(Clone)]
pub enum UrlSink {
    /// Direct string handoff: the delegate is itself a function.
    Handler(Arc<dyn Fn(&str) + Send + Sync>),
    /// Transient navigable with a removal grace window.
    Opener(Arc<dyn UrlOpener>),
}

impl fmt::Debug for UrlSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler(_) => f.write_str("UrlSink::Handler"),
            Self::Opener(_) => f.write_str("UrlSink::Opener"),
        }
    }
}

// ============================================================================
// Delegate
// ============================================================================

/// The host endpoint, one variant per [`TransportMode`].
#[derive(Clone)]
pub enum Delegate {
    /// Synthetic navigations to `scheme://method?parameters=...`.
    UrlScheme {
        /// URL scheme the host listens for (e.g. `app`).
        scheme: String,
        /// Delivery endpoint.
        sink: UrlSink,
    },
    /// Primitive-only proxy object.
    Primitive(Arc<dyn PrimitiveDelegate>),
    /// Arbitrary-value proxy object.
    Object(Arc<dyn ObjectDelegate>),
    /// Single catch-all function.
    Function(Arc<dyn FunctionDelegate>),
}

impl Delegate {
    /// Creates a URL-scheme delegate with a direct handler function.
    pub fn url_handler<F>(scheme: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self::UrlScheme {
            scheme: scheme.into(),
            sink: UrlSink::Handler(Arc::new(handler)),
        }
    }

    /// Creates a URL-scheme delegate backed by a transient-navigable opener.
    pub fn url_opener(scheme: impl Into<String>, opener: Arc<dyn UrlOpener>) -> Self {
        Self::UrlScheme {
            scheme: scheme.into(),
            sink: UrlSink::Opener(opener),
        }
    }

    /// Creates a primitive-proxy delegate.
    #[inline]
    pub fn primitive(delegate: Arc<dyn PrimitiveDelegate>) -> Self {
        Self::Primitive(delegate)
    }

    /// Creates an object-proxy delegate.
    #[inline]
    pub fn object(delegate: Arc<dyn ObjectDelegate>) -> Self {
        Self::Object(delegate)
    }

    /// Creates a function-proxy delegate.
    #[inline]
    pub fn function(delegate: Arc<dyn FunctionDelegate>) -> Self {
        Self::Function(delegate)
    }

    /// Creates a function-proxy delegate from a plain closure.
    pub fn function_fn<F>(f: F) -> Self
    where
        F: Fn(&str, Vec<Value>, Option<CallbackToken>) + Send + Sync + 'static,
    {
        struct FnDelegate<F>(F);

        #[async_trait]
        impl<F> FunctionDelegate for FnDelegate<F>
        where
            F: Fn(&str, Vec<Value>, Option<CallbackToken>) + Send + Sync,
        {
            async fn call(&self, method: &str, params: Vec<Value>, token: Option<CallbackToken>) {
                (self.0)(method, params, token);
            }
        }

        Self::Function(Arc::new(FnDelegate(f)))
    }

    /// Returns the transport mode this delegate implements.
    #[inline]
    #[must_use]
    pub fn mode(&self) -> TransportMode {
        match self {
            Self::UrlScheme { .. } => TransportMode::UrlScheme,
            Self::Primitive(_) => TransportMode::PrimitiveProxy,
            Self::Object(_) => TransportMode::ObjectProxy,
            Self::Function(_) => TransportMode::FunctionProxy,
        }
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// HostCallback
// ============================================================================

/// Live callback handle passed to object-proxy delegates.
///
/// Wraps the callback token so the host can answer without knowing about
/// the registry. Invoking the handle resolves and runs the original closure;
/// one-shot entries are consumed by the first invocation.
#[derive(Clone)]
pub struct HostCallback {
    registry: Arc<CallbackRegistry>,
    token: CallbackToken,
}

impl HostCallback {
    pub(crate) fn new(registry: Arc<CallbackRegistry>, token: CallbackToken) -> Self {
        Self { registry, token }
    }

    /// Returns the underlying token.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CallbackToken {
        &self.token
    }

    /// Invokes the original page-side callback with the host's arguments.
    ///
    /// Returns `None` if the token is no longer resolvable.
    pub fn invoke(&self, args: Vec<Value>) -> Option<Value> {
        self.registry.dispatch(&self.token, args)
    }
}

impl fmt::Debug for HostCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostCallback")
            .field("token", &self.token)
            .finish()
    }
}

// ============================================================================
// MethodMap
// ============================================================================

/// Handler signature stored in a [`MethodMap`].
pub type MethodHandler = dyn Fn(Vec<Value>, Option<HostCallback>) + Send + Sync;

/// Flat method-name-to-handler table.
///
/// Handlers are resolved once at registration time; there is no per-call
/// string splitting or nested-object walking. Implements both
/// [`PrimitiveDelegate`] and [`ObjectDelegate`], so one table can back
/// either proxy mode.
///
/// # Example
///
/// ```
/// use webview_bridge::{Delegate, MethodMap};
/// use std::sync::Arc;
///
/// let host = MethodMap::new()
///     .handle("greet", |params, callback| {
///         if let Some(cb) = callback {
///             cb.invoke(params);
///         }
///     });
/// let delegate = Delegate::object(Arc::new(host));
/// ```
#[derive(Default)]
pub struct MethodMap {
    handlers: FxHashMap<String, Arc<MethodHandler>>,
}

impl MethodMap {
    /// Creates an empty method table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a handler for `method`.
    ///
    /// Re-registering a name already in use is rejected: the first
    /// registration wins and the duplicate is logged.
    #[must_use]
    pub fn handle<F>(mut self, method: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<Value>, Option<HostCallback>) + Send + Sync + 'static,
    {
        let method = method.into();
        if self.handlers.contains_key(&method) {
            error!(method = %method, "Duplicate method handler rejected");
            return self;
        }
        self.handlers.insert(method, Arc::new(handler));
        self
    }

    /// Returns the number of registered handlers.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if no handlers are registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn run(&self, method: &str, args: Vec<Value>, callback: Option<HostCallback>) {
        if let Some(handler) = self.handlers.get(method) {
            handler(args, callback);
        }
    }
}

#[async_trait]
impl PrimitiveDelegate for MethodMap {
    fn supports(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    async fn call(&self, method: &str, args: Vec<Value>) {
        self.run(method, args, None);
    }
}

#[async_trait]
impl ObjectDelegate for MethodMap {
    fn supports(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }

    async fn call(&self, method: &str, params: Vec<Value>, callback: Option<HostCallback>) {
        self.run(method, params, callback);
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
    fn test_delegate_mode() {
        assert_eq!(
            Delegate::url_handler("app", |_| {}).mode(),
            TransportMode::UrlScheme
        );
        assert_eq!(
            Delegate::function_fn(|_, _, _| {}).mode(),
            TransportMode::FunctionProxy
        );
        assert_eq!(
            Delegate::object(Arc::new(MethodMap::new())).mode(),
            TransportMode::ObjectProxy
        );
        assert_eq!(
            Delegate::primitive(Arc::new(MethodMap::new())).mode(),
            TransportMode::PrimitiveProxy
        );
    }

    #[test]
    fn test_method_map_duplicate_first_wins() {
        let map = MethodMap::new()
            .handle("greet", |_, _| {})
            .handle("greet", |_, _| panic!("duplicate handler must not register"));

        assert_eq!(map.len(), 1);
        map.run("greet", vec![], None);
    }

    #[test]
    fn test_method_map_supports() {
        let map = MethodMap::new().handle("greet", |_, _| {});
        assert!(PrimitiveDelegate::supports(&map, "greet"));
        assert!(!PrimitiveDelegate::supports(&map, "missing"));
    }

    #[test]
    fn test_host_callback_invoke() {
        let registry = Arc::new(CallbackRegistry::new());
        let token = registry.register(|args| args.into_iter().next().unwrap_or(Value::Null));
        let callback = HostCallback::new(Arc::clone(&registry), token);

        assert_eq!(callback.invoke(vec![json!("pong")]), Some(json!("pong")));
        // One-shot entry consumed by the first invocation.
        assert_eq!(callback.invoke(vec![json!("again")]), None);
    }
}
