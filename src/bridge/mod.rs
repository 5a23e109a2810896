//! Bridge context object: the public surface of the crate.
//!
//! One [`Bridge`] is constructed at startup and injected into every
//! collaborator; cloning is cheap (shared inner state), preserving
//! single-instance semantics without hidden globals.
//!
//! # Lifecycle
//!
//! ```text
//!  page code                bridge                       host
//!     │  extend()/on_ready()  │                            │
//!     │───────────────────────► queued                     │
//!     │  register(delegate)   │                            │
//!     │───────────────────────► AwaitingHandshake          │
//!     │  notify_load_complete │                            │
//!     │───────────────────────►── invoke("ready", [mode]) ─►
//!     │                        │◄─ dispatch(token, config) ─│
//!     │                        │ Ready: drain extensions,   │
//!     │                        │ then ready callbacks       │
//!     │  invoke(...)           │── delegate call ──────────►
//! ```
//!
//! Errors never cross this surface: every public entry point reports
//! failures through the logger and returns a null-equivalent value.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`BridgeBuilder`] configuration |
//! | `capability` | [`CapabilitySet`] accumulator |
//! | `config` | Host [`Configuration`] |
//! | `readiness` | State machine and deferred queues |

// ============================================================================
// Submodules
// ============================================================================

/// Builder for bridge configuration.
pub mod builder;

/// Capability accumulation and merge.
pub mod capability;

/// Host configuration wrapper.
pub mod config;

/// Readiness state machine.
pub mod readiness;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::BridgeBuilder;
pub use capability::{Capability, CapabilitySet};
pub use config::Configuration;
pub use readiness::ReadinessState;

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::cookies::CookieJar;
use crate::error::Error;
use crate::identifiers::CallbackToken;
use crate::protocol::HANDSHAKE_METHOD;
use crate::registry::{CallbackFn, CallbackRegistry};
use crate::transport::dispatcher::Dispatcher;
use crate::transport::{Delegate, TransportMode};

use readiness::PipelineState;

// ============================================================================
// Bridge
// ============================================================================

/// The page-to-host call/callback bridge.
///
/// Construct once via [`Bridge::builder`], then hand clones to every
/// collaborator.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

pub(crate) struct BridgeInner {
    /// Callback token table, shared with the dispatcher.
    registry: Arc<CallbackRegistry>,
    /// Per-mode call strategies.
    dispatcher: Dispatcher,
    /// Readiness state machine and deferred queues.
    pipeline: Mutex<PipelineState>,
    /// Merged capability surface.
    capabilities: Mutex<FxHashMap<String, Capability>>,
    /// Turn-scoped cookie cache.
    cookies: CookieJar,
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridge")
            .field("state", &self.state())
            .field("mode", &self.mode())
            .field("pending_callbacks", &self.pending_callbacks())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Bridge - Construction
// ============================================================================

impl Bridge {
    /// Returns a builder with default configuration.
    #[inline]
    #[must_use]
    pub fn builder() -> BridgeBuilder {
        BridgeBuilder::new()
    }

    /// Creates a bridge with default configuration (in-memory cookie store).
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn from_parts(dispatcher_grace: std::time::Duration, cookies: CookieJar) -> Self {
        let registry = Arc::new(CallbackRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), dispatcher_grace);

        Self {
            inner: Arc::new(BridgeInner {
                registry,
                dispatcher,
                pipeline: Mutex::new(PipelineState::new()),
                capabilities: Mutex::new(FxHashMap::default()),
                cookies,
            }),
        }
    }
}

impl Default for Bridge {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Bridge - Registration & Readiness
// ============================================================================

impl Bridge {
    /// Registers (or swaps) the host delegate.
    ///
    /// First registration transitions to `AwaitingHandshake`; the handshake
    /// itself is issued once the embedder signals load-complete. If the
    /// bridge is already `Ready`, only the delegate is swapped — readiness
    /// never regresses. Re-registering before the handshake resolves
    /// cancels the superseded handshake token.
    pub fn register(&self, delegate: Delegate) {
        let mode = delegate.mode();
        self.inner.dispatcher.set_delegate(delegate);

        let mut pipeline = self.inner.pipeline.lock();

        if pipeline.is_ready() {
            debug!(mode = %mode, "Delegate swapped on ready bridge");
            return;
        }

        // Supersede any in-flight handshake.
        if let Some(stale) = pipeline.pending_handshake.take() {
            self.inner.registry.cancel(&stale);
        }

        pipeline.state = ReadinessState::AwaitingHandshake;

        let token = self
            .inner
            .registry
            .register_shared(Self::handshake_callback(&self.inner));
        pipeline.pending_handshake = Some(token.clone());

        if pipeline.load_complete {
            pipeline.handshake_deferred = false;
            drop(pipeline);
            self.issue_handshake(mode, token);
        } else {
            pipeline.handshake_deferred = true;
            debug!(mode = %mode, "Handshake deferred until load-complete");
        }
    }

    /// Signals that the host environment finished loading the document.
    ///
    /// Idempotent. Releases a deferred handshake, if one is waiting.
    pub fn notify_load_complete(&self) {
        let mut pipeline = self.inner.pipeline.lock();

        if pipeline.load_complete {
            return;
        }
        pipeline.load_complete = true;

        if pipeline.state == ReadinessState::AwaitingHandshake && pipeline.handshake_deferred {
            pipeline.handshake_deferred = false;
            let token = pipeline.pending_handshake.clone();
            let mode = self.inner.dispatcher.mode();
            drop(pipeline);

            if let (Some(token), Some(mode)) = (token, mode) {
                self.issue_handshake(mode, token);
            }
        }
    }

    /// Signals that the page became visible again.
    ///
    /// Discards the cookie snapshot so writes from other pages are observed.
    pub fn notify_page_shown(&self) {
        self.inner.cookies.invalidate();
        debug!("Page shown, cookie snapshot invalidated");
    }

    /// Builds the handshake completion callback.
    fn handshake_callback(inner: &Arc<BridgeInner>) -> Arc<CallbackFn> {
        let weak = Arc::downgrade(inner);
        Arc::new(move |mut args: Vec<Value>| {
            if let Some(inner) = weak.upgrade() {
                let config = if args.is_empty() {
                    Value::Null
                } else {
                    args.remove(0)
                };
                BridgeInner::complete_handshake(&inner, config);
            }
            Value::Null
        })
    }

    /// Delivers the reserved handshake call through the dispatcher.
    fn issue_handshake(&self, mode: TransportMode, token: CallbackToken) {
        debug!(mode = %mode, token = %token, "Issuing handshake");

        let params = vec![Value::String(mode.as_str().to_string())];
        if let Err(e) =
            self.inner
                .dispatcher
                .invoke_registered(HANDSHAKE_METHOD, params, Some(token.clone()))
        {
            error!(error = %e, "Handshake delivery failed");
            self.inner.registry.cancel(&token);

            let mut pipeline = self.inner.pipeline.lock();
            if pipeline.pending_handshake.as_ref() == Some(&token) {
                pipeline.pending_handshake = None;
            }
        }
    }
}

// ============================================================================
// Bridge - Extensions & Ready Callbacks
// ============================================================================

impl Bridge {
    /// Registers an extension function.
    ///
    /// Extensions receive the host configuration and return capabilities to
    /// merge into the bridge surface. Before the handshake completes they
    /// are queued FIFO; afterwards they are applied on the next task.
    /// All extensions run before any plain ready callback.
    pub fn extend<F>(&self, extension: F)
    where
        F: FnOnce(&Configuration) -> CapabilitySet + Send + 'static,
    {
        let mut pipeline = self.inner.pipeline.lock();

        // Ready implies a stored configuration.
        if pipeline.is_ready()
            && let Some(config) = pipeline.configuration.clone()
        {
            drop(pipeline);

            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                let capabilities = extension(&config);
                inner.merge_capabilities(capabilities);
            });
        } else {
            pipeline.extension_queue.push(Box::new(extension));
        }
    }

    /// Registers a ready callback.
    ///
    /// Runs once, after the handshake has completed and all queued
    /// extensions have been applied. If the bridge is already ready, the
    /// callback is scheduled on the next task.
    pub fn on_ready<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut pipeline = self.inner.pipeline.lock();

        if pipeline.is_ready() {
            drop(pipeline);
            tokio::spawn(async move {
                callback();
            });
        } else {
            pipeline.ready_queue.push(Box::new(callback));
        }
    }
}

// ============================================================================
// Bridge - Invocation
// ============================================================================

impl Bridge {
    /// Invokes a host method without expecting an answer.
    ///
    /// Returns `true` if the call was handed to the transport. Failures are
    /// logged, never raised.
    pub fn invoke(&self, method: &str, params: Vec<Value>) -> bool {
        match self.try_invoke(method, params, None) {
            Ok(_) => true,
            Err(e) => {
                error!(method = %method, error = %e, "Invoke failed");
                false
            }
        }
    }

    /// Invokes a host method with a result callback.
    ///
    /// The callback is stored in the registry and its token travels with
    /// the call; the host answers via [`Bridge::dispatch`]. Returns the
    /// token, or `None` on failure (logged, no orphaned token).
    pub fn invoke_with<F>(&self, method: &str, params: Vec<Value>, callback: F) -> Option<CallbackToken>
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        match self.try_invoke(method, params, Some(Arc::new(callback))) {
            Ok(token) => token,
            Err(e) => {
                error!(method = %method, error = %e, "Invoke failed");
                None
            }
        }
    }

    fn try_invoke(
        &self,
        method: &str,
        params: Vec<Value>,
        callback: Option<Arc<CallbackFn>>,
    ) -> crate::Result<Option<CallbackToken>> {
        if method == HANDSHAKE_METHOD {
            return Err(Error::reserved_method(method));
        }
        self.inner.dispatcher.invoke(method, params, callback)
    }

    /// Host-facing dispatch entry point.
    ///
    /// The host calls this with a token it received earlier and its result
    /// arguments. Unknown tokens are a logged no-op returning `None`.
    pub fn dispatch(&self, token: &str, args: Vec<Value>) -> Option<Value> {
        self.inner
            .registry
            .dispatch(&CallbackToken::from_raw(token), args)
    }
}

// ============================================================================
// Bridge - Callback Registry Surface
// ============================================================================

impl Bridge {
    /// Registers a one-shot callback and returns its token.
    pub fn register_callback<F>(&self, callback: F) -> CallbackToken
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        self.inner.registry.register(callback)
    }

    /// Registers a persistent callback (change listener) and returns its
    /// token.
    pub fn register_listener<F>(&self, callback: F) -> CallbackToken
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        self.inner.registry.register_persistent(callback)
    }

    /// Cancels a registered callback without invoking it.
    pub fn cancel_callback(&self, token: &CallbackToken) {
        self.inner.registry.cancel(token);
    }

    /// Returns the number of pending callback entries.
    #[inline]
    #[must_use]
    pub fn pending_callbacks(&self) -> usize {
        self.inner.registry.pending_count()
    }
}

// ============================================================================
// Bridge - Accessors
// ============================================================================

impl Bridge {
    /// Returns the current readiness state.
    #[must_use]
    pub fn state(&self) -> ReadinessState {
        self.inner.pipeline.lock().state
    }

    /// Returns the active transport mode, if a delegate is registered.
    #[must_use]
    pub fn mode(&self) -> Option<TransportMode> {
        self.inner.dispatcher.mode()
    }

    /// Returns the host configuration once the handshake has completed.
    #[must_use]
    pub fn configuration(&self) -> Option<Arc<Configuration>> {
        self.inner.pipeline.lock().configuration.clone()
    }

    /// Looks up a typed capability by name.
    #[must_use]
    pub fn capability<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        let capabilities = self.inner.capabilities.lock();
        capabilities.get(name).cloned()?.downcast::<T>().ok()
    }

    /// Returns `true` if a capability with this name exists.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.inner.capabilities.lock().contains_key(name)
    }

    /// Returns the cookie cache.
    #[inline]
    #[must_use]
    pub fn cookies(&self) -> &CookieJar {
        &self.inner.cookies
    }
}

// ============================================================================
// BridgeInner
// ============================================================================

impl BridgeInner {
    /// Completes the handshake: store configuration, go `Ready`, drain.
    ///
    /// Queue drains run outside the state lock, so extensions and ready
    /// callbacks may re-enter the bridge freely.
    fn complete_handshake(inner: &Arc<Self>, config: Value) {
        let (extensions, ready_callbacks, config_arc) = {
            let mut pipeline = inner.pipeline.lock();

            if pipeline.is_ready() {
                warn!("Handshake completed twice, ignoring");
                return;
            }

            pipeline.pending_handshake = None;
            pipeline.state = ReadinessState::Ready;

            let config_arc = Arc::new(Configuration::new(config));
            pipeline.configuration = Some(Arc::clone(&config_arc));

            let (extensions, ready_callbacks) = pipeline.take_queues();
            (extensions, ready_callbacks, config_arc)
        };

        debug!(
            extensions = extensions.len(),
            ready_callbacks = ready_callbacks.len(),
            "Handshake complete, draining queues"
        );

        // Extensions first, strictly FIFO: capabilities they add must be
        // present before any ready callback runs.
        for extension in extensions {
            let capabilities = extension(&config_arc);
            inner.merge_capabilities(capabilities);
        }

        for callback in ready_callbacks {
            callback();
        }
    }

    /// Merges a capability set into the bridge surface.
    ///
    /// Name collisions are rejected: the first registration wins.
    fn merge_capabilities(&self, set: CapabilitySet) {
        let mut capabilities = self.capabilities.lock();

        for (name, capability) in set.into_entries() {
            if capabilities.contains_key(&name) {
                error!(error = %Error::duplicate_capability(&name), "Capability rejected");
                continue;
            }
            capabilities.insert(name, capability);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;
    use tokio::task::yield_now;

    use crate::transport::MethodMap;

    use super::*;

    /// Lets spawned delegate calls run on the current-thread test runtime.
    async fn settle() {
        for _ in 0..8 {
            yield_now().await;
        }
    }

    /// Host that answers the handshake with `config` and records calls.
    fn handshaking_host(bridge: &Bridge, config: Value) -> Delegate {
        let bridge = bridge.clone();
        Delegate::function_fn(move |method, _params, token| {
            if method == HANDSHAKE_METHOD
                && let Some(token) = token
            {
                bridge.dispatch(token.as_str(), vec![config.clone()]);
            }
        })
    }

    #[tokio::test]
    async fn test_state_progression() {
        let bridge = Bridge::new();
        assert_eq!(bridge.state(), ReadinessState::NotRegistered);

        bridge.register(handshaking_host(&bridge, json!({"platform": "test"})));
        assert_eq!(bridge.state(), ReadinessState::AwaitingHandshake);

        bridge.notify_load_complete();
        settle().await;

        assert_eq!(bridge.state(), ReadinessState::Ready);
        let config = bridge.configuration().expect("configuration stored");
        assert_eq!(config.get_str("platform"), "test");
    }

    #[tokio::test]
    async fn test_extension_before_ready_ordering() {
        let bridge = Bridge::new();
        let order: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));

        let o = Arc::clone(&order);
        bridge.extend(move |_| {
            o.lock().push("e1");
            CapabilitySet::new()
        });
        let o = Arc::clone(&order);
        bridge.on_ready(move || o.lock().push("r1"));
        let o = Arc::clone(&order);
        bridge.extend(move |_| {
            o.lock().push("e2");
            CapabilitySet::new()
        });
        let o = Arc::clone(&order);
        bridge.on_ready(move || o.lock().push("r2"));

        bridge.register(handshaking_host(&bridge, json!({})));
        bridge.notify_load_complete();
        settle().await;

        assert_eq!(*order.lock(), vec!["e1", "e2", "r1", "r2"]);
    }

    #[tokio::test]
    async fn test_idempotent_re_registration() {
        let bridge = Bridge::new();
        let handshakes: Arc<Mutex<Vec<(Vec<Value>, CallbackToken)>>> =
            Arc::new(Mutex::new(Vec::new()));

        // Mode A: an object proxy that records nothing (never called).
        bridge.register(Delegate::object(Arc::new(
            MethodMap::new().handle(HANDSHAKE_METHOD, |_, _| {
                panic!("superseded delegate must not receive the handshake")
            }),
        )));
        let stale_token = {
            let pipeline = bridge.inner.pipeline.lock();
            pipeline.pending_handshake.clone().expect("pending token")
        };

        // Mode B replaces it before load-complete.
        let h = Arc::clone(&handshakes);
        bridge.register(Delegate::function_fn(move |method, params, token| {
            assert_eq!(method, HANDSHAKE_METHOD);
            h.lock().push((params, token.expect("handshake token")));
        }));

        bridge.notify_load_complete();
        settle().await;

        let calls = handshakes.lock();
        assert_eq!(calls.len(), 1, "exactly one handshake call");
        assert_eq!(calls[0].0, vec![json!("functionProxy")]);

        // The superseded token is dead: dispatching it is a no-op.
        assert_eq!(bridge.dispatch(stale_token.as_str(), vec![json!({})]), None);
        assert_eq!(bridge.state(), ReadinessState::AwaitingHandshake);
    }

    #[tokio::test]
    async fn test_register_after_ready_swaps_delegate_only() {
        let bridge = Bridge::new();
        bridge.register(handshaking_host(&bridge, json!({})));
        bridge.notify_load_complete();
        settle().await;
        assert_eq!(bridge.state(), ReadinessState::Ready);

        let calls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let c = Arc::clone(&calls);
        bridge.register(Delegate::function_fn(move |method, _, _| {
            c.lock().push(method.to_string());
        }));

        // Still ready, no second handshake.
        assert_eq!(bridge.state(), ReadinessState::Ready);
        settle().await;
        assert!(calls.lock().is_empty());

        bridge.invoke("ping", vec![]);
        settle().await;
        assert_eq!(*calls.lock(), vec!["ping".to_string()]);
    }

    #[tokio::test]
    async fn test_extend_after_ready_applies_deferred() {
        let bridge = Bridge::new();
        bridge.register(handshaking_host(&bridge, json!({"theme": "dark"})));
        bridge.notify_load_complete();
        settle().await;

        bridge.extend(|config| {
            CapabilitySet::new().with("theme", config.get_str("theme").to_string())
        });

        // Deferred by one task: not yet merged.
        assert!(!bridge.has_capability("theme"));
        settle().await;

        let theme: Arc<String> = bridge.capability("theme").expect("capability");
        assert_eq!(*theme, "dark");
    }

    #[tokio::test]
    async fn test_capability_collision_first_wins() {
        let bridge = Bridge::new();

        bridge.extend(|_| CapabilitySet::new().with("nav", "first".to_string()));
        bridge.extend(|_| CapabilitySet::new().with("nav", "second".to_string()));

        bridge.register(handshaking_host(&bridge, json!({})));
        bridge.notify_load_complete();
        settle().await;

        let nav: Arc<String> = bridge.capability("nav").expect("capability");
        assert_eq!(*nav, "first");
    }

    #[tokio::test]
    async fn test_reserved_method_rejected() {
        let bridge = Bridge::new();
        bridge.register(Delegate::function_fn(|_, _, _| {}));

        assert!(!bridge.invoke(HANDSHAKE_METHOD, vec![]));
        assert!(bridge
            .invoke_with(HANDSHAKE_METHOD, vec![], |_| Value::Null)
            .is_none());
        // Only the pipeline's own handshake token is pending.
        assert_eq!(bridge.pending_callbacks(), 1);
    }

    #[tokio::test]
    async fn test_greet_scenario_primitive_proxy() {
        // invoke("greet", ["Ada"], cb) under PrimitiveProxy: the host reads
        // (name, token) and responds through the public dispatch entry.
        let bridge = Bridge::new();

        let host_bridge = bridge.clone();
        let host = MethodMap::new().handle("greet", move |args, _| {
            let name = args[0].as_str().unwrap_or_default();
            let token = args[1].as_str().expect("token argument");
            host_bridge.dispatch(token, vec![json!(format!("hi {name}"))]);
        });
        bridge.register(Delegate::primitive(Arc::new(host)));
        bridge.notify_load_complete();

        let greetings: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let g = Arc::clone(&greetings);
        let token = bridge
            .invoke_with("greet", vec![json!("Ada")], move |args| {
                g.lock().extend(args);
                Value::Null
            })
            .expect("token");

        // Asynchronous: nothing has happened yet.
        assert!(greetings.lock().is_empty());
        settle().await;

        assert_eq!(*greetings.lock(), vec![json!("hi Ada")]);
        // Token consumed by the host's answer.
        assert_eq!(bridge.dispatch(token.as_str(), vec![]), None);
    }

    #[tokio::test]
    async fn test_on_ready_after_ready_runs_next_task() {
        let bridge = Bridge::new();
        bridge.register(handshaking_host(&bridge, json!({})));
        bridge.notify_load_complete();
        settle().await;

        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        bridge.on_ready(move || {
            h.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        settle().await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_load_complete_before_register() {
        let bridge = Bridge::new();
        bridge.notify_load_complete();

        let ready = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&ready);
        bridge.on_ready(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        bridge.register(handshaking_host(&bridge, json!({})));
        settle().await;

        assert_eq!(bridge.state(), ReadinessState::Ready);
        assert_eq!(ready.load(Ordering::SeqCst), 1);
    }
}
