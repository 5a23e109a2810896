//! Call strategy selection and delivery.
//!
//! The dispatcher owns the active [`Delegate`] and turns
//! `invoke(method, params, callback)` into the delegate call shape the
//! active transport mode requires.
//!
//! # Invariants
//!
//! - Validation happens before any callback token is minted, so a failed
//!   invoke never leaves an orphaned registry entry.
//! - Every delegate call is deferred by at least one task boundary
//!   (`tokio::spawn`), uniformly across modes, preserving the handshake's
//!   asynchronous contract.
//! - URL-scheme navigables opened through a [`UrlOpener`] are closed after
//!   [`URL_GRACE_PERIOD`] so the host side does not accumulate elements.
//!
//! [`UrlOpener`]: super::UrlOpener

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::CallbackToken;
use crate::protocol::codec;
use crate::registry::{CallbackFn, CallbackRegistry};

use super::delegate::{Delegate, HostCallback, UrlSink};
use super::TransportMode;

// ============================================================================
// Constants
// ============================================================================

/// Grace window before a transient URL navigable is removed.
pub const URL_GRACE_PERIOD: Duration = Duration::from_secs(2);

// ============================================================================
// Dispatcher
// ============================================================================

/// Selects a call strategy by transport mode and delivers calls to the host.
pub(crate) struct Dispatcher {
    /// Shared callback registry (tokens minted here on invoke).
    registry: Arc<CallbackRegistry>,
    /// Active delegate. `None` until registration.
    delegate: RwLock<Option<Delegate>>,
    /// Removal grace for URL-scheme navigables.
    url_grace: Duration,
}

impl Dispatcher {
    /// Creates a dispatcher with no delegate.
    pub(crate) fn new(registry: Arc<CallbackRegistry>, url_grace: Duration) -> Self {
        Self {
            registry,
            delegate: RwLock::new(None),
            url_grace,
        }
    }

    /// Installs or swaps the active delegate.
    pub(crate) fn set_delegate(&self, delegate: Delegate) {
        debug!(mode = %delegate.mode(), "Delegate registered");
        *self.delegate.write() = Some(delegate);
    }

    /// Returns the active transport mode, if a delegate is registered.
    pub(crate) fn mode(&self) -> Option<TransportMode> {
        self.delegate.read().as_ref().map(Delegate::mode)
    }

    /// Invokes a host method, minting a callback token if needed.
    ///
    /// Returns the minted token (if a callback was supplied). Validation
    /// precedes token minting; on delivery failure the token is cancelled,
    /// so no orphaned entries survive a failed invoke.
    pub(crate) fn invoke(
        &self,
        method: &str,
        params: Vec<Value>,
        callback: Option<Arc<CallbackFn>>,
    ) -> Result<Option<CallbackToken>> {
        let delegate = self.checked_delegate(method)?;

        let token = callback.map(|cb| self.registry.register_shared(cb));

        if let Err(e) = self.deliver(&delegate, method, params, token.clone()) {
            if let Some(token) = &token {
                self.registry.cancel(token);
            }
            return Err(e);
        }

        Ok(token)
    }

    /// Invokes a host method with an already-registered callback token.
    ///
    /// The readiness pipeline uses this for the handshake, whose token must
    /// exist (and be cancellable) before the call is delivered.
    pub(crate) fn invoke_registered(
        &self,
        method: &str,
        params: Vec<Value>,
        token: Option<CallbackToken>,
    ) -> Result<()> {
        let delegate = self.checked_delegate(method)?;
        self.deliver(&delegate, method, params, token)
    }

    /// Validates the method name and delegate support, returning a clone of
    /// the active delegate.
    fn checked_delegate(&self, method: &str) -> Result<Delegate> {
        if method.is_empty() {
            return Err(Error::invalid_method("empty method name"));
        }

        let delegate = self
            .delegate
            .read()
            .clone()
            .ok_or(Error::NoDelegate)?;

        let supported = match &delegate {
            Delegate::Primitive(d) => d.supports(method),
            Delegate::Object(d) => d.supports(method),
            // URL and function proxies accept any method by construction.
            Delegate::UrlScheme { .. } | Delegate::Function(_) => true,
        };

        if !supported {
            return Err(Error::unknown_method(method));
        }

        Ok(delegate)
    }

    /// Delivers the call using the delegate's strategy.
    fn deliver(
        &self,
        delegate: &Delegate,
        method: &str,
        params: Vec<Value>,
        token: Option<CallbackToken>,
    ) -> Result<()> {
        trace!(method = %method, mode = %delegate.mode(), "Delivering call");

        match delegate {
            Delegate::UrlScheme { scheme, sink } => {
                self.deliver_url(scheme, sink, method, params, token)
            }
            Delegate::Primitive(d) => {
                let args = Self::flatten_primitives(params, token)?;
                let delegate = Arc::clone(d);
                let method = method.to_string();
                tokio::spawn(async move {
                    delegate.call(&method, args).await;
                });
                Ok(())
            }
            Delegate::Object(d) => {
                let callback = token
                    .map(|token| HostCallback::new(Arc::clone(&self.registry), token));
                let delegate = Arc::clone(d);
                let method = method.to_string();
                tokio::spawn(async move {
                    delegate.call(&method, params, callback).await;
                });
                Ok(())
            }
            Delegate::Function(d) => {
                let delegate = Arc::clone(d);
                let method = method.to_string();
                tokio::spawn(async move {
                    delegate.call(&method, params, token).await;
                });
                Ok(())
            }
        }
    }

    /// URL-scheme strategy: encode, build, validate, hand off.
    fn deliver_url(
        &self,
        scheme: &str,
        sink: &UrlSink,
        method: &str,
        mut params: Vec<Value>,
        token: Option<CallbackToken>,
    ) -> Result<()> {
        if let Some(token) = token {
            params.push(Value::String(token.as_str().to_string()));
        }

        let encoded = codec::encode_value(&Value::Array(params));
        let bridge_url = format!("{scheme}://{method}?parameters={encoded}");

        if Url::parse(&bridge_url).is_err() {
            return Err(Error::malformed_url(bridge_url));
        }

        match sink {
            UrlSink::Handler(handler) => {
                let handler = Arc::clone(handler);
                tokio::spawn(async move {
                    handler(&bridge_url);
                });
            }
            UrlSink::Opener(opener) => {
                let opener = Arc::clone(opener);
                let grace = self.url_grace;
                tokio::spawn(async move {
                    let handle = opener.open(&bridge_url).await;
                    sleep(grace).await;
                    opener.close(handle).await;
                });
            }
        }

        Ok(())
    }

    /// Flattens parameters to the primitive-proxy calling convention.
    ///
    /// Numbers, strings and booleans pass through; everything else is
    /// JSON-stringified. The callback token, if any, is appended last.
    fn flatten_primitives(
        params: Vec<Value>,
        token: Option<CallbackToken>,
    ) -> Result<Vec<Value>> {
        let mut args = Vec::with_capacity(params.len() + usize::from(token.is_some()));

        for param in params {
            match param {
                Value::Number(_) | Value::String(_) | Value::Bool(_) => args.push(param),
                other => args.push(Value::String(serde_json::to_string(&other)?)),
            }
        }

        if let Some(token) = token {
            args.push(Value::String(token.as_str().to_string()));
        }

        Ok(args)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::task::yield_now;

    use crate::transport::delegate::MethodMap;
    use crate::transport::{PrimitiveDelegate, UrlOpener};

    use super::*;

    /// Lets spawned delegate calls run on the current-thread test runtime.
    async fn settle() {
        for _ in 0..8 {
            yield_now().await;
        }
    }

    fn dispatcher() -> (Arc<CallbackRegistry>, Dispatcher) {
        let registry = Arc::new(CallbackRegistry::new());
        let dispatcher = Dispatcher::new(Arc::clone(&registry), Duration::from_millis(20));
        (registry, dispatcher)
    }

    #[tokio::test]
    async fn test_invoke_without_delegate_fails() {
        let (_, dispatcher) = dispatcher();
        let result = dispatcher.invoke("greet", vec![], None);
        assert!(matches!(result, Err(Error::NoDelegate)));
    }

    #[tokio::test]
    async fn test_invoke_empty_method_fails() {
        let (_, dispatcher) = dispatcher();
        dispatcher.set_delegate(Delegate::function_fn(|_, _, _| {}));

        let result = dispatcher.invoke("", vec![], None);
        assert!(matches!(result, Err(Error::InvalidMethod { .. })));
    }

    #[tokio::test]
    async fn test_unknown_method_leaves_no_orphan_token() {
        let (registry, dispatcher) = dispatcher();
        dispatcher.set_delegate(Delegate::object(Arc::new(MethodMap::new())));

        let result = dispatcher.invoke("missing", vec![], Some(Arc::new(|_| Value::Null)));
        assert!(matches!(result, Err(Error::UnknownMethod { .. })));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_function_proxy_receives_method_params_token() {
        let (_, dispatcher) = dispatcher();
        let seen: Arc<Mutex<Vec<(String, Vec<Value>, Option<CallbackToken>)>>> =
            Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        dispatcher.set_delegate(Delegate::function_fn(move |method, params, token| {
            seen_clone.lock().push((method.to_string(), params, token));
        }));

        let token = dispatcher
            .invoke("greet", vec![json!("Ada")], Some(Arc::new(|_| Value::Null)))
            .expect("invoke")
            .expect("token");

        // Deferred by a task boundary: nothing delivered synchronously.
        assert!(seen.lock().is_empty());
        settle().await;

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "greet");
        assert_eq!(calls[0].1, vec![json!("Ada")]);
        assert_eq!(calls[0].2, Some(token));
    }

    #[tokio::test]
    async fn test_primitive_proxy_flattens_complex_values() {
        let (_, dispatcher) = dispatcher();
        let seen: Arc<Mutex<Vec<Vec<Value>>>> = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);

        struct Capture(Arc<Mutex<Vec<Vec<Value>>>>);

        #[async_trait]
        impl PrimitiveDelegate for Capture {
            fn supports(&self, method: &str) -> bool {
                method == "store"
            }
            async fn call(&self, _method: &str, args: Vec<Value>) {
                self.0.lock().push(args);
            }
        }

        dispatcher.set_delegate(Delegate::primitive(Arc::new(Capture(seen_clone))));

        dispatcher
            .invoke(
                "store",
                vec![json!(7), json!("text"), json!(true), json!({"k": [1, 2]})],
                None,
            )
            .expect("invoke");
        settle().await;

        let calls = seen.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0][0], json!(7));
        assert_eq!(calls[0][1], json!("text"));
        assert_eq!(calls[0][2], json!(true));
        // Complex value arrives JSON-stringified.
        assert_eq!(calls[0][3], json!("{\"k\":[1,2]}"));
    }

    #[tokio::test]
    async fn test_object_proxy_callback_round_trip() {
        let (registry, dispatcher) = dispatcher();

        // Host answers greet by invoking the live callback with a greeting.
        let host = MethodMap::new().handle("greet", |params, callback| {
            let name = params[0].as_str().unwrap_or_default();
            if let Some(cb) = callback {
                cb.invoke(vec![json!(format!("hi {name}"))]);
            }
        });
        dispatcher.set_delegate(Delegate::object(Arc::new(host)));

        let answers: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));
        let answers_clone = Arc::clone(&answers);

        let token = dispatcher
            .invoke(
                "greet",
                vec![json!("Ada")],
                Some(Arc::new(move |args| {
                    answers_clone.lock().extend(args);
                    Value::Null
                })),
            )
            .expect("invoke")
            .expect("token");
        settle().await;

        assert_eq!(*answers.lock(), vec![json!("hi Ada")]);
        // Token consumed by the host's answer.
        assert!(registry.resolve(&token, true).is_none());
    }

    #[tokio::test]
    async fn test_url_scheme_format_and_token() {
        let (_, dispatcher) = dispatcher();
        let urls: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let urls_clone = Arc::clone(&urls);

        dispatcher.set_delegate(Delegate::url_handler("app", move |url| {
            urls_clone.lock().push(url.to_string());
        }));

        let token = dispatcher
            .invoke("openSettings", vec![json!("general")], Some(Arc::new(|_| Value::Null)))
            .expect("invoke")
            .expect("token");
        settle().await;

        let urls = urls.lock();
        assert_eq!(urls.len(), 1);
        assert!(urls[0].starts_with("app://openSettings?parameters="));

        let url = Url::parse(&urls[0]).expect("valid url");
        assert_eq!(url.scheme(), "app");

        let encoded = url
            .query_pairs()
            .find(|(k, _)| k == "parameters")
            .map(|(_, v)| v.into_owned())
            .expect("parameters present");
        let decoded: Vec<Value> = serde_json::from_str(&encoded).expect("json array");
        assert_eq!(decoded[0], json!("general"));
        assert_eq!(decoded[1], json!(token.as_str()));
    }

    #[tokio::test]
    async fn test_url_opener_grace_window() {
        let (_, dispatcher) = dispatcher();

        struct Counting {
            opened: AtomicU64,
            closed: AtomicU64,
        }

        #[async_trait]
        impl UrlOpener for Counting {
            async fn open(&self, _url: &str) -> u64 {
                self.opened.fetch_add(1, Ordering::SeqCst) + 1
            }
            async fn close(&self, _handle: u64) {
                self.closed.fetch_add(1, Ordering::SeqCst);
            }
        }

        let opener = Arc::new(Counting {
            opened: AtomicU64::new(0),
            closed: AtomicU64::new(0),
        });
        dispatcher.set_delegate(Delegate::url_opener("app", Arc::clone(&opener) as _));

        dispatcher.invoke("ping", vec![], None).expect("invoke");
        settle().await;

        assert_eq!(opener.opened.load(Ordering::SeqCst), 1);
        assert_eq!(opener.closed.load(Ordering::SeqCst), 0);

        // Past the grace window the navigable is removed.
        sleep(Duration::from_millis(60)).await;
        assert_eq!(opener.closed.load(Ordering::SeqCst), 1);
    }
}
