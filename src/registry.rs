//! Callback registry: token minting, storage, and dispatch.
//!
//! Closures cannot cross the page/host boundary, so the bridge stores them
//! here and hands the host an opaque [`CallbackToken`] instead. When the
//! host answers, it dispatches the token with its result arguments and the
//! registry invokes the original closure.
//!
//! # Lifetime Rules
//!
//! - Tokens come from a process-wide monotonic counter and are never reused.
//! - An entry is consumed on dispatch by default: the entry is removed
//!   *before* the closure runs, so re-entrant dispatch cannot observe it.
//! - Entries registered with [`CallbackRegistry::register_persistent`] stay
//!   resolvable across dispatches (change listeners).
//! - [`CallbackRegistry::cancel`] removes an entry without invoking it; the
//!   readiness pipeline uses this when a new handshake supersedes an
//!   in-flight one.
//!
//! There is no timeout: a host that never answers leaves its entry in the
//! table until the process ends.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::identifiers::CallbackToken;

// ============================================================================
// Types
// ============================================================================

/// Stored callback shape: host result arguments in, page result out.
pub type CallbackFn = dyn Fn(Vec<Value>) -> Value + Send + Sync;

/// A registry entry: the closure plus its consumption mode.
struct Entry {
    callback: Arc<CallbackFn>,
    /// Persistent entries survive dispatch (non-consuming).
    persistent: bool,
}

// ============================================================================
// CallbackRegistry
// ============================================================================

/// Process-wide table of pending callbacks keyed by [`CallbackToken`].
///
/// All access happens on the embedder's logical event loop; the lock exists
/// to keep the type `Send + Sync`, not to arbitrate contention.
pub struct CallbackRegistry {
    /// Token → entry table.
    entries: Mutex<FxHashMap<CallbackToken, Entry>>,
    /// Monotonic token counter. Never reset, never reused.
    next_sequence: AtomicU64,
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FxHashMap::default()),
            next_sequence: AtomicU64::new(1),
        }
    }

    /// Registers a one-shot callback and returns its token.
    ///
    /// The entry is removed on first dispatch or resolution.
    pub fn register<F>(&self, callback: F) -> CallbackToken
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        self.insert(Arc::new(callback), false)
    }

    /// Registers a persistent callback (dispatch without removal).
    ///
    /// Used for host-driven change listeners that fire more than once.
    pub fn register_persistent<F>(&self, callback: F) -> CallbackToken
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        self.insert(Arc::new(callback), true)
    }

    /// Registers an already-shared callback.
    pub(crate) fn register_shared(&self, callback: Arc<CallbackFn>) -> CallbackToken {
        self.insert(callback, false)
    }

    fn insert(&self, callback: Arc<CallbackFn>, persistent: bool) -> CallbackToken {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let token = CallbackToken::mint(sequence);

        self.entries
            .lock()
            .insert(token.clone(), Entry { callback, persistent });

        trace!(token = %token, persistent, "Callback registered");
        token
    }

    /// Resolves a token to its stored closure.
    ///
    /// With `consume == true` (the default convention) the entry is deleted
    /// before the closure is returned. Unknown tokens return `None` and log
    /// a warning; they never panic.
    #[must_use]
    pub fn resolve(&self, token: &CallbackToken, consume: bool) -> Option<Arc<CallbackFn>> {
        let mut entries = self.entries.lock();

        if consume {
            match entries.remove(token) {
                Some(entry) => Some(entry.callback),
                None => {
                    warn!(error = %Error::unknown_token(token.clone()), "Resolve failed");
                    None
                }
            }
        } else {
            match entries.get(token) {
                Some(entry) => Some(Arc::clone(&entry.callback)),
                None => {
                    warn!(error = %Error::unknown_token(token.clone()), "Resolve failed");
                    None
                }
            }
        }
    }

    /// Dispatches a token with the host's result arguments.
    ///
    /// Honors the entry's consumption mode: one-shot entries are removed
    /// before the closure runs, persistent entries stay registered. Unknown
    /// tokens are a logged no-op returning `None`.
    pub fn dispatch(&self, token: &CallbackToken, args: Vec<Value>) -> Option<Value> {
        let callback = {
            let mut entries = self.entries.lock();
            match entries.get(token) {
                Some(entry) if entry.persistent => Some(Arc::clone(&entry.callback)),
                Some(_) => entries.remove(token).map(|entry| entry.callback),
                None => {
                    warn!(error = %Error::unknown_token(token.clone()), "Dispatch failed");
                    None
                }
            }
        }?;

        trace!(token = %token, args = args.len(), "Dispatching callback");
        Some(callback(args))
    }

    /// Removes an entry without invoking it.
    ///
    /// Cancelling an unknown token is a no-op.
    pub fn cancel(&self, token: &CallbackToken) {
        if self.entries.lock().remove(token).is_some() {
            debug!(token = %token, "Callback cancelled");
        }
    }

    /// Returns the number of pending entries.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if no entries are pending.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    #[test]
    fn test_token_uniqueness() {
        let registry = CallbackRegistry::new();
        let mut tokens = Vec::new();

        for i in 0..100 {
            let token = registry.register(|_| Value::Null);
            tokens.push(token.clone());

            // Interleave resolutions and cancellations.
            if i % 3 == 0 {
                let _ = registry.resolve(&token, true);
            } else if i % 3 == 1 {
                registry.cancel(&token);
            }
        }

        let mut deduped = tokens.clone();
        deduped.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        deduped.dedup();
        assert_eq!(deduped.len(), tokens.len());
    }

    #[test]
    fn test_consume_on_resolve() {
        let registry = CallbackRegistry::new();
        let token = registry.register(|_| json!("done"));

        assert!(registry.resolve(&token, true).is_some());
        assert!(registry.resolve(&token, true).is_none());
    }

    #[test]
    fn test_non_consuming_resolve() {
        let registry = CallbackRegistry::new();
        let token = registry.register(|_| json!("still here"));

        let first = registry.resolve(&token, false).expect("first resolve");
        let second = registry.resolve(&token, false).expect("second resolve");

        assert_eq!(first(vec![]), json!("still here"));
        assert_eq!(second(vec![]), json!("still here"));
    }

    #[test]
    fn test_dispatch_consumes_one_shot() {
        let registry = CallbackRegistry::new();
        let token = registry.register(|args| args.into_iter().next().unwrap_or(Value::Null));

        let result = registry.dispatch(&token, vec![json!("hi Ada")]);
        assert_eq!(result, Some(json!("hi Ada")));

        // Consumed: second dispatch is a no-op.
        assert_eq!(registry.dispatch(&token, vec![json!("again")]), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispatch_persistent_survives() {
        let registry = CallbackRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);

        let token = registry.register_persistent(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Value::Null
        });

        registry.dispatch(&token, vec![]);
        registry.dispatch(&token, vec![]);
        registry.dispatch(&token, vec![]);

        assert_eq!(hits.load(Ordering::SeqCst), 3);
        assert_eq!(registry.pending_count(), 1);
    }

    #[test]
    fn test_cancel_removes_without_invoking() {
        let registry = CallbackRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);

        let token = registry.register(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Value::Null
        });

        registry.cancel(&token);

        assert_eq!(registry.dispatch(&token, vec![]), None);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reentrant_dispatch_cannot_observe_entry() {
        // The entry is removed before the closure runs, so dispatching a
        // one-shot token from inside its own closure is a no-op.
        let registry = Arc::new(CallbackRegistry::new());
        let registry_clone = Arc::clone(&registry);
        let slot: Arc<Mutex<Option<CallbackToken>>> = Arc::new(Mutex::new(None));
        let slot_clone = Arc::clone(&slot);

        let token = registry.register(move |_| {
            let own_token = slot_clone.lock().clone().expect("token stored");
            json!(registry_clone.dispatch(&own_token, vec![]).is_some())
        });
        *slot.lock() = Some(token.clone());

        assert_eq!(registry.dispatch(&token, vec![]), Some(json!(false)));
    }
}
