//! Readiness state machine and deferred-registration queues.
//!
//! Bridge consumers register extensions and ready callbacks long before the
//! host has answered the handshake. This module owns the bookkeeping: the
//! strictly-forward state machine, the FIFO queues, and the pending
//! handshake token. The orchestration (issuing the handshake, draining the
//! queues) lives in [`Bridge`](crate::Bridge).
//!
//! # State Machine
//!
//! ```text
//! NotRegistered ──register()──► AwaitingHandshake ──handshake──► Ready
//! ```
//!
//! Transitions are strictly forward; once `Ready` the state never regresses,
//! even when `register()` is called again (only the delegate is swapped).

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use crate::identifiers::CallbackToken;

use super::capability::CapabilitySet;
use super::config::Configuration;

// ============================================================================
// Types
// ============================================================================

/// Deferred extension: configuration in, capabilities out.
pub type ExtensionFn = Box<dyn FnOnce(&Configuration) -> CapabilitySet + Send>;

/// Deferred ready callback.
pub type ReadyFn = Box<dyn FnOnce() + Send>;

// ============================================================================
// ReadinessState
// ============================================================================

/// Bridge readiness, strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
    /// No delegate registered yet.
    NotRegistered,
    /// Delegate registered; handshake not yet answered.
    AwaitingHandshake,
    /// Host configuration received; queues drained.
    Ready,
}

// ============================================================================
// PipelineState
// ============================================================================

/// Mutable pipeline bookkeeping, held behind the bridge's state lock.
pub(crate) struct PipelineState {
    /// Current readiness.
    pub(crate) state: ReadinessState,
    /// Extensions queued until the handshake completes. FIFO.
    pub(crate) extension_queue: Vec<ExtensionFn>,
    /// Ready callbacks queued until extensions have been applied. FIFO.
    pub(crate) ready_queue: Vec<ReadyFn>,
    /// Token of the in-flight handshake, cancellable on re-registration.
    pub(crate) pending_handshake: Option<CallbackToken>,
    /// Whether the embedder has signalled load-complete.
    pub(crate) load_complete: bool,
    /// Whether a handshake is registered but waiting for load-complete.
    pub(crate) handshake_deferred: bool,
    /// Host configuration, set once on handshake completion.
    pub(crate) configuration: Option<Arc<Configuration>>,
}

impl PipelineState {
    pub(crate) fn new() -> Self {
        Self {
            state: ReadinessState::NotRegistered,
            extension_queue: Vec::new(),
            ready_queue: Vec::new(),
            pending_handshake: None,
            load_complete: false,
            handshake_deferred: false,
            configuration: None,
        }
    }

    /// Returns `true` once the handshake has completed.
    #[inline]
    pub(crate) fn is_ready(&self) -> bool {
        self.state == ReadinessState::Ready
    }

    /// Moves both queues out for draining, leaving them empty.
    pub(crate) fn take_queues(&mut self) -> (Vec<ExtensionFn>, Vec<ReadyFn>) {
        (
            std::mem::take(&mut self.extension_queue),
            std::mem::take(&mut self.ready_queue),
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = PipelineState::new();
        assert_eq!(state.state, ReadinessState::NotRegistered);
        assert!(!state.is_ready());
        assert!(!state.load_complete);
        assert!(state.pending_handshake.is_none());
        assert!(state.configuration.is_none());
    }

    #[test]
    fn test_take_queues_empties() {
        let mut state = PipelineState::new();
        state.extension_queue.push(Box::new(|_| CapabilitySet::new()));
        state.ready_queue.push(Box::new(|| {}));

        let (extensions, ready) = state.take_queues();
        assert_eq!(extensions.len(), 1);
        assert_eq!(ready.len(), 1);
        assert!(state.extension_queue.is_empty());
        assert!(state.ready_queue.is_empty());
    }
}
