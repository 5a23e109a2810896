//! Wire-format concerns shared by the transport strategies.
//!
//! The bridge itself performs no I/O; this module only defines how values
//! are flattened into URL-query-safe strings for the transports that need a
//! textual representation.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Query codec: value/query encoding, lossless decode |

// ============================================================================
// Submodules
// ============================================================================

/// Query codec for URL-scheme calls.
pub mod codec;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{decode_value, encode_query, encode_value};

// ============================================================================
// Constants
// ============================================================================

/// Reserved method name for the readiness handshake.
///
/// The host answers this call with its initial configuration. User code may
/// not invoke it directly.
pub const HANDSHAKE_METHOD: &str = "ready";
