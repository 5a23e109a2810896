//! Capability accumulation and merge.
//!
//! Extensions add named capabilities to the bridge's public surface once
//! the host configuration is available. A [`CapabilitySet`] is the ordered
//! accumulator an extension returns; the bridge merges it into its
//! capability table, rejecting name collisions (first registration wins).

// ============================================================================
// Imports
// ============================================================================

use std::any::Any;
use std::sync::Arc;

// ============================================================================
// Types
// ============================================================================

/// A named value added to the bridge surface by an extension.
///
/// Capabilities are typed handles (a navigation facade, a theme switcher);
/// consumers downcast via [`Bridge::capability`](crate::Bridge::capability).
pub type Capability = Arc<dyn Any + Send + Sync>;

// ============================================================================
// CapabilitySet
// ============================================================================

/// Ordered accumulator of named capabilities.
///
/// Insertion order is preserved so merges stay deterministic. Duplicate
/// names within one set keep the first entry.
#[derive(Default)]
pub struct CapabilitySet {
    entries: Vec<(String, Capability)>,
}

impl CapabilitySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a capability, builder style.
    ///
    /// A name already present in this set is kept as-is and the new value
    /// is dropped.
    #[must_use]
    pub fn with<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.insert(name, Arc::new(value));
        self
    }

    /// Adds an already-shared capability.
    pub fn insert(&mut self, name: impl Into<String>, value: Capability) {
        let name = name.into();
        if self.entries.iter().any(|(existing, _)| *existing == name) {
            return;
        }
        self.entries.push((name, value));
    }

    /// Returns the number of entries.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set holds no entries.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the set, yielding entries in insertion order.
    pub(crate) fn into_entries(self) -> Vec<(String, Capability)> {
        self.entries
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insertion_order_preserved() {
        let set = CapabilitySet::new()
            .with("navigation", "nav-handle".to_string())
            .with("theme", 7u32)
            .with("user", true);

        let names: Vec<String> = set
            .into_entries()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["navigation", "theme", "user"]);
    }

    #[test]
    fn test_duplicate_within_set_keeps_first() {
        let set = CapabilitySet::new()
            .with("theme", "first".to_string())
            .with("theme", "second".to_string());

        let entries = set.into_entries();
        assert_eq!(entries.len(), 1);
        let value = entries[0].1.clone().downcast::<String>().expect("string");
        assert_eq!(*value, "first");
    }
}
