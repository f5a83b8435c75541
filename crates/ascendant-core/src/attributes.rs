//! Typed, dirty-tracked attribute storage for abilities
//!
//! Every ability owns an [`AttributeStore`]: a keyed map of typed values with
//! a closed set of value types. Capability state (tier, toggled, unlocked)
//! lives under reserved keys in a distinct namespace so it can never collide
//! with custom keys written by other systems.
//!
//! Dirty tracking is revision-based: every mutation bumps a revision counter,
//! and the dirty flag is cleared only when a flush of that exact revision is
//! acknowledged. A mutation that lands while a save is in flight keeps the
//! store dirty.

use crate::error::{Error, Result};
use crate::value::AttributeValue;
use indexmap::IndexMap;

/// Namespace prefix for reserved capability keys
pub const RESERVED_PREFIX: &str = "ascendant:";

/// Reserved key holding an ability's tier
pub const TIER_KEY: &str = "ascendant:tier";
/// Reserved key holding an ability's toggle state
pub const TOGGLED_KEY: &str = "ascendant:toggled";
/// Reserved key holding an ability's unlock state
pub const UNLOCKED_KEY: &str = "ascendant:unlocked";

#[derive(Debug, Clone, PartialEq)]
struct StoredAttribute {
    value: AttributeValue,
    displayable: bool,
}

/// Keyed storage of typed per-ability facts
#[derive(Debug, Clone, Default)]
pub struct AttributeStore {
    entries: IndexMap<String, StoredAttribute>,
    dirty: bool,
    revision: u64,
}

impl AttributeStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the raw value stored against a key
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.get(key).map(|e| &e.value)
    }

    /// Get a boolean attribute
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(AttributeValue::as_bool)
    }

    /// Get an integer attribute
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(AttributeValue::as_int)
    }

    /// Get a string attribute
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(AttributeValue::as_str)
    }

    /// Set a custom attribute, marking the store dirty
    ///
    /// Fails with [`Error::TypeMismatch`] if the key was previously written
    /// with a different value type, and with [`Error::ReservedKey`] for keys
    /// in the reserved namespace (capability state goes through the typed
    /// wrappers on the owning ability instead).
    pub fn set(&mut self, key: &str, value: impl Into<AttributeValue>) -> Result<()> {
        if key.starts_with(RESERVED_PREFIX) {
            return Err(Error::ReservedKey(key.to_string()));
        }
        self.write(key, value.into(), false)
    }

    /// Mark a custom attribute as visible on display surfaces
    pub fn set_displayable(&mut self, key: &str, displayable: bool) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.displayable = displayable;
        }
    }

    /// Set a reserved capability attribute, marking the store dirty
    pub(crate) fn set_reserved(&mut self, key: &str, value: AttributeValue) -> Result<()> {
        debug_assert!(key.starts_with(RESERVED_PREFIX));
        self.write(key, value, true)
    }

    fn write(&mut self, key: &str, value: AttributeValue, displayable: bool) -> Result<()> {
        if let Some(existing) = self.entries.get_mut(key) {
            if existing.value.kind() != value.kind() {
                return Err(Error::TypeMismatch {
                    key: key.to_string(),
                    stored: existing.value.kind(),
                    supplied: value.kind(),
                });
            }
            existing.value = value;
        } else {
            self.entries
                .insert(key.to_string(), StoredAttribute { value, displayable });
        }
        self.mark_dirty();
        Ok(())
    }

    /// Insert a value loaded from persistence without marking the store dirty
    ///
    /// Accepts reserved keys; used when rebuilding state from storage rows.
    pub fn hydrate(&mut self, key: &str, value: AttributeValue) {
        let displayable = key.starts_with(RESERVED_PREFIX);
        self.entries
            .insert(key.to_string(), StoredAttribute { value, displayable });
    }

    /// Iterate over all entries as `(key, displayable, value)`
    pub fn entries(&self) -> impl Iterator<Item = (&str, bool, &AttributeValue)> {
        self.entries
            .iter()
            .map(|(k, e)| (k.as_str(), e.displayable, &e.value))
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether this store has unsaved mutations
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Mark the store dirty; idempotent
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
        self.revision = self.revision.wrapping_add(1);
    }

    /// The current mutation revision, captured by flush snapshots
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Clear the dirty flag if no mutation landed since `revision` was captured
    pub fn acknowledge_flush(&mut self, revision: u64) {
        if self.revision == revision {
            self.dirty = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut store = AttributeStore::new();
        store.set("combo_counter", 3i64).unwrap();
        store.set("last_target", "zombie").unwrap();

        assert_eq!(store.get_int("combo_counter"), Some(3));
        assert_eq!(store.get_str("last_target"), Some("zombie"));
        assert_eq!(store.get_bool("combo_counter"), None);
        assert!(store.is_dirty());
    }

    #[test]
    fn test_type_mismatch_fails() {
        let mut store = AttributeStore::new();
        store.set("combo_counter", 3i64).unwrap();

        let err = store.set("combo_counter", true).unwrap_err();
        assert_eq!(
            err,
            Error::TypeMismatch {
                key: "combo_counter".to_string(),
                stored: "int",
                supplied: "bool",
            }
        );
        // Stored value untouched
        assert_eq!(store.get_int("combo_counter"), Some(3));
    }

    #[test]
    fn test_reserved_namespace_rejected() {
        let mut store = AttributeStore::new();
        let err = store.set("ascendant:tier", 2i64).unwrap_err();
        assert!(matches!(err, Error::ReservedKey(_)));
    }

    #[test]
    fn test_hydrate_does_not_dirty() {
        let mut store = AttributeStore::new();
        store.hydrate(TIER_KEY, AttributeValue::Int(2));
        store.hydrate("custom", AttributeValue::Bool(true));

        assert!(!store.is_dirty());
        assert_eq!(store.get_int(TIER_KEY), Some(2));
    }

    #[test]
    fn test_entries_display_flags() {
        let mut store = AttributeStore::new();
        store.hydrate(TIER_KEY, AttributeValue::Int(1));
        store.set("hidden", 4i64).unwrap();
        store.set("shown", 5i64).unwrap();
        store.set_displayable("shown", true);

        let flags: Vec<(&str, bool)> = store.entries().map(|(k, d, _)| (k, d)).collect();
        assert!(flags.contains(&(TIER_KEY, true)));
        assert!(flags.contains(&("hidden", false)));
        assert!(flags.contains(&("shown", true)));
    }

    #[test]
    fn test_flush_acknowledgment_races() {
        let mut store = AttributeStore::new();
        store.set("a", 1i64).unwrap();
        let captured = store.revision();

        // Mutation lands while the save is in flight
        store.set("b", 2i64).unwrap();
        store.acknowledge_flush(captured);
        assert!(store.is_dirty());

        // A clean acknowledgment of the latest revision clears the flag
        let latest = store.revision();
        store.acknowledge_flush(latest);
        assert!(!store.is_dirty());
    }
}
