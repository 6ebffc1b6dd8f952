//! Thread-safe ordered variable store.

use crate::errors::TestflowError;
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::Value;

/// An ordered mapping of variable names to values.
///
/// Names are unique and the last write wins. A store is shared between
/// contexts by wrapping it in an `Arc`; cloning produces an independent
/// snapshot.
#[derive(Debug, Default)]
pub struct VariableStore {
    entries: RwLock<IndexMap<String, Value>>,
}

impl VariableStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from existing entries.
    #[must_use]
    pub fn from_entries(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Inserts or overwrites a variable.
    pub fn set(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.write().insert(name.into(), value.into());
    }

    /// Gets a variable.
    ///
    /// # Errors
    ///
    /// Returns `UnknownVariable` if the name is not defined.
    pub fn get(&self, name: &str) -> Result<Value, TestflowError> {
        self.entries
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| TestflowError::UnknownVariable {
                name: name.to_string(),
            })
    }

    /// Gets a variable if it is defined.
    #[must_use]
    pub fn get_opt(&self, name: &str) -> Option<Value> {
        self.entries.read().get(name).cloned()
    }

    /// Checks if a variable is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.read().contains_key(name)
    }

    /// Removes a variable, returning its previous value.
    pub fn remove(&self, name: &str) -> Option<Value> {
        self.entries.write().shift_remove(name)
    }

    /// Returns a copy of all variables in insertion order.
    #[must_use]
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        self.entries.read().clone()
    }

    /// Returns all variable names in insertion order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Clone for VariableStore {
    fn clone(&self) -> Self {
        Self {
            entries: RwLock::new(self.entries.read().clone()),
        }
    }
}
