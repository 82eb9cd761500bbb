//! Computed values: named pure functions of the whole state.
//!
//! Nothing is cached. Every read evaluates the function against a fresh
//! copy of the state, so computed keys never appear in the state document
//! or in history snapshots.

use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// A computed value's function.
pub type ComputeFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Registry of computed values for one store.
#[derive(Default)]
pub struct ComputedRegistry {
    entries: RwLock<HashMap<String, ComputeFn>>,
}

impl ComputedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `compute` under `key`, replacing any previous definition.
    pub fn define(&self, key: impl Into<String>, compute: ComputeFn) {
        self.entries.write().insert(key.into(), compute);
    }

    /// Remove a definition. Returns false if none existed.
    pub fn remove(&self, key: &str) -> bool {
        self.entries.write().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Evaluate `key` against `state`, if defined.
    ///
    /// The function is cloned out first, so it may read the store.
    pub fn evaluate(&self, key: &str, state: &Value) -> Option<Value> {
        let compute = self.entries.read().get(key).cloned()?;
        Some(compute(state))
    }

    /// Names of all computed values, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}
