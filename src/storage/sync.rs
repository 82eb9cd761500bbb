//! Write-through persistence of selected keys.

use super::codec::ValueCodec;
use super::driver::StorageDriver;
use crate::state::{get_path, paths_overlap, set_path, EqualityPolicy};
use serde_json::Value;
use std::sync::Arc;

/// Persists a fixed list of keys or paths of one store.
///
/// Failures never reach the caller: a value that cannot be decoded is
/// seeded as its raw string, and a failed write leaves the in-memory state
/// as it is.
pub struct PersistenceSync {
    prefix: String,
    keys: Vec<String>,
    driver: Arc<dyn StorageDriver>,
    codec: Arc<dyn ValueCodec>,
}

impl PersistenceSync {
    /// `name` namespaces the storage keys (`<name>:<key>`).
    pub fn new(
        name: &str,
        keys: Vec<String>,
        driver: Arc<dyn StorageDriver>,
        codec: Arc<dyn ValueCodec>,
    ) -> Self {
        let prefix = if name.is_empty() {
            String::new()
        } else {
            format!("{name}:")
        };

        Self {
            prefix,
            keys,
            driver,
            codec,
        }
    }

    /// Keys or paths being persisted.
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Storage key used for a persisted key or path.
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Overlay stored values onto `state`.
    pub fn seed(&self, state: &mut Value) {
        for key in &self.keys {
            let storage_key = self.storage_key(key);
            let raw = match self.driver.get_item(&storage_key) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %storage_key, error = %e, "failed to read persisted key");
                    continue;
                }
            };

            let value = match self.codec.decode(&raw) {
                Ok(value) => value,
                Err(e) => {
                    tracing::debug!(key = %storage_key, error = %e, "decode failed, seeding raw string");
                    Value::String(raw)
                }
            };

            set_path(state, key, value);
        }
    }

    /// Write through every persisted key touched by a mutation.
    ///
    /// A key is written when `written` overlaps it or when its value
    /// changed between `previous` and `next`. A key that no longer exists
    /// is removed from storage.
    pub fn sync(&self, written: Option<&str>, previous: &Value, next: &Value) {
        for key in &self.keys {
            let before = get_path(previous, key);
            let after = get_path(next, key);

            let touched = written.is_some_and(|w| paths_overlap(w, key));
            if !touched && EqualityPolicy::Structural.equal_opt(before, after) {
                continue;
            }

            match after {
                Some(value) => self.persist(key, value),
                None => self.forget(key),
            }
        }
    }

    /// Encode and store one value, ignoring failures.
    pub fn persist(&self, key: &str, value: &Value) {
        let storage_key = self.storage_key(key);
        let result = self
            .codec
            .encode(value)
            .and_then(|raw| self.driver.set_item(&storage_key, &raw));

        if let Err(e) = result {
            tracing::warn!(key = %storage_key, error = %e, "failed to persist key");
        }
    }

    fn forget(&self, key: &str) {
        let storage_key = self.storage_key(key);
        if let Err(e) = self.driver.remove_item(&storage_key) {
            tracing::warn!(key = %storage_key, error = %e, "failed to remove persisted key");
        }
    }
}
