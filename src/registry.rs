//! Host-owned registry of named stores.

use crate::error::{Result, StoreError};
use crate::store::{Store, StoreConfig};
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// Named stores owned by the host application.
///
/// Replaces any process-wide exposure of stores: whoever needs a store by
/// name is handed the registry explicitly.
#[derive(Debug, Default)]
pub struct StoreRegistry {
    stores: RwLock<BTreeMap<String, Store>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `config` and register it under its name.
    pub fn create(&self, config: StoreConfig) -> Result<Store> {
        if config.name.is_empty() {
            return Err(StoreError::InvalidConfig(
                "registered stores need a name".into(),
            ));
        }
        if self.contains(&config.name) {
            return Err(StoreError::StoreExists(config.name));
        }

        let store = Store::new(config)?;
        self.register(store.clone())?;
        Ok(store)
    }

    /// Register an existing store under its name.
    pub fn register(&self, store: Store) -> Result<()> {
        let mut stores = self.stores.write();
        if stores.contains_key(store.name()) {
            return Err(StoreError::StoreExists(store.name().to_string()));
        }
        tracing::debug!(store = %store.name(), "store registered");
        stores.insert(store.name().to_string(), store);
        Ok(())
    }

    /// Look up a store by name.
    pub fn get(&self, name: &str) -> Result<Store> {
        self.stores
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::StoreNotFound(name.to_string()))
    }

    /// Remove and return a store.
    pub fn remove(&self, name: &str) -> Option<Store> {
        self.stores.write().remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.read().contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.stores.read().keys().cloned().collect()
    }
}
