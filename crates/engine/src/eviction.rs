//! Eviction bridge
//!
//! The host evicts entries from memory on its own schedule. Namespaces
//! configured with `delete_on_evict` also drop the evicted entry from the
//! backend; every other namespace keeps it.

use crate::registry::AdapterRegistry;
use gridstore_core::{Result, StoreKey, StoreValue};
use std::sync::Arc;
use tracing::trace;

/// Forwards eviction notifications to the owning adapter.
pub struct EvictionBridge<K: StoreKey, V: StoreValue> {
    registry: Arc<AdapterRegistry<K, V>>,
}

impl<K: StoreKey, V: StoreValue> EvictionBridge<K, V> {
    /// Bridge resolving adapters through `registry`.
    pub fn new(registry: Arc<AdapterRegistry<K, V>>) -> Self {
        Self { registry }
    }

    /// Handle the eviction of `key` from `namespace`.
    ///
    /// Returns true if the entry was deleted from the backend.
    pub fn on_entry_evicted(&self, namespace: &str, key: &K) -> Result<bool> {
        if !self.registry.config(namespace).delete_on_evict {
            return Ok(false);
        }
        let store = self.registry.get_or_open(namespace)?;
        store.delete(key)?;
        trace!(namespace, "evicted entry deleted");
        Ok(true)
    }
}

impl<K: StoreKey, V: StoreValue> Clone for EvictionBridge<K, V> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}
