//! Adapter registry
//!
//! Caches exactly one adapter per namespace for the life of the process.
//!
//! # Design
//!
//! - DashMap of namespace -> per-namespace `OnceCell`
//! - First use of a namespace constructs its adapter inside the cell;
//!   concurrent callers for the same namespace block on that cell only
//! - Callers for other namespaces are never blocked by a construction
//! - A failed construction leaves the cell empty, so a later call retries

use crate::factory::AdapterFactory;
use dashmap::DashMap;
use gridstore_core::{MapStore, NamespaceConfig, Result, StoreConfig, StoreKey, StoreValue};
use once_cell::sync::OnceCell;
use std::sync::Arc;
use tracing::{debug, info};

type Slot<K, V> = Arc<OnceCell<Arc<dyn MapStore<K, V>>>>;

/// Namespace -> adapter cache.
pub struct AdapterRegistry<K: StoreKey, V: StoreValue> {
    config: StoreConfig,
    factory: Arc<dyn AdapterFactory<K, V>>,
    adapters: DashMap<String, Slot<K, V>>,
}

impl<K: StoreKey, V: StoreValue> AdapterRegistry<K, V> {
    /// Registry resolving namespace options from `config`.
    pub fn new(config: StoreConfig, factory: Arc<dyn AdapterFactory<K, V>>) -> Self {
        Self {
            config,
            factory,
            adapters: DashMap::new(),
        }
    }

    /// Effective options of `namespace`.
    pub fn config(&self, namespace: &str) -> NamespaceConfig {
        self.config.namespace(namespace)
    }

    /// Store-wide configuration
    pub fn store_config(&self) -> &StoreConfig {
        &self.config
    }

    /// Adapter of `namespace`, constructing it on first use.
    pub fn get_or_open(&self, namespace: &str) -> Result<Arc<dyn MapStore<K, V>>> {
        // Clone the slot out so the shard lock is not held during construction
        let slot = self
            .adapters
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let adapter = slot.get_or_try_init(|| {
            let config = self.config(namespace);
            debug!(namespace, backend = ?config.backend, "constructing adapter");
            self.factory.create(namespace, &config).map_err(|e| {
                tracing::error!(namespace, error = %e, "adapter construction failed");
                e
            })
        })?;
        Ok(Arc::clone(adapter))
    }

    /// Adapter of `namespace` if it has been constructed.
    pub fn get(&self, namespace: &str) -> Option<Arc<dyn MapStore<K, V>>> {
        self.adapters
            .get(namespace)
            .and_then(|slot| slot.get().cloned())
    }

    /// Destroy and forget the adapter of `namespace`.
    ///
    /// Returns true if an adapter was destroyed.
    ///
    /// The slot stays registered until `destroy()` returns, so a concurrent
    /// `get_or_open` reuses the closing adapter instead of building a second
    /// one next to it.
    pub fn close(&self, namespace: &str) -> bool {
        let Some(slot) = self.adapters.get(namespace).map(|entry| Arc::clone(entry.value())) else {
            return false;
        };
        let destroyed = match slot.get() {
            Some(adapter) => {
                adapter.destroy();
                info!(namespace, "adapter closed");
                true
            }
            None => false,
        };
        self.adapters
            .remove_if(namespace, |_, registered| Arc::ptr_eq(registered, &slot));
        destroyed
    }

    /// Destroy every adapter. Returns how many were destroyed.
    pub fn shutdown(&self) -> usize {
        let namespaces: Vec<String> = self.adapters.iter().map(|e| e.key().clone()).collect();
        let closed = namespaces.iter().filter(|ns| self.close(ns)).count();
        if closed > 0 {
            info!(adapters = closed, "registry shut down");
        }
        closed
    }

    /// Namespaces with a constructed adapter, sorted.
    pub fn namespaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .adapters
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    /// Number of constructed adapters
    pub fn len(&self) -> usize {
        self.adapters
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    /// Check if no adapter has been constructed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: StoreKey, V: StoreValue> std::fmt::Debug for AdapterRegistry<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterRegistry")
            .field("data_dir", &self.config.data_dir)
            .field("namespaces", &self.namespaces())
            .finish()
    }
}
