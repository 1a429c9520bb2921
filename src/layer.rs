//! Process-lifecycle owner of the persistence layer.

use gridstore_core::{
    Error, HostContext, MapStore, NamespaceConfig, Result, StoreConfig, StoreKey, StoreValue,
};
use gridstore_engine::{
    AdapterFactory, AdapterRegistry, ConfiguredFactory, EvictionBridge, PreloadReport, Preloader,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// The persistence layer of one host process.
///
/// Owns the adapter registry and the eviction bridge. Adapters are built
/// lazily on first use of their namespace and destroyed together by
/// [`PersistenceLayer::shutdown`], which also runs on drop.
///
/// # Example
///
/// ```ignore
/// use gridstore::prelude::*;
///
/// let config = StoreConfig::from_file("gridstore.toml")?;
/// let layer: PersistenceLayer<String, String> =
///     PersistenceLayer::open(config, Arc::new(StaticHost::single_node()))?;
///
/// let orders = layer.store("orders")?;
/// orders.store(&"o-1".to_string(), &"pending".to_string())?;
///
/// layer.shutdown();
/// ```
pub struct PersistenceLayer<K: StoreKey, V: StoreValue> {
    registry: Arc<AdapterRegistry<K, V>>,
    eviction: EvictionBridge<K, V>,
    preloader: Preloader,
    shut_down: AtomicBool,
}

impl<K: StoreKey, V: StoreValue> PersistenceLayer<K, V> {
    /// Open with the backend of each namespace chosen by `config`.
    ///
    /// Creates the data directory; no namespace is opened yet.
    pub fn open(config: StoreConfig, host: Arc<dyn HostContext>) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir).map_err(|e| {
            Error::Configuration(format!(
                "cannot create data directory {}: {e}",
                config.data_dir.display()
            ))
        })?;
        let factory = ConfiguredFactory::new(&config.data_dir, host);
        Ok(Self::with_factory(config, Arc::new(factory)))
    }

    /// Open from a TOML configuration file.
    pub fn open_file(path: impl AsRef<Path>, host: Arc<dyn HostContext>) -> Result<Self> {
        Self::open(StoreConfig::from_file(path)?, host)
    }

    /// Build adapters through a custom factory.
    pub fn with_factory(config: StoreConfig, factory: Arc<dyn AdapterFactory<K, V>>) -> Self {
        let registry = Arc::new(AdapterRegistry::new(config, factory));
        info!(data_dir = %registry.store_config().data_dir.display(), "persistence layer opened");
        Self {
            eviction: EvictionBridge::new(Arc::clone(&registry)),
            registry,
            preloader: Preloader::default(),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Use `preloader` for [`PersistenceLayer::preload`].
    #[must_use]
    pub fn with_preloader(mut self, preloader: Preloader) -> Self {
        self.preloader = preloader;
        self
    }

    /// Adapter of `namespace`, opened on first use.
    pub fn store(&self, namespace: &str) -> Result<Arc<dyn MapStore<K, V>>> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::Closed(namespace.to_string()));
        }
        self.registry.get_or_open(namespace)
    }

    /// Effective options of `namespace`.
    pub fn config(&self, namespace: &str) -> NamespaceConfig {
        self.registry.config(namespace)
    }

    /// Forward an eviction of `key` from `namespace`.
    ///
    /// Returns true if the entry was deleted from the backend.
    pub fn on_entry_evicted(&self, namespace: &str, key: &K) -> Result<bool> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(Error::Closed(namespace.to_string()));
        }
        self.eviction.on_entry_evicted(namespace, key)
    }

    /// Run the startup pre-load of `namespace` into `sink`.
    pub fn preload<F>(&self, namespace: &str, sink: F) -> Result<PreloadReport>
    where
        F: FnMut(HashMap<K, V>),
    {
        let store = self.store(namespace)?;
        self.preloader.run(store.as_ref(), sink)
    }

    /// Namespaces with an open adapter
    pub fn namespaces(&self) -> Vec<String> {
        self.registry.namespaces()
    }

    /// The adapter registry
    pub fn registry(&self) -> &Arc<AdapterRegistry<K, V>> {
        &self.registry
    }

    /// Destroy every adapter. Later calls return [`Error::Closed`].
    ///
    /// Returns the number of adapters destroyed; zero after the first call.
    pub fn shutdown(&self) -> usize {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return 0;
        }
        let closed = self.registry.shutdown();
        info!(adapters = closed, "persistence layer shut down");
        closed
    }

    /// Check if [`PersistenceLayer::shutdown`] has run.
    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }
}

impl<K: StoreKey, V: StoreValue> Drop for PersistenceLayer<K, V> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<K: StoreKey, V: StoreValue> std::fmt::Debug for PersistenceLayer<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceLayer")
            .field("registry", &self.registry)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}
