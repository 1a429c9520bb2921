//! Store that persists nothing
//!
//! Used for namespaces configured without a backend: every load is a miss,
//! every write succeeds and is discarded.

use gridstore_core::{LoadedKeys, MapStore, Result, StoreKey, StoreValue};
use std::marker::PhantomData;

/// [`MapStore`] that discards writes and never finds anything.
#[derive(Debug)]
pub struct NoopStore<K, V> {
    namespace: String,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> NoopStore<K, V> {
    /// Create a no-op store for `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            _marker: PhantomData,
        }
    }
}

impl<K: StoreKey, V: StoreValue> MapStore<K, V> for NoopStore<K, V> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self, _key: &K) -> Result<Option<V>> {
        Ok(None)
    }

    fn load_all_keys(&self) -> Result<LoadedKeys<K>> {
        Ok(LoadedKeys::NotConfigured)
    }

    fn store(&self, _key: &K, _value: &V) -> Result<()> {
        Ok(())
    }

    fn delete(&self, _key: &K) -> Result<()> {
        Ok(())
    }

    fn destroy(&self) {}
}
