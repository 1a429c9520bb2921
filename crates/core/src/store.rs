//! The persistence contract
//!
//! The host engine owns one [`MapStore`] per namespace and calls it on
//! cache miss (read-through), on mutation (write-through) and at startup
//! (pre-load). Implementations must be safe under concurrent invocation
//! from the host's worker threads.
//!
//! ## Failure policy
//!
//! - Reads favour availability: an undecodable payload is a miss.
//! - Writes favour correctness: every failure is returned, never dropped.
//! - Batches are loops of independent point operations. A failure stops the
//!   loop and is returned; earlier writes are not rolled back.

use crate::error::Result;
use crate::types::{LoadedKeys, StoreKey, StoreValue};
use std::collections::HashMap;

/// Persistence contract implemented by every backend adapter.
pub trait MapStore<K: StoreKey, V: StoreValue>: Send + Sync {
    /// Namespace this store persists
    fn namespace(&self) -> &str;

    /// Load one value, `None` when absent.
    fn load(&self, key: &K) -> Result<Option<V>>;

    /// Load several values. Absent keys are omitted from the result.
    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.load(key)? {
                found.insert(key.clone(), value);
            }
        }
        Ok(found)
    }

    /// Enumerate every stored key, or the "not configured" sentinel.
    fn load_all_keys(&self) -> Result<LoadedKeys<K>>;

    /// Persist one entry.
    fn store(&self, key: &K, value: &V) -> Result<()>;

    /// Persist several entries.
    fn store_all(&self, entries: &HashMap<K, V>) -> Result<()> {
        for (key, value) in entries {
            self.store(key, value)?;
        }
        Ok(())
    }

    /// Remove one entry. Removing an absent key is not an error.
    fn delete(&self, key: &K) -> Result<()>;

    /// Remove several entries.
    fn delete_all(&self, keys: &[K]) -> Result<()> {
        for key in keys {
            self.delete(key)?;
        }
        Ok(())
    }

    /// Flush and release resources. Failures are logged, never returned.
    fn destroy(&self);
}
