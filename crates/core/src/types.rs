//! Shared data types
//!
//! - [`StoreKey`] / [`StoreValue`]: bounds every persisted key and value meets
//! - [`LoadedKeys`]: result of startup key enumeration
//! - [`Record`]: a stored entry together with its creation time

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashSet;
use std::hash::Hash;

/// Bounds for a persisted key.
///
/// Equality and hashing follow the key type's own implementations; the
/// byte and id encodings only need to round-trip.
pub trait StoreKey: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync + 'static {}

impl<T> StoreKey for T where T: Serialize + DeserializeOwned + Eq + Hash + Clone + Send + Sync + 'static {}

/// Bounds for a persisted value.
pub trait StoreValue: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StoreValue for T where T: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Outcome of [`MapStore::load_all_keys`](crate::MapStore::load_all_keys).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadedKeys<K: Eq + Hash> {
    /// Every key currently stored
    Keys(HashSet<K>),
    /// Pre-load is not configured for this namespace; the host must skip it
    NotConfigured,
}

impl<K: Eq + Hash> LoadedKeys<K> {
    /// Check for the "not configured" sentinel.
    pub fn is_not_configured(&self) -> bool {
        matches!(self, LoadedKeys::NotConfigured)
    }

    /// Number of keys (zero for the sentinel).
    pub fn len(&self) -> usize {
        match self {
            LoadedKeys::Keys(keys) => keys.len(),
            LoadedKeys::NotConfigured => 0,
        }
    }

    /// Check if no keys were returned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the key set, `None` for the sentinel.
    pub fn into_keys(self) -> Option<HashSet<K>> {
        match self {
            LoadedKeys::Keys(keys) => Some(keys),
            LoadedKeys::NotConfigured => None,
        }
    }
}

/// A stored entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Record<K, V> {
    /// Namespace the entry belongs to
    pub namespace: String,
    /// Entry key
    pub key: K,
    /// Entry value
    pub value: V,
    /// Creation time, only tracked where expiry applies
    pub created_at: Option<DateTime<Utc>>,
}

impl<K, V> Record<K, V> {
    /// Check whether the record is at least `horizon` old at `now`.
    ///
    /// Records without a creation time never expire.
    pub fn is_expired(&self, now: DateTime<Utc>, horizon: chrono::Duration) -> bool {
        match self.created_at {
            Some(created) => now >= created + horizon,
            None => false,
        }
    }
}
