//! Ordered embedded store
//!
//! One LSM keyspace per namespace, stored under
//! `<root>/ordered/<sha256(namespace)>` so arbitrary namespace names map to
//! safe directory names. Keys and values are the namespace codec's byte form.
//!
//! Engine tuning follows the sizes the host has historically used:
//!
//! | Setting | Value |
//! |---------|-------|
//! | write buffer | 256 MiB |
//! | block size | 256 KiB |
//! | block cache | 100 MiB |
//! | compression | LZ4 |
//!
//! A directory can be open at most once per process. Opening it twice is a
//! configuration error, so two namespaces hashing to the same path (or a
//! namespace opened twice) never share a live keyspace.

use fjall::{CompressionType, Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use gridstore_core::{
    Error, KeyEncoder, LoadedKeys, MapStore, NamespaceConfig, ObjectCodec, Result, StoreKey,
    StoreValue,
};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Memtable size before a flush to disk
pub const WRITE_BUFFER_SIZE: u64 = 256 * 1024 * 1024;
/// On-disk block size
pub const BLOCK_SIZE: u32 = 256 * 1024;
/// Block cache capacity
pub const BLOCK_CACHE_SIZE: u64 = 100 * 1024 * 1024;
/// Subdirectory of the data root holding ordered keyspaces
pub const ORDERED_DIR: &str = "ordered";

const RECORDS_PARTITION: &str = "records";

static OPEN_PATHS: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Directory holding the keyspace for `namespace`.
pub fn namespace_dir(root: &Path, namespace: &str) -> PathBuf {
    let digest = Sha256::digest(namespace.as_bytes());
    root.join(ORDERED_DIR).join(format!("{:x}", digest))
}

struct Handle {
    keyspace: Keyspace,
    records: PartitionHandle,
}

/// [`MapStore`] backed by an embedded ordered key-value engine.
pub struct OrderedStore<K, V> {
    namespace: String,
    path: PathBuf,
    config: NamespaceConfig,
    encoder: KeyEncoder,
    codec: ObjectCodec,
    handle: RwLock<Option<Handle>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> OrderedStore<K, V> {
    /// Open (or create) the keyspace for `namespace` under `root`.
    pub fn open(root: impl AsRef<Path>, namespace: &str, config: NamespaceConfig) -> Result<Self> {
        let path = namespace_dir(root.as_ref(), namespace);

        if !OPEN_PATHS.lock().insert(path.clone()) {
            return Err(Error::Configuration(format!(
                "ordered store directory {} is already open in this process",
                path.display()
            )));
        }

        let handle = match open_handle(&path) {
            Ok(handle) => handle,
            Err(e) => {
                OPEN_PATHS.lock().remove(&path);
                tracing::error!(namespace, path = %path.display(), error = %e, "failed to open ordered store");
                return Err(e);
            }
        };

        info!(namespace, path = %path.display(), "ordered store opened");
        Ok(Self {
            namespace: namespace.to_string(),
            path,
            encoder: KeyEncoder::new(config.codec),
            codec: config.codec,
            config,
            handle: RwLock::new(Some(handle)),
            _marker: PhantomData,
        })
    }

    /// Directory of this keyspace
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check if the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.handle.read().is_none()
    }

    fn close(&self) {
        let Some(handle) = self.handle.write().take() else {
            return;
        };
        if let Err(e) = handle.keyspace.persist(PersistMode::SyncAll) {
            warn!(namespace = %self.namespace, error = %e, "final sync of ordered store failed");
        }
        drop(handle);
        OPEN_PATHS.lock().remove(&self.path);
        info!(namespace = %self.namespace, "ordered store closed");
    }

    fn closed(&self) -> Error {
        Error::Closed(self.namespace.clone())
    }
}

fn open_handle(path: &Path) -> Result<Handle> {
    std::fs::create_dir_all(path)?;
    let keyspace = Config::new(path)
        .max_write_buffer_size(WRITE_BUFFER_SIZE)
        .cache_size(BLOCK_CACHE_SIZE)
        .open()
        .map_err(Error::storage)?;
    let records = keyspace
        .open_partition(
            RECORDS_PARTITION,
            PartitionCreateOptions::default()
                .block_size(BLOCK_SIZE)
                .compression(CompressionType::Lz4),
        )
        .map_err(Error::storage)?;
    Ok(Handle { keyspace, records })
}

impl<K: StoreKey, V: StoreValue> MapStore<K, V> for OrderedStore<K, V> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self, key: &K) -> Result<Option<V>> {
        let key_bytes = self.encoder.to_bytes(key)?;
        let guard = self.handle.read();
        let handle = guard.as_ref().ok_or_else(|| self.closed())?;

        let Some(raw) = handle.records.get(&key_bytes).map_err(Error::storage)? else {
            return Ok(None);
        };
        match self.codec.decode::<V>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "undecodable value treated as miss");
                Ok(None)
            }
        }
    }

    fn load_all_keys(&self) -> Result<LoadedKeys<K>> {
        if !self.config.preload_enabled() {
            return Ok(self.config.disabled_preload());
        }

        let guard = self.handle.read();
        let handle = guard.as_ref().ok_or_else(|| self.closed())?;

        let mut keys = HashSet::new();
        for item in handle.records.iter() {
            let (raw_key, _) = item.map_err(Error::storage)?;
            match self.encoder.from_bytes::<K>(&raw_key) {
                Ok(key) => {
                    keys.insert(key);
                }
                Err(e) => {
                    warn!(namespace = %self.namespace, error = %e, "skipping undecodable key");
                }
            }
        }
        debug!(namespace = %self.namespace, count = keys.len(), "enumerated ordered store keys");
        Ok(LoadedKeys::Keys(keys))
    }

    fn store(&self, key: &K, value: &V) -> Result<()> {
        let key_bytes = self.encoder.to_bytes(key)?;
        let value_bytes = self.codec.encode(value)?;
        let guard = self.handle.read();
        let handle = guard.as_ref().ok_or_else(|| self.closed())?;
        handle
            .records
            .insert(key_bytes, value_bytes)
            .map_err(Error::storage)
    }

    fn delete(&self, key: &K) -> Result<()> {
        let key_bytes = self.encoder.to_bytes(key)?;
        let guard = self.handle.read();
        let handle = guard.as_ref().ok_or_else(|| self.closed())?;
        handle.records.remove(key_bytes).map_err(Error::storage)
    }

    fn destroy(&self) {
        self.close();
    }
}

impl<K, V> Drop for OrderedStore<K, V> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<K, V> std::fmt::Debug for OrderedStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderedStore")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridstore_core::BackendKind;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Order {
        sku: String,
        quantity: u32,
    }

    fn config() -> NamespaceConfig {
        NamespaceConfig::for_backend(BackendKind::Ordered)
    }

    fn open(dir: &TempDir, ns: &str) -> OrderedStore<String, Order> {
        OrderedStore::open(dir.path(), ns, config()).unwrap()
    }

    fn order(sku: &str, quantity: u32) -> Order {
        Order {
            sku: sku.to_string(),
            quantity,
        }
    }

    // ========================================================================
    // Point operations
    // ========================================================================

    #[test]
    fn test_store_then_load() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "orders");
        store.store(&"o-1".to_string(), &order("widget", 3)).unwrap();
        assert_eq!(store.load(&"o-1".to_string()).unwrap(), Some(order("widget", 3)));
        assert_eq!(store.load(&"o-2".to_string()).unwrap(), None);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "orders");
        store.store(&"o-1".to_string(), &order("widget", 3)).unwrap();
        store.store(&"o-1".to_string(), &order("gadget", 1)).unwrap();
        assert_eq!(store.load(&"o-1".to_string()).unwrap(), Some(order("gadget", 1)));
    }

    #[test]
    fn test_delete_removes_and_tolerates_absent() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "orders");
        store.store(&"o-1".to_string(), &order("widget", 3)).unwrap();
        store.delete(&"o-1".to_string()).unwrap();
        store.delete(&"never-stored".to_string()).unwrap();
        assert_eq!(store.load(&"o-1".to_string()).unwrap(), None);
    }

    #[test]
    fn test_batches() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "orders");
        let entries: HashMap<String, Order> = (0..5)
            .map(|i| (format!("o-{i}"), order("widget", i)))
            .collect();
        store.store_all(&entries).unwrap();

        let keys: Vec<String> = vec!["o-1".into(), "o-3".into(), "missing".into()];
        let loaded = store.load_all(&keys).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["o-3"], order("widget", 3));

        store.delete_all(&keys).unwrap();
        assert_eq!(store.load(&"o-1".to_string()).unwrap(), None);
        assert_eq!(store.load(&"o-0".to_string()).unwrap(), Some(order("widget", 0)));
    }

    #[test]
    fn test_undecodable_value_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let raw: OrderedStore<String, String> = OrderedStore::open(dir.path(), "mixed", config()).unwrap();
        raw.store(&"k".to_string(), &"not an order".to_string()).unwrap();
        raw.destroy();

        let typed: OrderedStore<String, Order> = OrderedStore::open(dir.path(), "mixed", config()).unwrap();
        assert_eq!(typed.load(&"k".to_string()).unwrap(), None);
    }

    // ========================================================================
    // Key enumeration
    // ========================================================================

    #[test]
    fn test_load_all_keys_returns_exact_set() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "orders");
        for i in 0..20 {
            store.store(&format!("o-{i}"), &order("widget", i)).unwrap();
        }
        store.delete(&"o-7".to_string()).unwrap();

        let keys = store.load_all_keys().unwrap().into_keys().unwrap();
        assert_eq!(keys.len(), 19);
        assert!(!keys.contains("o-7"));
        assert!(keys.contains("o-19"));
    }

    #[test]
    fn test_load_all_keys_disabled_returns_sentinel() {
        let dir = TempDir::new().unwrap();
        let store: OrderedStore<String, Order> =
            OrderedStore::open(dir.path(), "orders", config().with_load_all(false)).unwrap();
        store.store(&"o-1".to_string(), &order("widget", 1)).unwrap();
        assert!(store.load_all_keys().unwrap().is_not_configured());
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[test]
    fn test_data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = open(&dir, "orders");
            store.store(&"o-1".to_string(), &order("widget", 3)).unwrap();
            store.destroy();
        }
        let store = open(&dir, "orders");
        assert_eq!(store.load(&"o-1".to_string()).unwrap(), Some(order("widget", 3)));
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let dir = TempDir::new().unwrap();
        let a = open(&dir, "a");
        let b = open(&dir, "b");
        a.store(&"k".to_string(), &order("in-a", 1)).unwrap();
        assert_eq!(b.load(&"k".to_string()).unwrap(), None);
        assert_ne!(a.path(), b.path());
    }

    #[test]
    fn test_double_open_rejected() {
        let dir = TempDir::new().unwrap();
        let _first = open(&dir, "orders");
        let second: Result<OrderedStore<String, Order>> =
            OrderedStore::open(dir.path(), "orders", config());
        assert!(second.unwrap_err().is_configuration());
    }

    #[test]
    fn test_destroy_releases_path_and_closes() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir, "orders");
        store.destroy();
        store.destroy();
        assert!(store.is_closed());
        assert!(matches!(
            store.load(&"o-1".to_string()),
            Err(Error::Closed(_))
        ));
        let _reopened = open(&dir, "orders");
    }

    #[test]
    fn test_namespace_dir_is_stable_hex() {
        let root = Path::new("/data");
        let dir = namespace_dir(root, "orders");
        assert_eq!(dir, namespace_dir(root, "orders"));
        let name = dir.file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), 64);
        assert!(name.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(dir.starts_with("/data/ordered"));
    }
}
