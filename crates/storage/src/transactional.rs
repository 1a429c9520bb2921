//! Transactional embedded store
//!
//! All namespaces share one [`TransactionalEnvironment`]: a single database
//! file in which each namespace owns a named table. The environment is opened
//! lazily by the first table and closed when the last table is released.
//!
//! Writes run in their own write transaction. Under
//! [`WriteDurability::Deferred`] commits skip the fsync and a background
//! flush task makes them durable on a fixed interval; under
//! [`WriteDurability::Immediate`] every commit syncs.
//!
//! # Environment lifecycle
//!
//! ```text
//! open(ns)    -> acquire: open database if needed, register table
//! destroy(ns) -> stop flusher, durable sync, release table
//! last release -> compact; durable checkpoint if anything was reclaimed; close
//! ```

use crate::durability::WriteDurability;
use gridstore_core::{
    Error, KeyEncoder, LoadedKeys, MapStore, NamespaceConfig, ObjectCodec, PeriodicTask, Result,
    StoreKey, StoreValue,
};
use parking_lot::{Mutex, RwLock};
use redb::{Database, Durability, ReadableTable, TableDefinition, TableError};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// File name of the shared database inside the environment directory
pub const ENVIRONMENT_FILE: &str = "tables.redb";
/// Subdirectory of the data root holding the environment
pub const ENVIRONMENT_DIR: &str = "environment";
/// Page cache of the shared database
pub const ENVIRONMENT_CACHE_SIZE: usize = 100 * 1024 * 1024;

type Bytes = &'static [u8];

fn table_definition(name: &str) -> TableDefinition<'_, Bytes, Bytes> {
    TableDefinition::new(name)
}

/// Commit an empty transaction with full durability, syncing every earlier
/// non-durable commit.
fn durable_checkpoint(db: &Database) -> Result<()> {
    let mut txn = db.begin_write().map_err(Error::storage)?;
    txn.set_durability(Durability::Immediate);
    txn.commit().map_err(Error::storage)
}

/// Run `checkpoint` every `interval`. A failed tick is logged; later ticks
/// still run.
fn start_flusher<F>(namespace: &str, interval: Duration, mut checkpoint: F) -> Result<PeriodicTask>
where
    F: FnMut() -> Result<()> + Send + 'static,
{
    let flush_ns = namespace.to_string();
    let task = PeriodicTask::start(
        format!("gridstore-flush-{namespace}"),
        interval,
        interval,
        move || {
            if let Err(e) = checkpoint() {
                warn!(namespace = %flush_ns, error = %e, "background flush failed");
            }
        },
    )?;
    Ok(task)
}

struct EnvState {
    db: Arc<Database>,
    tables: HashSet<String>,
}

/// Process-wide database shared by every transactional table.
pub struct TransactionalEnvironment {
    dir: PathBuf,
    cache_size: usize,
    state: Mutex<Option<EnvState>>,
}

impl TransactionalEnvironment {
    /// Environment rooted at `<data_root>/environment`.
    pub fn new(data_root: impl AsRef<Path>) -> Self {
        Self::with_cache_size(data_root, ENVIRONMENT_CACHE_SIZE)
    }

    /// Environment with an explicit page cache size.
    pub fn with_cache_size(data_root: impl AsRef<Path>, cache_size: usize) -> Self {
        Self {
            dir: data_root.as_ref().join(ENVIRONMENT_DIR),
            cache_size,
            state: Mutex::new(None),
        }
    }

    /// Path of the database file.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(ENVIRONMENT_FILE)
    }

    /// Check if the database is currently open.
    pub fn is_open(&self) -> bool {
        self.state.lock().is_some()
    }

    /// Names of the tables currently registered.
    pub fn open_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .state
            .lock()
            .as_ref()
            .map(|env| env.tables.iter().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn open_state(&self) -> Result<EnvState> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.file_path();
        let db = Database::builder()
            .set_cache_size(self.cache_size)
            .create(&path)
            .map_err(|e| {
                tracing::error!(path = %path.display(), error = %e, "failed to open transactional environment");
                Error::storage(e)
            })?;
        info!(path = %path.display(), "transactional environment opened");
        Ok(EnvState {
            db: Arc::new(db),
            tables: HashSet::new(),
        })
    }

    fn acquire(&self, namespace: &str) -> Result<Arc<Database>> {
        let mut guard = self.state.lock();
        let mut env = match guard.take() {
            Some(env) => env,
            None => self.open_state()?,
        };
        let registered = env.tables.insert(namespace.to_string());
        let db = Arc::clone(&env.db);
        *guard = Some(env);

        if !registered {
            return Err(Error::Configuration(format!(
                "table '{namespace}' is already open in the transactional environment"
            )));
        }
        Ok(db)
    }

    fn release(&self, namespace: &str, db: Arc<Database>) {
        drop(db);
        let mut guard = self.state.lock();
        let Some(env) = guard.as_mut() else {
            return;
        };
        env.tables.remove(namespace);
        if !env.tables.is_empty() {
            return;
        }
        if let Some(env) = guard.take() {
            Self::close_database(env.db);
        }
    }

    fn close_database(db: Arc<Database>) {
        let mut db = match Arc::try_unwrap(db) {
            Ok(db) => db,
            Err(_) => {
                warn!("transactional environment still referenced; closing without compaction");
                return;
            }
        };
        match db.compact() {
            Ok(true) => match durable_checkpoint(&db) {
                Ok(()) => info!("transactional environment compacted and checkpointed"),
                Err(e) => warn!(error = %e, "checkpoint after compaction failed"),
            },
            Ok(false) => debug!("transactional environment had nothing to compact"),
            Err(e) => warn!(error = %e, "transactional environment compaction failed"),
        }
        drop(db);
        info!("transactional environment closed");
    }
}

impl std::fmt::Debug for TransactionalEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionalEnvironment")
            .field("dir", &self.dir)
            .field("open_tables", &self.open_tables())
            .finish()
    }
}

/// [`MapStore`] backed by one table of the shared transactional environment.
pub struct TableStore<K, V> {
    namespace: String,
    config: NamespaceConfig,
    encoder: KeyEncoder,
    codec: ObjectCodec,
    durability: WriteDurability,
    env: Arc<TransactionalEnvironment>,
    db: RwLock<Option<Arc<Database>>>,
    flusher: Mutex<Option<PeriodicTask>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> TableStore<K, V> {
    /// Open the table for `namespace`, opening the environment if needed.
    pub fn open(
        env: Arc<TransactionalEnvironment>,
        namespace: &str,
        config: NamespaceConfig,
    ) -> Result<Self> {
        let db = env.acquire(namespace)?;
        let durability = WriteDurability::from_interval(config.sync_interval());

        let flusher = match Self::prepare(&db, namespace, durability) {
            Ok(flusher) => flusher,
            Err(e) => {
                env.release(namespace, db);
                return Err(e);
            }
        };

        info!(namespace, mode = durability.description(), "transactional table opened");
        Ok(Self {
            namespace: namespace.to_string(),
            encoder: KeyEncoder::new(config.codec),
            codec: config.codec,
            config,
            durability,
            env,
            db: RwLock::new(Some(db)),
            flusher: Mutex::new(flusher),
            _marker: PhantomData,
        })
    }

    fn prepare(
        db: &Arc<Database>,
        namespace: &str,
        durability: WriteDurability,
    ) -> Result<Option<PeriodicTask>> {
        let txn = db.begin_write().map_err(Error::storage)?;
        txn.open_table(table_definition(namespace))
            .map_err(Error::storage)?;
        txn.commit().map_err(Error::storage)?;

        let Some(interval) = durability.flush_interval() else {
            return Ok(None);
        };
        let flush_db = Arc::clone(db);
        let task = start_flusher(namespace, interval, move || durable_checkpoint(&flush_db))?;
        Ok(Some(task))
    }

    /// Durability mode in effect
    pub fn durability(&self) -> WriteDurability {
        self.durability
    }

    /// Make every committed write durable now.
    pub fn sync(&self) -> Result<()> {
        let db = self.database()?;
        durable_checkpoint(&db)
    }

    /// Check if the store has been closed.
    pub fn is_closed(&self) -> bool {
        self.db.read().is_none()
    }

    fn database(&self) -> Result<Arc<Database>> {
        self.db
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or_else(|| Error::Closed(self.namespace.clone()))
    }

    fn close(&self) {
        if let Some(task) = self.flusher.lock().take() {
            task.stop();
        }
        let Some(db) = self.db.write().take() else {
            return;
        };
        if let Err(e) = durable_checkpoint(&db) {
            warn!(namespace = %self.namespace, error = %e, "final sync of table failed");
        }
        self.env.release(&self.namespace, db);
        info!(namespace = %self.namespace, "transactional table closed");
    }

    fn write<F>(&self, apply: F) -> Result<()>
    where
        F: FnOnce(&mut redb::Table<'_, Bytes, Bytes>) -> std::result::Result<(), redb::StorageError>,
    {
        let db = self.database()?;
        let mut txn = db.begin_write().map_err(Error::storage)?;
        txn.set_durability(self.durability.commit_durability());
        {
            let mut table = txn
                .open_table(table_definition(&self.namespace))
                .map_err(Error::storage)?;
            apply(&mut table).map_err(Error::storage)?;
        }
        txn.commit().map_err(Error::storage)
    }
}

impl<K: StoreKey, V: StoreValue> TableStore<K, V> {
    fn decode_value(&self, raw: &[u8]) -> Option<V> {
        match self.codec.decode(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "undecodable value treated as miss");
                None
            }
        }
    }
}

impl<K: StoreKey, V: StoreValue> MapStore<K, V> for TableStore<K, V> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self, key: &K) -> Result<Option<V>> {
        let key_bytes = self.encoder.to_bytes(key)?;
        let db = self.database()?;
        let txn = db.begin_read().map_err(Error::storage)?;
        let table = match txn.open_table(table_definition(&self.namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(Error::storage(e)),
        };
        let found = table.get(key_bytes.as_slice()).map_err(Error::storage)?;
        Ok(found.and_then(|guard| self.decode_value(guard.value())))
    }

    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        let db = self.database()?;
        let txn = db.begin_read().map_err(Error::storage)?;
        let table = match txn.open_table(table_definition(&self.namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(HashMap::new()),
            Err(e) => return Err(Error::storage(e)),
        };

        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let key_bytes = self.encoder.to_bytes(key)?;
            if let Some(guard) = table.get(key_bytes.as_slice()).map_err(Error::storage)? {
                if let Some(value) = self.decode_value(guard.value()) {
                    found.insert(key.clone(), value);
                }
            }
        }
        Ok(found)
    }

    fn load_all_keys(&self) -> Result<LoadedKeys<K>> {
        if !self.config.preload_enabled() {
            return Ok(self.config.disabled_preload());
        }

        let db = self.database()?;
        let txn = db.begin_read().map_err(Error::storage)?;
        let table = match txn.open_table(table_definition(&self.namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(LoadedKeys::Keys(HashSet::new())),
            Err(e) => return Err(Error::storage(e)),
        };

        let mut keys = HashSet::new();
        for entry in table.iter().map_err(Error::storage)? {
            let (raw_key, _) = entry.map_err(Error::storage)?;
            match self.encoder.from_bytes::<K>(raw_key.value()) {
                Ok(key) => {
                    keys.insert(key);
                }
                Err(e) => {
                    warn!(namespace = %self.namespace, error = %e, "skipping undecodable key");
                }
            }
        }
        debug!(namespace = %self.namespace, count = keys.len(), "enumerated table keys");
        Ok(LoadedKeys::Keys(keys))
    }

    fn store(&self, key: &K, value: &V) -> Result<()> {
        let key_bytes = self.encoder.to_bytes(key)?;
        let value_bytes = self.codec.encode(value)?;
        self.write(|table| {
            table.insert(key_bytes.as_slice(), value_bytes.as_slice())?;
            Ok(())
        })
    }

    fn delete(&self, key: &K) -> Result<()> {
        let key_bytes = self.encoder.to_bytes(key)?;
        self.write(|table| {
            table.remove(key_bytes.as_slice())?;
            Ok(())
        })
    }

    fn destroy(&self) {
        self.close();
    }
}

impl<K, V> Drop for TableStore<K, V> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<K, V> std::fmt::Debug for TableStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TableStore")
            .field("namespace", &self.namespace)
            .field("durability", &self.durability)
            .field("closed", &self.is_closed())
            .finish()
    }
}
