//! Per-namespace configuration
//!
//! Options can come from a TOML file:
//!
//! ```toml
//! data_dir = "/var/lib/grid/db"
//!
//! [defaults]
//! backend = "ordered"
//!
//! [namespaces.sessions]
//! backend = "document_cluster"
//! endpoints = ["http://solr1:8983/solr", "http://solr2:8983/solr"]
//! collection = "sessions"
//! load_all_at_startup = true
//! ```
//!
//! Namespace tables are merged field by field over `[defaults]`. Options can
//! also be read from the host's string property bag with
//! [`NamespaceConfig::from_properties`].

use crate::codec::ObjectCodec;
use crate::error::{Error, Result};
use crate::types::LoadedKeys;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Namespaces with this prefix are ephemeral caches even without the flag.
pub const EPHEMERAL_NAMESPACE_PREFIX: &str = "hz_memcache_";

const DEFAULT_TIMEOUT_MS: u64 = 60_000;
const DEFAULT_SYNC_INTERVAL_MS: u64 = 3_000;

/// Backend technology for a namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Embedded ordered log-structured KV store, one directory per namespace
    #[default]
    Ordered,
    /// Embedded transactional table store, one table per namespace
    Transactional,
    /// Remote document cluster
    DocumentCluster,
    /// Passthrough: loads are absent, writes are discarded
    Noop,
}

impl BackendKind {
    /// Parse a backend name as used in property bags.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "ordered" | "leveldb" => Ok(BackendKind::Ordered),
            "transactional" | "berkeleydb" => Ok(BackendKind::Transactional),
            "document_cluster" | "solr" => Ok(BackendKind::DocumentCluster),
            "noop" | "none" => Ok(BackendKind::Noop),
            other => Err(Error::Configuration(format!("unknown backend '{}'", other))),
        }
    }

    /// Whether startup pre-load runs when not configured explicitly.
    ///
    /// Embedded stores are local and cheap to scan; a cluster scan is not.
    pub fn preloads_by_default(&self) -> bool {
        matches!(self, BackendKind::Ordered | BackendKind::Transactional)
    }
}

/// Options for one namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceConfig {
    /// Backend technology
    pub backend: BackendKind,
    /// Seed endpoints of the document cluster
    pub endpoints: Vec<String>,
    /// Connect timeout for remote calls
    pub connect_timeout_ms: u64,
    /// Read timeout for remote calls
    pub read_timeout_ms: u64,
    /// Interval between deferred-write flushes; zero makes every write durable
    pub sync_interval_ms: u64,
    /// Delete the persisted entry when the host evicts it from memory
    pub delete_on_evict: bool,
    /// Enumerate keys at startup; `None` uses the backend default
    pub load_all_at_startup: Option<bool>,
    /// Cluster collection (core) name
    pub collection: Option<String>,
    /// Records expire after the fixed horizon
    pub ephemeral: bool,
    /// Serialization format for keys and values
    pub codec: ObjectCodec,
    /// Return the "not configured" sentinel rather than an empty key set
    /// when pre-load is disabled
    pub not_configured_sentinel: bool,
}

impl Default for NamespaceConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            endpoints: Vec::new(),
            connect_timeout_ms: DEFAULT_TIMEOUT_MS,
            read_timeout_ms: DEFAULT_TIMEOUT_MS,
            sync_interval_ms: DEFAULT_SYNC_INTERVAL_MS,
            delete_on_evict: false,
            load_all_at_startup: None,
            collection: None,
            ephemeral: false,
            codec: ObjectCodec::default(),
            not_configured_sentinel: true,
        }
    }
}

impl NamespaceConfig {
    /// Default options for `backend`.
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Set the cluster endpoints.
    #[must_use]
    pub fn with_endpoints<I, S>(mut self, endpoints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.endpoints = endpoints.into_iter().map(Into::into).collect();
        self
    }

    /// Enable or disable startup pre-load.
    #[must_use]
    pub fn with_load_all(mut self, enabled: bool) -> Self {
        self.load_all_at_startup = Some(enabled);
        self
    }

    /// Enable or disable delete-on-evict.
    #[must_use]
    pub fn with_delete_on_evict(mut self, enabled: bool) -> Self {
        self.delete_on_evict = enabled;
        self
    }

    /// Connect timeout
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Read timeout
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Deferred-write flush interval
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.sync_interval_ms)
    }

    /// Whether `load_all_keys` should enumerate.
    pub fn preload_enabled(&self) -> bool {
        self.load_all_at_startup
            .unwrap_or_else(|| self.backend.preloads_by_default())
    }

    /// Result of `load_all_keys` when pre-load is disabled.
    pub fn disabled_preload<K: Eq + Hash>(&self) -> LoadedKeys<K> {
        if self.not_configured_sentinel {
            LoadedKeys::NotConfigured
        } else {
            LoadedKeys::Keys(HashSet::new())
        }
    }

    /// Whether records of `namespace` expire.
    pub fn is_ephemeral(&self, namespace: &str) -> bool {
        self.ephemeral || namespace.starts_with(EPHEMERAL_NAMESPACE_PREFIX)
    }

    /// Check options required by the backend.
    pub fn validate(&self, namespace: &str) -> Result<()> {
        if self.backend == BackendKind::DocumentCluster && self.endpoints.is_empty() {
            return Err(Error::Configuration(format!(
                "namespace '{}': document cluster needs at least one endpoint",
                namespace
            )));
        }
        Ok(())
    }

    /// Build options from the host's property bag.
    ///
    /// Timeouts and intervals are given in seconds. Unknown keys are ignored.
    pub fn from_properties(props: &HashMap<String, String>) -> Result<Self> {
        let mut config = Self::default();
        for (name, raw) in props {
            let value = raw.trim();
            match name.as_str() {
                "backend" => config.backend = BackendKind::parse(value)?,
                "endpoints" | "servers" => {
                    config.endpoints = value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                "connectTimeout" => config.connect_timeout_ms = parse_secs(name, value)?,
                "readTimeout" => config.read_timeout_ms = parse_secs(name, value)?,
                "syncInterval" | "flushInterval" => {
                    config.sync_interval_ms = parse_secs(name, value)?
                }
                "deleteOnEvict" => config.delete_on_evict = parse_bool(name, value)?,
                "loadAll" | "loadAllAtStartup" => {
                    config.load_all_at_startup = Some(parse_bool(name, value)?)
                }
                "collection" | "core" => config.collection = Some(value.to_string()),
                "ephemeral" => config.ephemeral = parse_bool(name, value)?,
                "codec" => config.codec = ObjectCodec::parse(value)?,
                "notConfiguredSentinel" => {
                    config.not_configured_sentinel = parse_bool(name, value)?
                }
                _ => {}
            }
        }
        Ok(config)
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64> {
    let secs = value
        .parse::<u64>()
        .map_err(|_| Error::Configuration(format!("property '{}' is not a number: {}", name, value)))?;
    secs.checked_mul(1000).ok_or_else(|| {
        Error::Configuration(format!("property '{}' is out of range: {}", name, value))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    value
        .to_ascii_lowercase()
        .parse::<bool>()
        .map_err(|_| Error::Configuration(format!("property '{}' is not a boolean: {}", name, value)))
}

/// Process-wide configuration: data root plus per-namespace options.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    /// Root directory of the embedded backends
    pub data_dir: PathBuf,
    /// Options for namespaces without an explicit entry
    pub defaults: NamespaceConfig,
    /// Resolved options per namespace
    pub namespaces: HashMap<String, NamespaceConfig>,
}

impl StoreConfig {
    /// Configuration rooted at `data_dir` with default options everywhere.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            defaults: NamespaceConfig::default(),
            namespaces: HashMap::new(),
        }
    }

    /// Replace the default options.
    #[must_use]
    pub fn with_defaults(mut self, defaults: NamespaceConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Set the options of one namespace.
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>, config: NamespaceConfig) -> Self {
        self.namespaces.insert(namespace.into(), config);
        self
    }

    /// Effective options for `namespace`.
    pub fn namespace(&self, namespace: &str) -> NamespaceConfig {
        self.namespaces
            .get(namespace)
            .cloned()
            .unwrap_or_else(|| self.defaults.clone())
    }

    /// Parse a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut root: toml::Table = toml::from_str(text)
            .map_err(|e| Error::Configuration(format!("invalid config: {}", e)))?;

        let data_dir = match root.remove("data_dir") {
            Some(toml::Value::String(dir)) => PathBuf::from(dir),
            Some(other) => {
                return Err(Error::Configuration(format!(
                    "data_dir must be a string, got {}",
                    other.type_str()
                )))
            }
            None => PathBuf::from("db"),
        };

        let default_table = match root.remove("defaults") {
            Some(toml::Value::Table(table)) => table,
            Some(_) => return Err(Error::Configuration("[defaults] must be a table".into())),
            None => toml::Table::new(),
        };
        let defaults = decode_namespace("defaults", default_table.clone())?;

        let mut namespaces = HashMap::new();
        if let Some(section) = root.remove("namespaces") {
            let toml::Value::Table(section) = section else {
                return Err(Error::Configuration("[namespaces] must be a table".into()));
            };
            for (name, value) in section {
                let toml::Value::Table(overrides) = value else {
                    return Err(Error::Configuration(format!(
                        "[namespaces.{}] must be a table",
                        name
                    )));
                };
                let mut merged = default_table.clone();
                merged.extend(overrides);
                let config = decode_namespace(&name, merged)?;
                namespaces.insert(name, config);
            }
        }

        Ok(Self {
            data_dir,
            defaults,
            namespaces,
        })
    }

    /// Read and parse a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}

fn decode_namespace(name: &str, table: toml::Table) -> Result<NamespaceConfig> {
    toml::Value::Table(table)
        .try_into()
        .map_err(|e| Error::Configuration(format!("namespace '{}': {}", name, e)))
}
