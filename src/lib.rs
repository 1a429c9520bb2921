//! # Gridstore
//!
//! Pluggable persistence for a distributed in-memory map/queue engine.
//!
//! The host engine keeps its data in memory and calls a [`MapStore`] per
//! namespace on cache miss, on every mutation and at startup. Gridstore
//! provides the adapters behind that contract:
//!
//! | Backend | Adapter | Storage |
//! |---------|---------|---------|
//! | `ordered` | [`storage::OrderedStore`] | one embedded LSM keyspace per namespace |
//! | `transactional` | [`storage::TableStore`] | one table per namespace in a shared environment |
//! | `document_cluster` | [`cluster::DocumentClusterStore`] | documents in a replicated search cluster |
//! | `noop` | [`storage::NoopStore`] | nothing |
//!
//! ## Quick Start
//!
//! ```ignore
//! use gridstore::prelude::*;
//!
//! let config = StoreConfig::from_toml_str(r#"
//!     data_dir = "/var/lib/grid"
//!
//!     [defaults]
//!     backend = "ordered"
//!
//!     [namespaces.sessions]
//!     backend = "document_cluster"
//!     endpoints = ["http://solr-1:8983/solr"]
//!     delete_on_evict = true
//! "#)?;
//!
//! let layer: PersistenceLayer<String, Vec<u8>> =
//!     PersistenceLayer::open(config, Arc::new(StaticHost::single_node()))?;
//!
//! layer.preload("orders", |batch| host_map.put_all(batch))?;
//! layer.store("orders")?.store(&"o-1".into(), &payload)?;
//! layer.on_entry_evicted("sessions", &"s-9".into())?;
//!
//! layer.shutdown();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod layer;

pub mod prelude;

pub use layer::PersistenceLayer;

pub use gridstore_core::{
    BackendKind, Error, HostContext, LoadedKeys, MapStore, NamespaceConfig, Result, StaticHost,
    StoreConfig, StoreKey, StoreValue,
};
pub use gridstore_engine::{AdapterFactory, PreloadReport, Preloader};

/// Embedded backends
pub use gridstore_storage as storage;
/// Document cluster backend
pub use gridstore_cluster as cluster;
/// Registry, factories, eviction and pre-load
pub use gridstore_engine as engine;
