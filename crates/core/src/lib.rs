//! Core contract for gridstore
//!
//! This crate defines everything the backend adapters share:
//! - [`MapStore`]: the persistence contract the host engine calls into
//! - [`ObjectCodec`]: value <-> bytes conversion
//! - [`KeyEncoder`]: key <-> bytes and key <-> canonical document id
//! - [`NamespaceConfig`] / [`StoreConfig`]: per-namespace options
//! - [`PeriodicTask`]: background flush/refresh scheduling
//! - [`Error`]: the error taxonomy shared by every backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod host;
pub mod key;
pub mod schedule;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::ObjectCodec;
pub use config::{BackendKind, NamespaceConfig, StoreConfig};
pub use error::{Error, Result};
pub use host::{HostContext, StaticHost};
pub use key::KeyEncoder;
pub use schedule::{PeriodicTask, StopSignal};
pub use store::MapStore;
pub use types::{LoadedKeys, Record, StoreKey, StoreValue};
