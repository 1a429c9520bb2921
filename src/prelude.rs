//! Convenient imports for gridstore.
//!
//! ```ignore
//! use gridstore::prelude::*;
//! ```

// Entry point
pub use crate::layer::PersistenceLayer;

// Contract
pub use gridstore_core::{LoadedKeys, MapStore, Record};

// Errors
pub use gridstore_core::{Error, Result};

// Configuration
pub use gridstore_core::{BackendKind, NamespaceConfig, ObjectCodec, StoreConfig};

// Host integration
pub use gridstore_core::{HostContext, StaticHost};
pub use gridstore_engine::{PreloadReport, Preloader};

pub use std::sync::Arc;
