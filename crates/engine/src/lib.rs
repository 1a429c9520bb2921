//! Adapter lifecycle for gridstore
//!
//! | Component | Role |
//! |-----------|------|
//! | [`AdapterFactory`] | builds the adapter of one namespace from its config |
//! | [`AdapterRegistry`] | one adapter per namespace, built on first use |
//! | [`EvictionBridge`] | turns evictions into deletes where configured |
//! | [`Preloader`] | batched startup pre-load honoring the sentinel |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod eviction;
pub mod factory;
pub mod preload;
pub mod registry;

pub use eviction::EvictionBridge;
pub use factory::{
    AdapterFactory, ConfiguredFactory, DocumentClusterFactory, NoopFactory, OrderedFactory,
    TransactionalFactory,
};
pub use preload::{PreloadReport, Preloader, DEFAULT_BATCH_SIZE};
pub use registry::AdapterRegistry;
