//! Embedded backends for gridstore
//!
//! This crate provides the adapters that persist to local disk:
//! - [`OrderedStore`]: one ordered LSM keyspace per namespace
//! - [`TableStore`]: one table per namespace in a shared
//!   [`TransactionalEnvironment`], with deferred or immediate durability
//! - [`NoopStore`]: persists nothing
//!
//! Both disk-backed stores implement [`gridstore_core::MapStore`] and are
//! safe to share across threads.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod durability;
pub mod noop;
pub mod ordered;
pub mod transactional;

pub use durability::WriteDurability;
pub use noop::NoopStore;
pub use ordered::OrderedStore;
pub use transactional::{TableStore, TransactionalEnvironment};
