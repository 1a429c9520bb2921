//! Persistence Layer Integration Tests
//!
//! End-to-end behaviour of `PersistenceLayer` over every backend.

mod common;

mod backends;
mod cluster;
mod configuration;
mod lifecycle;
