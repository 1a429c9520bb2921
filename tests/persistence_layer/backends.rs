//! Contract behaviour shared by every backend

use crate::common::{key, order, Harness, Order, NODES};
use gridstore::{BackendKind, MapStore, NamespaceConfig};
use std::collections::HashMap;

fn config_for(backend: BackendKind) -> NamespaceConfig {
    NamespaceConfig::for_backend(backend)
        .with_endpoints(NODES)
        .with_load_all(true)
}

const PERSISTENT: [BackendKind; 3] = [
    BackendKind::Ordered,
    BackendKind::Transactional,
    BackendKind::DocumentCluster,
];

fn each_backend(test: impl Fn(&dyn MapStore<String, Order>)) {
    for backend in PERSISTENT {
        let harness = Harness::new();
        let layer = harness.open(harness.base_config().with_defaults(config_for(backend)));
        let store = layer.store("orders").unwrap();
        test(store.as_ref());
        layer.shutdown();
    }
}

// ============================================================================
// Point operations
// ============================================================================

#[test]
fn store_then_load_returns_value() {
    each_backend(|store| {
        store.store(&key(1), &order(1)).unwrap();
        assert_eq!(store.load(&key(1)).unwrap(), Some(order(1)));
    });
}

#[test]
fn load_of_absent_key_is_none() {
    each_backend(|store| {
        assert_eq!(store.load(&key(404)).unwrap(), None);
    });
}

#[test]
fn store_overwrites_previous_value() {
    each_backend(|store| {
        store.store(&key(1), &order(1)).unwrap();
        store.store(&key(1), &order(2)).unwrap();
        assert_eq!(store.load(&key(1)).unwrap(), Some(order(2)));
    });
}

#[test]
fn delete_removes_and_tolerates_absent_keys() {
    each_backend(|store| {
        store.store(&key(1), &order(1)).unwrap();
        store.delete(&key(1)).unwrap();
        store.delete(&key(1)).unwrap();
        assert_eq!(store.load(&key(1)).unwrap(), None);
    });
}

// ============================================================================
// Batches and enumeration
// ============================================================================

#[test]
fn batches_and_key_enumeration() {
    each_backend(|store| {
        let entries: HashMap<String, Order> = (0..20).map(|i| (key(i), order(i))).collect();
        store.store_all(&entries).unwrap();

        let wanted: Vec<String> = vec![key(3), key(7), key(99)];
        let found = store.load_all(&wanted).unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[&key(7)], order(7));

        let keys = store.load_all_keys().unwrap().into_keys().unwrap();
        assert_eq!(keys.len(), 20);

        let doomed: Vec<String> = (0..10).map(key).collect();
        store.delete_all(&doomed).unwrap();
        assert_eq!(store.load_all_keys().unwrap().len(), 10);
    });
}

#[test]
fn namespaces_are_isolated() {
    for backend in PERSISTENT {
        let harness = Harness::new();
        let layer = harness.open(harness.base_config().with_defaults(config_for(backend)));
        let orders = layer.store("orders").unwrap();
        let archive = layer.store("archive").unwrap();

        orders.store(&key(1), &order(1)).unwrap();
        assert_eq!(archive.load(&key(1)).unwrap(), None);
        assert!(archive.load_all_keys().unwrap().is_empty());
    }
}

#[test]
fn noop_backend_discards_everything() {
    let harness = Harness::new();
    let layer = harness.open(
        harness
            .base_config()
            .with_defaults(NamespaceConfig::for_backend(BackendKind::Noop)),
    );
    let store = layer.store("scratch").unwrap();
    store.store(&key(1), &order(1)).unwrap();
    assert_eq!(store.load(&key(1)).unwrap(), None);
    assert!(store.load_all_keys().unwrap().is_not_configured());
}
