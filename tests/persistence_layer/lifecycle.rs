//! Registry, restart, eviction and shutdown behaviour

use crate::common::{key, order, Harness, NODES};
use gridstore::{BackendKind, NamespaceConfig, Preloader};
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// Registry
// ============================================================================

#[test]
fn repeated_lookups_share_one_adapter() {
    let harness = Harness::new();
    let layer = harness.open(harness.base_config());
    let a = layer.store("orders").unwrap();
    let b = layer.store("orders").unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(layer.namespaces(), vec!["orders".to_string()]);
}

#[test]
fn concurrent_first_use_shares_one_adapter() {
    let harness = Harness::new();
    let layer = Arc::new(harness.open(harness.base_config()));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let layer = Arc::clone(&layer);
            std::thread::spawn(move || layer.store("orders").unwrap())
        })
        .collect();
    let stores: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(stores.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
}

// ============================================================================
// Restart
// ============================================================================

#[test]
fn embedded_data_survives_restart() {
    for backend in [BackendKind::Ordered, BackendKind::Transactional] {
        let harness = Harness::new();
        let config = harness
            .base_config()
            .with_defaults(NamespaceConfig::for_backend(backend));

        let layer = harness.open(config.clone());
        let store = layer.store("orders").unwrap();
        for i in 0..50 {
            store.store(&key(i), &order(i)).unwrap();
        }
        store.delete(&key(0)).unwrap();
        drop(store);
        assert_eq!(layer.shutdown(), 1);
        drop(layer);

        let reopened = harness.open(config);
        let store = reopened.store("orders").unwrap();
        assert_eq!(store.load(&key(0)).unwrap(), None);
        assert_eq!(store.load(&key(49)).unwrap(), Some(order(49)));
        assert_eq!(store.load_all_keys().unwrap().len(), 49);
    }
}

#[test]
fn immediate_durability_survives_restart() {
    let harness = Harness::new();
    let config = harness.base_config().with_defaults(NamespaceConfig {
        sync_interval_ms: 0,
        ..NamespaceConfig::for_backend(BackendKind::Transactional)
    });
    {
        let layer = harness.open(config.clone());
        layer.store("orders").unwrap().store(&key(1), &order(1)).unwrap();
    }
    let layer = harness.open(config);
    assert_eq!(layer.store("orders").unwrap().load(&key(1)).unwrap(), Some(order(1)));
}

// ============================================================================
// Eviction
// ============================================================================

#[test]
fn eviction_deletes_only_where_configured() {
    let harness = Harness::new();
    let layer = harness.open(
        harness
            .base_config()
            .with_namespace("sessions", NamespaceConfig::default().with_delete_on_evict(true)),
    );
    let sessions = layer.store("sessions").unwrap();
    let orders = layer.store("orders").unwrap();
    sessions.store(&key(1), &order(1)).unwrap();
    orders.store(&key(1), &order(1)).unwrap();

    assert!(layer.on_entry_evicted("sessions", &key(1)).unwrap());
    assert!(!layer.on_entry_evicted("orders", &key(1)).unwrap());

    assert_eq!(sessions.load(&key(1)).unwrap(), None);
    assert_eq!(orders.load(&key(1)).unwrap(), Some(order(1)));
}

#[test]
fn eviction_in_cluster_namespace_issues_one_delete() {
    let harness = Harness::new();
    let layer = harness.open(
        harness.base_config().with_namespace(
            "sessions",
            NamespaceConfig::for_backend(BackendKind::DocumentCluster)
                .with_endpoints(NODES)
                .with_delete_on_evict(true),
        ),
    );
    layer.store("sessions").unwrap().store(&key(1), &order(1)).unwrap();
    harness.cluster.clear_requests();

    assert!(layer.on_entry_evicted("sessions", &key(1)).unwrap());
    assert_eq!(harness.cluster.request_count("/update"), 1);
    assert_eq!(harness.cluster.document_count(), 0);
}

// ============================================================================
// Pre-load
// ============================================================================

#[test]
fn preload_delivers_every_entry_in_batches() {
    let harness = Harness::new();
    let layer = harness
        .open(harness.base_config())
        .with_preloader(Preloader::new(16));
    let entries: HashMap<_, _> = (0..40).map(|i| (key(i), order(i))).collect();
    layer.store("orders").unwrap().store_all(&entries).unwrap();

    let mut loaded = HashMap::new();
    let report = layer.preload("orders", |batch| loaded.extend(batch)).unwrap();
    assert_eq!(report.batches, 3);
    assert_eq!(loaded, entries);
}

#[test]
fn preload_skips_namespaces_answering_with_sentinel() {
    let harness = Harness::new();
    let layer = harness.open(
        harness
            .base_config()
            .with_defaults(NamespaceConfig::default().with_load_all(false)),
    );
    layer.store("orders").unwrap().store(&key(1), &order(1)).unwrap();

    let mut batches = 0;
    let report = layer.preload("orders", |_| batches += 1).unwrap();
    assert!(report.skipped);
    assert_eq!(batches, 0);
}

// ============================================================================
// Shutdown
// ============================================================================

#[test]
fn shutdown_destroys_every_adapter_once() {
    let harness = Harness::new();
    let layer = harness.open(
        harness.base_config().with_namespace(
            "sessions",
            NamespaceConfig::for_backend(BackendKind::DocumentCluster).with_endpoints(NODES),
        ),
    );
    let orders = layer.store("orders").unwrap();
    layer.store("sessions").unwrap();
    let commits = harness.cluster.commits();

    assert_eq!(layer.shutdown(), 2);
    assert_eq!(layer.shutdown(), 0);
    assert_eq!(harness.cluster.commits(), commits + 1);
    assert!(orders.store(&key(1), &order(1)).is_err());
    assert!(layer.store("orders").is_err());
    assert!(layer.on_entry_evicted("orders", &key(1)).is_err());
}
