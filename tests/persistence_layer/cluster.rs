//! Document cluster behaviour seen through the layer

use crate::common::{key, order, Harness, Order, NODES};
use gridstore::{BackendKind, NamespaceConfig, PersistenceLayer};
use std::collections::HashMap;

fn cluster_layer(harness: &Harness, load_all: bool) -> PersistenceLayer<String, Order> {
    harness.open(
        harness.base_config().with_defaults(
            NamespaceConfig::for_backend(BackendKind::DocumentCluster)
                .with_endpoints(NODES)
                .with_load_all(load_all),
        ),
    )
}

#[test]
fn reads_rotate_across_every_replica() {
    let harness = Harness::new();
    let layer = cluster_layer(&harness, false);
    let store = layer.store("orders").unwrap();
    harness.cluster.clear_requests();

    for i in 0..6 {
        store.load(&key(i)).unwrap();
    }
    for endpoint in harness.cluster.endpoints() {
        assert_eq!(harness.cluster.request_count(&format!("{endpoint}/get")), 2);
    }
}

#[test]
fn failed_replica_is_skipped() {
    let harness = Harness::new();
    let layer = cluster_layer(&harness, false);
    let store = layer.store("orders").unwrap();
    harness.cluster.fail(&harness.cluster.endpoint(NODES[1]));

    for i in 0..5 {
        store.store(&key(i), &order(i)).unwrap();
    }
    for i in 0..5 {
        assert_eq!(store.load(&key(i)).unwrap(), Some(order(i)));
    }
}

#[test]
fn writes_fail_when_every_replica_fails() {
    let harness = Harness::new();
    let layer = cluster_layer(&harness, false);
    let store = layer.store("orders").unwrap();
    for endpoint in harness.cluster.endpoints() {
        harness.cluster.fail(&endpoint);
    }

    assert!(store.store(&key(1), &order(1)).is_err());
    // reads degrade to a miss
    assert_eq!(store.load(&key(1)).unwrap(), None);
}

#[test]
fn ephemeral_namespace_expires_old_entries() {
    let harness = Harness::new();
    let layer = cluster_layer(&harness, false);
    let store = layer.store("hz_memcache_sessions").unwrap();
    store.store(&key(1), &order(1)).unwrap();

    harness.clock.advance(chrono::Duration::days(29));
    assert_eq!(store.load(&key(1)).unwrap(), Some(order(1)));

    harness.clock.advance(chrono::Duration::days(2));
    assert_eq!(store.load(&key(1)).unwrap(), None);
    assert_eq!(harness.cluster.document_count(), 0);
}

#[test]
fn durable_namespace_never_expires() {
    let harness = Harness::new();
    let layer = cluster_layer(&harness, false);
    let store = layer.store("orders").unwrap();
    store.store(&key(1), &order(1)).unwrap();

    harness.clock.advance(chrono::Duration::days(365));
    assert_eq!(store.load(&key(1)).unwrap(), Some(order(1)));
}

#[test]
fn preload_pages_through_large_namespaces() {
    let harness = Harness::new();
    let layer = cluster_layer(&harness, true);
    let entries: HashMap<_, _> = (0..1500).map(|i| (key(i), order(i))).collect();
    layer.store("orders").unwrap().store_all(&entries).unwrap();
    harness.cluster.clear_requests();

    let mut loaded = 0;
    let report = layer.preload("orders", |batch| loaded += batch.len()).unwrap();
    assert_eq!(report.keys, 1500);
    assert_eq!(loaded, 1500);
    assert_eq!(harness.cluster.request_count("/select"), 2);
}

#[test]
fn preload_is_not_configured_on_multi_node_hosts() {
    let harness = Harness::new();
    harness.host.set_members(3);
    let layer = cluster_layer(&harness, true);
    layer.store("orders").unwrap().store(&key(1), &order(1)).unwrap();
    harness.cluster.clear_requests();

    let report = layer.preload("orders", |_| {}).unwrap();
    assert!(report.skipped);
    assert!(harness.cluster.requests().is_empty());
}
