//! Opening the layer from configuration files

use crate::common::{key, order, Order};
use gridstore::{BackendKind, PersistenceLayer, StaticHost, StoreConfig};
use std::sync::Arc;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("gridstore.toml");
    let data_dir = dir.path().join("data");
    let text = format!("data_dir = {:?}\n{body}", data_dir.display().to_string());
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn open_file_creates_data_dir_and_resolves_namespaces() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        r#"
[defaults]
backend = "transactional"
sync_interval_ms = 0

[namespaces.orders]
backend = "ordered"

[namespaces.scratch]
backend = "noop"
"#,
    );

    let layer: PersistenceLayer<String, Order> =
        PersistenceLayer::open_file(&path, Arc::new(StaticHost::single_node())).unwrap();
    assert!(dir.path().join("data").is_dir());
    assert_eq!(layer.config("orders").backend, BackendKind::Ordered);
    assert_eq!(layer.config("orders").sync_interval_ms, 0);
    assert_eq!(layer.config("anything").backend, BackendKind::Transactional);

    for namespace in ["orders", "anything", "scratch"] {
        layer
            .store(namespace)
            .unwrap()
            .store(&key(1), &order(1))
            .unwrap();
    }
    assert_eq!(layer.store("orders").unwrap().load(&key(1)).unwrap(), Some(order(1)));
    assert_eq!(layer.store("anything").unwrap().load(&key(1)).unwrap(), Some(order(1)));
    assert_eq!(layer.store("scratch").unwrap().load(&key(1)).unwrap(), None);
    assert_eq!(layer.shutdown(), 3);
}

#[test]
fn cluster_namespace_without_endpoints_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::from_toml_str(
        r#"
[namespaces.sessions]
backend = "document_cluster"
"#,
    )
    .unwrap();
    let config = StoreConfig {
        data_dir: dir.path().to_path_buf(),
        ..config
    };

    let layer: PersistenceLayer<String, Order> =
        PersistenceLayer::open(config, Arc::new(StaticHost::single_node())).unwrap();
    let err = layer.store("sessions").err().unwrap();
    assert!(err.is_configuration());
    // the failed namespace is not cached
    assert!(layer.namespaces().is_empty());
}

#[test]
fn malformed_file_is_a_configuration_error() {
    let dir = TempDir::new().unwrap();
    let path = write_config(&dir, "[defaults]\nbackend = \"tape\"\n");
    let err = PersistenceLayer::<String, Order>::open_file(&path, Arc::new(StaticHost::single_node()))
        .err()
        .unwrap();
    assert!(err.is_configuration());
}
