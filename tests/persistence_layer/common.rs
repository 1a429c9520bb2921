//! Shared fixtures

use chrono::{TimeZone, Utc};
use gridstore::engine::{ConfiguredFactory, DocumentClusterFactory};
use gridstore_cluster::testing::FakeCluster;
use gridstore_cluster::ClusterTiming;
use gridstore_core::ManualClock;
use gridstore::{HostContext, PersistenceLayer, StaticHost, StoreConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Value type used throughout the suite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub item: String,
    pub quantity: u32,
}

pub fn order(id: u64) -> Order {
    Order {
        id,
        item: format!("item-{id}"),
        quantity: (id % 7) as u32 + 1,
    }
}

pub fn key(id: u64) -> String {
    format!("order-{id}")
}

pub const NODES: [&str; 3] = [
    "http://solr-1:8983/solr",
    "http://solr-2:8983/solr",
    "http://solr-3:8983/solr",
];

/// A layer wired to an in-process cluster and a manual clock.
pub struct Harness {
    pub dir: TempDir,
    pub cluster: Arc<FakeCluster>,
    pub clock: Arc<ManualClock>,
    pub host: Arc<StaticHost>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            cluster: Arc::new(FakeCluster::new("grid", &NODES)),
            clock: Arc::new(ManualClock::new(
                Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            )),
            host: Arc::new(StaticHost::single_node()),
        }
    }

    pub fn base_config(&self) -> StoreConfig {
        StoreConfig::new(self.dir.path())
    }

    pub fn open(&self, config: StoreConfig) -> PersistenceLayer<String, Order> {
        let host: Arc<dyn HostContext> = self.host.clone();
        let cluster = DocumentClusterFactory::new(Arc::clone(&host))
            .with_transport(self.cluster.clone())
            .with_clock(self.clock.clone())
            .with_timing(ClusterTiming {
                refresh_initial_delay: Duration::from_secs(3600),
                refresh_period: Duration::from_secs(3600),
                retry_backoff: Duration::from_millis(1),
            });
        let factory = ConfiguredFactory::new(self.dir.path(), host).with_cluster(cluster);
        PersistenceLayer::with_factory(config, Arc::new(factory))
    }
}
