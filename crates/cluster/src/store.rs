//! Document-cluster store
//!
//! Persists one namespace as documents in a remote search cluster used as a
//! document store. Traffic goes to the replicas the cluster reports as
//! active or recovering; get, update and select each rotate over their own
//! [`EndpointRing`], and every call is retried once per endpoint.
//!
//! # Lifecycle
//!
//! ```text
//! open     -> validate config, discover topology, fill rings,
//!             start topology refresh, commit (best effort)
//! refresh  -> every 30 s after a 10 s delay; failures keep the old rings
//! destroy  -> stop refresh, commit (best effort)
//! ```
//!
//! # Expiry
//!
//! Ephemeral namespaces (flagged in config, or named with the
//! [`EPHEMERAL_NAMESPACE_PREFIX`](gridstore_core::config::EPHEMERAL_NAMESPACE_PREFIX))
//! treat records older than [`EXPIRY_HORIZON_DAYS`] as absent and delete
//! them when they are read or enumerated.

use crate::document::{self, check_status, escape_query, StoredDocument, F_CTIME, F_ID};
use crate::retry::{DegradeToMiss, Escalate, RetryAcrossEndpoints, DEFAULT_BACKOFF};
use crate::ring::EndpointRing;
use crate::topology::discover;
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use gridstore_core::{
    Clock, Error, HostContext, KeyEncoder, LoadedKeys, MapStore, NamespaceConfig, ObjectCodec,
    PeriodicTask, Record, Result, StoreKey, StoreValue,
};
use parking_lot::Mutex;
use serde_json::{json, Value as JsonValue};
use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Age at which ephemeral records expire
pub const EXPIRY_HORIZON_DAYS: i64 = 30;
/// Documents per enumeration page
pub const PAGE_SIZE: usize = 1000;
/// Delay before the first topology refresh
pub const REFRESH_INITIAL_DELAY: Duration = Duration::from_secs(10);
/// Delay between topology refreshes
pub const REFRESH_PERIOD: Duration = Duration::from_secs(30);

const CURSOR_START: &str = "*";

/// Background and retry timing of a [`DocumentClusterStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTiming {
    /// Delay before the first topology refresh
    pub refresh_initial_delay: Duration,
    /// Delay between topology refreshes
    pub refresh_period: Duration,
    /// Pause between two retry attempts
    pub retry_backoff: Duration,
}

impl Default for ClusterTiming {
    fn default() -> Self {
        Self {
            refresh_initial_delay: REFRESH_INITIAL_DELAY,
            refresh_period: REFRESH_PERIOD,
            retry_backoff: DEFAULT_BACKOFF,
        }
    }
}

fn expiry_horizon() -> chrono::Duration {
    chrono::Duration::days(EXPIRY_HORIZON_DAYS)
}

struct Rings {
    get: EndpointRing,
    update: EndpointRing,
    select: EndpointRing,
}

impl Rings {
    fn new(endpoints: &[String]) -> Self {
        Self {
            get: EndpointRing::new(endpoints.to_vec()),
            update: EndpointRing::new(endpoints.to_vec()),
            select: EndpointRing::new(endpoints.to_vec()),
        }
    }

    fn replace(&self, endpoints: &[String]) {
        self.get.replace(endpoints.to_vec());
        self.update.replace(endpoints.to_vec());
        self.select.replace(endpoints.to_vec());
    }
}

struct Discovery {
    transport: Arc<dyn Transport>,
    seeds: Vec<String>,
    collection: Option<String>,
}

impl Discovery {
    fn eligible_endpoints(&self) -> Result<Vec<String>> {
        let topology = discover(&*self.transport, &self.seeds, self.collection.as_deref())?;
        let endpoints = topology.eligible_urls();
        if endpoints.is_empty() {
            return Err(Error::Connectivity(format!(
                "no active or recovering endpoint among {} replica(s)",
                topology.endpoints().len()
            )));
        }
        Ok(endpoints)
    }

    fn refresh(&self, rings: &Rings) -> Result<usize> {
        let endpoints = self.eligible_endpoints()?;
        rings.replace(&endpoints);
        Ok(endpoints.len())
    }
}

/// One page of a key enumeration.
struct SelectPage {
    num_found: u64,
    docs: Vec<JsonValue>,
    next_cursor: Option<String>,
}

impl SelectPage {
    fn from_response(endpoint: &str, mut response: JsonValue) -> Result<Self> {
        let next_cursor = response
            .get("nextCursorMark")
            .and_then(JsonValue::as_str)
            .map(str::to_string);
        let body = response
            .get_mut("response")
            .ok_or_else(|| Error::transient(endpoint, "select response without body"))?;
        let num_found = body
            .get("numFound")
            .and_then(JsonValue::as_u64)
            .ok_or_else(|| Error::transient(endpoint, "select response without numFound"))?;
        let docs = match body.get_mut("docs").map(JsonValue::take) {
            Some(JsonValue::Array(docs)) => docs,
            _ => Vec::new(),
        };
        Ok(Self {
            num_found,
            docs,
            next_cursor,
        })
    }
}

/// [`MapStore`] backed by a remote document cluster.
pub struct DocumentClusterStore<K, V> {
    namespace: String,
    config: NamespaceConfig,
    encoder: KeyEncoder,
    codec: ObjectCodec,
    ephemeral: bool,
    transport: Arc<dyn Transport>,
    host: Arc<dyn HostContext>,
    clock: Arc<dyn Clock>,
    discovery: Arc<Discovery>,
    rings: Arc<Rings>,
    timing: ClusterTiming,
    refresher: Mutex<Option<PeriodicTask>>,
    closed: AtomicBool,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> DocumentClusterStore<K, V> {
    /// Connect `namespace` to the cluster named by `config.endpoints`.
    pub fn open(
        namespace: &str,
        config: NamespaceConfig,
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostContext>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        Self::open_with_timing(namespace, config, transport, host, clock, ClusterTiming::default())
    }

    /// [`DocumentClusterStore::open`] with explicit timing.
    pub fn open_with_timing(
        namespace: &str,
        config: NamespaceConfig,
        transport: Arc<dyn Transport>,
        host: Arc<dyn HostContext>,
        clock: Arc<dyn Clock>,
        timing: ClusterTiming,
    ) -> Result<Self> {
        config.validate(namespace)?;

        let discovery = Arc::new(Discovery {
            transport: Arc::clone(&transport),
            seeds: config.endpoints.clone(),
            collection: config.collection.clone(),
        });
        let endpoints = discovery.eligible_endpoints().map_err(|e| {
            tracing::error!(namespace, error = %e, "cluster topology discovery failed");
            e
        })?;
        info!(namespace, endpoints = ?endpoints, "cluster topology discovered");
        let rings = Arc::new(Rings::new(&endpoints));

        let refresher = {
            let discovery = Arc::clone(&discovery);
            let rings = Arc::clone(&rings);
            let ns = namespace.to_string();
            PeriodicTask::start(
                format!("gridstore-refresh-{namespace}"),
                timing.refresh_initial_delay,
                timing.refresh_period,
                move || match discovery.refresh(&rings) {
                    Ok(count) => debug!(namespace = %ns, endpoints = count, "cluster topology refreshed"),
                    Err(e) => warn!(namespace = %ns, error = %e, "topology refresh failed; keeping previous endpoints"),
                },
            )?
        };

        let store = Self {
            namespace: namespace.to_string(),
            encoder: KeyEncoder::new(config.codec),
            codec: config.codec,
            ephemeral: config.is_ephemeral(namespace),
            config,
            transport,
            host,
            clock,
            discovery,
            rings,
            timing,
            refresher: Mutex::new(Some(refresher)),
            closed: AtomicBool::new(false),
            _marker: PhantomData,
        };

        if let Err(e) = store.post_update("commit", &json!({"commit": {}})) {
            warn!(namespace, error = %e, "commit at open failed");
        }
        info!(namespace, ephemeral = store.ephemeral, "document cluster store opened");
        Ok(store)
    }

    /// Endpoints currently eligible for traffic.
    pub fn endpoints(&self) -> Vec<String> {
        self.rings.get.snapshot().to_vec()
    }

    /// Re-read the topology now. On failure the current endpoints stay.
    pub fn refresh_topology(&self) -> Result<usize> {
        self.discovery.refresh(&self.rings)
    }

    /// Make recent updates visible to searches.
    pub fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        self.post_update("commit", &json!({"commit": {}}))
    }

    /// Check if records of this namespace expire.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(Error::Closed(self.namespace.clone()))
        } else {
            Ok(())
        }
    }

    fn retry<'a>(&'a self, ring: &'a EndpointRing, operation: &'static str) -> RetryAcrossEndpoints<'a> {
        RetryAcrossEndpoints::new(ring, &self.namespace, operation).with_backoff(self.timing.retry_backoff)
    }

    fn fetch(&self, endpoint: &str, id: &str) -> Result<Option<JsonValue>> {
        let url = format!("{endpoint}/get");
        let mut response = self.transport.get_json(&url, &[("id", id), ("wt", "json")])?;
        check_status(endpoint, &response)?;
        Ok(match response.get_mut("doc").map(JsonValue::take) {
            None | Some(JsonValue::Null) => None,
            Some(doc) => Some(doc),
        })
    }

    fn post_update(&self, operation: &'static str, body: &JsonValue) -> Result<()> {
        self.retry(&self.rings.update, operation)
            .run::<Escalate, _, _>(|endpoint| {
                let response = self.transport.post_json(&format!("{endpoint}/update"), body)?;
                check_status(endpoint, &response)
            })
    }

    fn select_page(&self, endpoint: &str, query: &str, cursor: &str) -> Result<SelectPage> {
        let url = format!("{endpoint}/select");
        let fields = format!("{F_ID},{F_CTIME}");
        let sort = format!("{F_ID} asc");
        let rows = PAGE_SIZE.to_string();
        let response = self.transport.get_json(
            &url,
            &[
                ("q", query),
                ("fl", fields.as_str()),
                ("sort", sort.as_str()),
                ("rows", rows.as_str()),
                ("cursorMark", cursor),
                ("wt", "json"),
            ],
        )?;
        check_status(endpoint, &response)?;
        SelectPage::from_response(endpoint, response)
    }

    fn is_expired(&self, created_at: Option<DateTime<Utc>>) -> bool {
        self.ephemeral && created_at.is_some_and(|created| self.clock.now() >= created + expiry_horizon())
    }

    fn expire(&self, id: &str) {
        match self.post_update("delete", &json!({"delete": {F_ID: id}})) {
            Ok(()) => debug!(namespace = %self.namespace, id, "expired record deleted"),
            Err(e) => warn!(namespace = %self.namespace, id, error = %e, "failed to delete expired record"),
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.refresher.lock().take() {
            task.stop();
        }
        if let Err(e) = self.post_update("commit", &json!({"commit": {}})) {
            warn!(namespace = %self.namespace, error = %e, "commit at close failed");
        }
        info!(namespace = %self.namespace, "document cluster store closed");
    }
}

impl<K: StoreKey, V: StoreValue> DocumentClusterStore<K, V> {
    /// Load an entry together with its creation time.
    pub fn load_record(&self, key: &K) -> Result<Option<Record<K, V>>> {
        self.ensure_open()?;
        let id = self.encoder.document_id(&self.namespace, key)?;
        let fetched = self
            .retry(&self.rings.get, "get")
            .run::<DegradeToMiss, _, _>(|endpoint| self.fetch(endpoint, &id))?;
        Ok(fetched
            .flatten()
            .and_then(|doc| self.decode_record(key.clone(), &doc)))
    }

    fn decode_record(&self, key: K, doc: &JsonValue) -> Option<Record<K, V>> {
        let stored = match StoredDocument::from_json(doc) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "malformed document treated as miss");
                return None;
            }
        };
        if self.is_expired(stored.created_at) {
            self.expire(&stored.id);
            return None;
        }
        let Some(data) = stored.data else {
            warn!(namespace = %self.namespace, id = %stored.id, "document without payload treated as miss");
            return None;
        };
        match self.codec.decode::<V>(&data) {
            Ok(value) => Some(Record {
                namespace: self.namespace.clone(),
                key,
                value,
                created_at: stored.created_at,
            }),
            Err(e) => {
                warn!(namespace = %self.namespace, id = %stored.id, error = %e, "undecodable value treated as miss");
                None
            }
        }
    }
}

impl<K: StoreKey, V: StoreValue> MapStore<K, V> for DocumentClusterStore<K, V> {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn load(&self, key: &K) -> Result<Option<V>> {
        Ok(self.load_record(key)?.map(|record| record.value))
    }

    fn load_all(&self, keys: &[K]) -> Result<HashMap<K, V>> {
        self.ensure_open()?;
        let mut found = HashMap::with_capacity(keys.len());
        for key in keys {
            let id = self.encoder.document_id(&self.namespace, key)?;
            let fetched = self
                .retry(&self.rings.get, "get")
                .run::<Escalate, _, _>(|endpoint| self.fetch(endpoint, &id))?;
            if let Some(record) = fetched.and_then(|doc| self.decode_record(key.clone(), &doc)) {
                found.insert(record.key, record.value);
            }
        }
        Ok(found)
    }

    fn load_all_keys(&self) -> Result<LoadedKeys<K>> {
        self.ensure_open()?;
        if !self.config.preload_enabled() || !self.host.is_single_node() {
            debug!(
                namespace = %self.namespace,
                members = self.host.member_count(),
                "cluster key enumeration not configured"
            );
            return Ok(self.config.disabled_preload());
        }

        let query = format!("{F_ID}:{}\\:*", escape_query(&self.namespace));
        let mut cursor = CURSOR_START.to_string();
        let mut seen: u64 = 0;
        let mut keys = HashSet::new();

        loop {
            let page = self
                .retry(&self.rings.select, "select")
                .run::<Escalate, _, _>(|endpoint| self.select_page(endpoint, &query, &cursor))?;
            if page.docs.is_empty() {
                break;
            }
            seen += page.docs.len() as u64;

            for doc in &page.docs {
                let stored = match StoredDocument::from_json(doc) {
                    Ok(stored) => stored,
                    Err(e) => {
                        warn!(namespace = %self.namespace, error = %e, "skipping malformed document");
                        continue;
                    }
                };
                if self.is_expired(stored.created_at) {
                    self.expire(&stored.id);
                    continue;
                }
                match self.encoder.key_from_document_id::<K>(&self.namespace, &stored.id) {
                    Ok(key) => {
                        keys.insert(key);
                    }
                    Err(e) => {
                        warn!(namespace = %self.namespace, id = %stored.id, error = %e, "skipping undecodable key");
                    }
                }
            }

            if seen >= page.num_found {
                break;
            }
            match page.next_cursor {
                Some(next) if next != cursor => cursor = next,
                _ => break,
            }
        }

        info!(namespace = %self.namespace, count = keys.len(), "enumerated cluster keys");
        Ok(LoadedKeys::Keys(keys))
    }

    fn store(&self, key: &K, value: &V) -> Result<()> {
        self.ensure_open()?;
        let id = self.encoder.document_id(&self.namespace, key)?;
        let data = self.codec.encode(value)?;
        let doc = document::build(&id, self.clock.now(), std::any::type_name::<V>(), &data);
        self.post_update("update", &JsonValue::Array(vec![doc]))
    }

    fn delete(&self, key: &K) -> Result<()> {
        self.ensure_open()?;
        let id = self.encoder.document_id(&self.namespace, key)?;
        self.post_update("delete", &json!({"delete": {F_ID: id}}))
    }

    fn destroy(&self) {
        self.close();
    }
}

impl<K, V> Drop for DocumentClusterStore<K, V> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<K, V> std::fmt::Debug for DocumentClusterStore<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentClusterStore")
            .field("namespace", &self.namespace)
            .field("endpoints", &self.endpoints())
            .field("ephemeral", &self.ephemeral)
            .field("closed", &self.closed.load(Ordering::Acquire))
            .finish()
    }
}
