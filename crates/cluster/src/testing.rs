//! In-process cluster for tests
//!
//! [`FakeCluster`] implements [`Transport`] over an in-memory document map
//! and answers the coordination, get, update and select endpoints the way a
//! real cluster does. Endpoints can be failed, made to reject requests, or
//! marked down in the published topology; every request URL is recorded.

use crate::document::F_ID;
use crate::transport::Transport;
use gridstore_core::{Error, Result};
use parking_lot::Mutex;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::{BTreeMap, HashSet};

#[derive(Default)]
struct FakeState {
    replicas: Vec<(String, String)>,
    documents: BTreeMap<String, JsonValue>,
    coordination_down: bool,
    failing: HashSet<String>,
    rejecting: HashSet<String>,
    requests: Vec<String>,
    commits: usize,
}

/// In-memory stand-in for a document cluster.
pub struct FakeCluster {
    collection: String,
    state: Mutex<FakeState>,
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn ok_header() -> JsonValue {
    json!({"status": 0, "QTime": 1})
}

impl FakeCluster {
    /// A cluster serving `collection` from one active replica per node.
    pub fn new(collection: &str, nodes: &[&str]) -> Self {
        let state = FakeState {
            replicas: nodes
                .iter()
                .map(|node| (node.to_string(), "active".to_string()))
                .collect(),
            ..FakeState::default()
        };
        Self {
            collection: collection.to_string(),
            state: Mutex::new(state),
        }
    }

    /// Node base URLs, usable as seeds.
    pub fn seeds(&self) -> Vec<String> {
        self.state.lock().replicas.iter().map(|(node, _)| node.clone()).collect()
    }

    /// Replica endpoint served by `node`.
    pub fn endpoint(&self, node: &str) -> String {
        format!("{}/{}", node.trim_end_matches('/'), self.collection)
    }

    /// Every replica endpoint, in topology order.
    pub fn endpoints(&self) -> Vec<String> {
        self.seeds().iter().map(|node| self.endpoint(node)).collect()
    }

    /// Change the state `node` reports in the topology.
    pub fn set_replica_state(&self, node: &str, replica_state: &str) {
        let mut state = self.state.lock();
        for (name, reported) in state.replicas.iter_mut() {
            if name == node {
                *reported = replica_state.to_string();
            }
        }
    }

    /// Make the coordination document unavailable (or available again).
    pub fn set_coordination_down(&self, down: bool) {
        self.state.lock().coordination_down = down;
    }

    /// Refuse connections to `endpoint`.
    pub fn fail(&self, endpoint: &str) {
        self.state.lock().failing.insert(endpoint.to_string());
    }

    /// Undo [`FakeCluster::fail`] and [`FakeCluster::reject`].
    pub fn heal(&self, endpoint: &str) {
        let mut state = self.state.lock();
        state.failing.remove(endpoint);
        state.rejecting.remove(endpoint);
    }

    /// Answer requests to `endpoint` with a non-zero status.
    pub fn reject(&self, endpoint: &str) {
        self.state.lock().rejecting.insert(endpoint.to_string());
    }

    /// Every request URL received so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().requests.clone()
    }

    /// Number of requests whose URL ends with `suffix`.
    pub fn request_count(&self, suffix: &str) -> usize {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|url| url.ends_with(suffix))
            .count()
    }

    /// Forget recorded requests.
    pub fn clear_requests(&self) {
        self.state.lock().requests.clear();
    }

    /// Number of commits received.
    pub fn commits(&self) -> usize {
        self.state.lock().commits
    }

    /// Stored document by id.
    pub fn document(&self, id: &str) -> Option<JsonValue> {
        self.state.lock().documents.get(id).cloned()
    }

    /// Store a document directly, bypassing the update endpoint.
    pub fn put_document(&self, doc: JsonValue) {
        if let Some(id) = doc.get(F_ID).and_then(JsonValue::as_str) {
            let id = id.to_string();
            self.state.lock().documents.insert(id, doc);
        }
    }

    /// Number of stored documents.
    pub fn document_count(&self) -> usize {
        self.state.lock().documents.len()
    }

    fn cluster_state(&self, state: &FakeState) -> JsonValue {
        let mut replicas = Map::new();
        for (i, (node, reported)) in state.replicas.iter().enumerate() {
            replicas.insert(
                format!("core_node{i:03}"),
                json!({"base_url": node, "core": self.collection, "state": reported}),
            );
        }
        let mut collections = Map::new();
        collections.insert(
            self.collection.clone(),
            json!({"shards": {"shard1": {"replicas": replicas}}}),
        );
        JsonValue::Object(collections)
    }

    fn select(state: &FakeState, query: &[(&str, &str)]) -> JsonValue {
        let param = |name: &str| {
            query
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
        };
        let q = param("q").unwrap_or("");
        let rows: usize = param("rows").and_then(|r| r.parse().ok()).unwrap_or(10);
        let cursor = param("cursorMark").unwrap_or("*");

        let prefix = q
            .strip_prefix("id:")
            .and_then(|rest| rest.strip_suffix("\\:*"))
            .map(|ns| format!("{}:", unescape(ns)))
            .unwrap_or_default();

        let matching: Vec<(&String, &JsonValue)> = state
            .documents
            .range(prefix.clone()..)
            .take_while(|(id, _)| id.starts_with(&prefix))
            .collect();
        let page: Vec<(&String, &JsonValue)> = matching
            .iter()
            .filter(|(id, _)| cursor == "*" || id.as_str() > cursor)
            .take(rows)
            .copied()
            .collect();
        let next = page
            .last()
            .map(|(id, _)| id.to_string())
            .unwrap_or_else(|| cursor.to_string());
        let docs: Vec<JsonValue> = page
            .iter()
            .map(|(id, doc)| json!({"id": id, "HZ_CTIME": doc.get("HZ_CTIME")}))
            .collect();

        json!({
            "responseHeader": ok_header(),
            "response": {"numFound": matching.len(), "start": 0, "docs": docs},
            "nextCursorMark": next,
        })
    }

    fn route<'a>(state: &mut FakeState, url: &'a str) -> Result<(&'a str, &'a str)> {
        state.requests.push(url.to_string());
        let (endpoint, operation) = url
            .rsplit_once('/')
            .ok_or_else(|| Error::transient(url, "malformed url"))?;
        if state.failing.contains(endpoint) {
            return Err(Error::transient(url, "connection refused"));
        }
        Ok((endpoint, operation))
    }
}

impl Transport for FakeCluster {
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<JsonValue> {
        let mut state = self.state.lock();
        let (endpoint, operation) = Self::route(&mut state, url)?;
        if state.rejecting.contains(endpoint) {
            return Ok(json!({"responseHeader": {"status": 500}}));
        }
        match operation {
            "zookeeper" if state.coordination_down => {
                Err(Error::transient(url, "coordination service unavailable"))
            }
            "zookeeper" => Ok(json!({"znode": {"data": self.cluster_state(&state).to_string()}})),
            "get" => {
                let id = query
                    .iter()
                    .find(|(key, _)| *key == "id")
                    .map(|(_, value)| *value)
                    .unwrap_or("");
                let doc = state.documents.get(id).cloned().unwrap_or(JsonValue::Null);
                Ok(json!({ "doc": doc }))
            }
            "select" => Ok(Self::select(&state, query)),
            other => Err(Error::transient(url, format!("no handler for {other}"))),
        }
    }

    fn post_json(&self, url: &str, body: &JsonValue) -> Result<JsonValue> {
        let mut state = self.state.lock();
        let (endpoint, operation) = Self::route(&mut state, url)?;
        if state.rejecting.contains(endpoint) {
            return Ok(json!({"responseHeader": {"status": 500}}));
        }
        if operation != "update" {
            return Err(Error::transient(url, format!("no handler for {operation}")));
        }

        if let Some(docs) = body.as_array() {
            for doc in docs {
                if let Some(id) = doc.get(F_ID).and_then(JsonValue::as_str) {
                    state.documents.insert(id.to_string(), doc.clone());
                }
            }
        } else if let Some(id) = body
            .get("delete")
            .and_then(|delete| delete.get(F_ID))
            .and_then(JsonValue::as_str)
        {
            state.documents.remove(id);
        } else if body.get("commit").is_some() {
            state.commits += 1;
        } else {
            return Ok(json!({"responseHeader": {"status": 400}}));
        }
        Ok(json!({"responseHeader": ok_header()}))
    }
}
