//! Cluster topology
//!
//! The cluster publishes its layout as a coordination document:
//!
//! ```text
//! GET <seed>/zookeeper?detail=true&path=/clusterstate.json
//! {"znode": {"data": "<cluster state as a JSON string>"}}
//! ```
//!
//! The cluster state nests `collection -> shards -> shard -> replicas ->
//! replica`, and every replica names its node (`base_url`), its core and its
//! state. Replica endpoints are `base_url/core`. Objects are visited in key
//! order so the endpoint list is deterministic.

use crate::transport::Transport;
use gridstore_core::{Error, Result};
use serde_json::{Map, Value as JsonValue};
use tracing::debug;

/// Path of the coordination endpoint relative to a seed
pub const COORDINATION_PATH: &str = "zookeeper";
/// Coordination node holding the cluster state
pub const CLUSTER_STATE_NODE: &str = "/clusterstate.json";

/// Replica state as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointState {
    /// Serving traffic
    Active,
    /// Catching up; still accepts traffic
    Recovering,
    /// Not reachable
    Down,
    /// Any other reported state
    Other(String),
}

impl EndpointState {
    /// Parse a reported state, case-insensitively.
    pub fn parse(state: &str) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "active" => EndpointState::Active,
            "recovering" => EndpointState::Recovering,
            "down" => EndpointState::Down,
            other => EndpointState::Other(other.to_string()),
        }
    }

    /// Check if the endpoint may receive traffic.
    pub fn is_eligible(&self) -> bool {
        matches!(self, EndpointState::Active | EndpointState::Recovering)
    }
}

/// One replica endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterEndpoint {
    /// `base_url/core`
    pub url: String,
    /// Reported state
    pub state: EndpointState,
}

/// Ordered endpoint list of a cluster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterTopology {
    endpoints: Vec<ClusterEndpoint>,
}

fn sorted(map: &Map<String, JsonValue>) -> Vec<(&String, &JsonValue)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries
}

fn malformed(what: &str) -> Error {
    Error::Connectivity(format!("malformed cluster state: {what}"))
}

impl ClusterTopology {
    /// Build a topology from explicit endpoints.
    pub fn new(endpoints: Vec<ClusterEndpoint>) -> Self {
        Self { endpoints }
    }

    /// Parse a coordination response (`{"znode": {"data": "..."}}`).
    pub fn from_coordination_response(
        response: &JsonValue,
        collection: Option<&str>,
    ) -> Result<Self> {
        let data = response
            .get("znode")
            .and_then(|znode| znode.get("data"))
            .and_then(JsonValue::as_str)
            .ok_or_else(|| malformed("missing znode data"))?;
        let state: JsonValue =
            serde_json::from_str(data).map_err(|e| malformed(&e.to_string()))?;
        Self::from_cluster_state(&state, collection)
    }

    /// Parse a cluster state document, optionally restricted to one collection.
    pub fn from_cluster_state(state: &JsonValue, collection: Option<&str>) -> Result<Self> {
        let collections = state
            .as_object()
            .ok_or_else(|| malformed("cluster state is not an object"))?;

        let mut endpoints: Vec<ClusterEndpoint> = Vec::new();
        for (name, layout) in sorted(collections) {
            if collection.is_some_and(|wanted| wanted != name) {
                continue;
            }
            let Some(shards) = layout.get("shards").and_then(JsonValue::as_object) else {
                continue;
            };
            for (_, shard) in sorted(shards) {
                let Some(replicas) = shard.get("replicas").and_then(JsonValue::as_object) else {
                    continue;
                };
                for (_, replica) in sorted(replicas) {
                    let field = |key: &str| replica.get(key).and_then(JsonValue::as_str);
                    let (Some(base_url), Some(core)) = (field("base_url"), field("core")) else {
                        continue;
                    };
                    let url = format!("{}/{}", base_url.trim_end_matches('/'), core);
                    if endpoints.iter().any(|e| e.url == url) {
                        continue;
                    }
                    endpoints.push(ClusterEndpoint {
                        url,
                        state: EndpointState::parse(field("state").unwrap_or("")),
                    });
                }
            }
        }
        Ok(Self { endpoints })
    }

    /// All endpoints, in discovery order.
    pub fn endpoints(&self) -> &[ClusterEndpoint] {
        &self.endpoints
    }

    /// URLs of the endpoints eligible for traffic.
    pub fn eligible_urls(&self) -> Vec<String> {
        self.endpoints
            .iter()
            .filter(|e| e.state.is_eligible())
            .map(|e| e.url.clone())
            .collect()
    }
}

/// Fetch the topology from the first seed that answers.
pub fn discover(
    transport: &dyn Transport,
    seeds: &[String],
    collection: Option<&str>,
) -> Result<ClusterTopology> {
    let query = [("detail", "true"), ("path", CLUSTER_STATE_NODE)];
    for seed in seeds {
        let url = format!("{}/{}", seed.trim_end_matches('/'), COORDINATION_PATH);
        let answer = transport
            .get_json(&url, &query)
            .and_then(|doc| ClusterTopology::from_coordination_response(&doc, collection));
        match answer {
            Ok(topology) => return Ok(topology),
            Err(e) => debug!(seed = %seed, error = %e, "coordination document unavailable"),
        }
    }
    Err(Error::Connectivity(format!(
        "cluster topology unavailable from seeds [{}]",
        seeds.join(", ")
    )))
}
