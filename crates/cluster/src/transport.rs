//! HTTP transport to cluster endpoints
//!
//! [`Transport`] is the seam between the adapter and the network: the
//! adapter only ever issues JSON GETs with query parameters and JSON POSTs.
//! [`HttpTransport`] implements it with a blocking `ureq` agent; tests plug
//! in an in-process cluster instead.
//!
//! Every failure of a single call (connect, timeout, HTTP error status,
//! unparseable body) is reported as [`Error::TransientRemote`] so the retry
//! layer moves on to the next endpoint.

use gridstore_core::{Error, Result};
use serde_json::Value as JsonValue;
use std::time::Duration;

/// JSON request/response channel to cluster endpoints.
pub trait Transport: Send + Sync {
    /// `GET url?query` and parse the body as JSON.
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<JsonValue>;

    /// `POST url` with a JSON body and parse the response as JSON.
    fn post_json(&self, url: &str, body: &JsonValue) -> Result<JsonValue>;
}

/// [`Transport`] over blocking HTTP.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Create a transport with the given connect and read timeouts.
    pub fn new(connect_timeout: Duration, read_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(connect_timeout)
            .timeout_read(read_timeout)
            .timeout_write(read_timeout)
            .build();
        Self { agent }
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<JsonValue> {
        let mut request = self.agent.get(url).set("Accept", "application/json");
        for (name, value) in query {
            request = request.query(name, value);
        }
        let response = request.call().map_err(|e| Error::transient(url, e))?;
        response
            .into_json::<JsonValue>()
            .map_err(|e| Error::transient(url, e))
    }

    fn post_json(&self, url: &str, body: &JsonValue) -> Result<JsonValue> {
        let response = self
            .agent
            .post(url)
            .set("Accept", "application/json")
            .send_json(body)
            .map_err(|e| Error::transient(url, e))?;
        response
            .into_json::<JsonValue>()
            .map_err(|e| Error::transient(url, e))
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport").finish_non_exhaustive()
    }
}
