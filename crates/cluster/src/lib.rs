//! Document-cluster backend for gridstore
//!
//! [`DocumentClusterStore`] persists a namespace as documents in a remote
//! search cluster:
//! - [`topology`]: discovery of live replicas from the coordination document
//! - [`ring`]: independent round-robin selection per operation kind
//! - [`retry`]: one attempt per endpoint, policy-driven exhaustion
//! - [`document`]: reserved document fields and query escaping
//! - [`transport`]: the HTTP seam ([`HttpTransport`] over `ureq`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod retry;
pub mod ring;
pub mod store;
pub mod topology;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use retry::{DegradeToMiss, Escalate, FailurePolicy, RetryAcrossEndpoints};
pub use ring::EndpointRing;
pub use store::{ClusterTiming, DocumentClusterStore, EXPIRY_HORIZON_DAYS, PAGE_SIZE};
pub use topology::{ClusterEndpoint, ClusterTopology, EndpointState};
pub use transport::{HttpTransport, Transport};
