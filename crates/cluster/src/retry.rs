//! Retry across endpoints
//!
//! Every remote call is made through [`RetryAcrossEndpoints`]: one attempt
//! per endpoint known when the call starts, each attempt on the ring's next
//! endpoint, with a short backoff between attempts. What happens when every
//! attempt fails is the [`FailurePolicy`]:
//!
//! | Policy | Output | On exhaustion |
//! |--------|--------|---------------|
//! | [`Escalate`] | `T` | `Err(RemoteOperation)` |
//! | [`DegradeToMiss`] | `Option<T>` | `Ok(None)`, logged |

use crate::ring::EndpointRing;
use gridstore_core::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// Pause between two attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_millis(100);

/// Outcome handling once attempts succeed or run out.
pub trait FailurePolicy {
    /// What a call under this policy yields
    type Output<T>;

    /// Wrap a successful attempt.
    fn success<T>(value: T) -> Self::Output<T>;

    /// Decide the result once every endpoint has failed.
    fn exhausted<T>(
        namespace: &str,
        operation: &'static str,
        attempts: usize,
        last: Option<Error>,
    ) -> Result<Self::Output<T>>;
}

fn exhaustion_message(last: Option<Error>) -> String {
    last.map(|e| e.to_string())
        .unwrap_or_else(|| "no eligible endpoint".to_string())
}

/// Failures surface as [`Error::RemoteOperation`].
#[derive(Debug, Clone, Copy)]
pub struct Escalate;

impl FailurePolicy for Escalate {
    type Output<T> = T;

    fn success<T>(value: T) -> T {
        value
    }

    fn exhausted<T>(
        namespace: &str,
        operation: &'static str,
        attempts: usize,
        last: Option<Error>,
    ) -> Result<T> {
        let message = exhaustion_message(last);
        tracing::error!(namespace, operation, attempts, error = %message, "remote operation failed on every endpoint");
        Err(Error::RemoteOperation {
            operation,
            attempts,
            message,
        })
    }
}

/// Failures are logged and reported as absent.
#[derive(Debug, Clone, Copy)]
pub struct DegradeToMiss;

impl FailurePolicy for DegradeToMiss {
    type Output<T> = Option<T>;

    fn success<T>(value: T) -> Option<T> {
        Some(value)
    }

    fn exhausted<T>(
        namespace: &str,
        operation: &'static str,
        attempts: usize,
        last: Option<Error>,
    ) -> Result<Option<T>> {
        warn!(namespace, operation, attempts, error = %exhaustion_message(last), "remote read failed on every endpoint; treating as miss");
        Ok(None)
    }
}

/// One remote operation retried over a ring.
#[derive(Debug)]
pub struct RetryAcrossEndpoints<'a> {
    ring: &'a EndpointRing,
    namespace: &'a str,
    operation: &'static str,
    backoff: Duration,
}

impl<'a> RetryAcrossEndpoints<'a> {
    /// Retry `operation` over `ring` with [`DEFAULT_BACKOFF`].
    pub fn new(ring: &'a EndpointRing, namespace: &'a str, operation: &'static str) -> Self {
        Self {
            ring,
            namespace,
            operation,
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Override the pause between attempts.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Run `attempt` against successive endpoints until one succeeds.
    pub fn run<P, T, F>(&self, mut attempt: F) -> Result<P::Output<T>>
    where
        P: FailurePolicy,
        F: FnMut(&str) -> Result<T>,
    {
        let attempts = self.ring.len();
        let mut last = None;
        for n in 0..attempts {
            let Some(endpoint) = self.ring.next_endpoint() else {
                break;
            };
            match attempt(&endpoint) {
                Ok(value) => return Ok(P::success(value)),
                Err(e) => {
                    debug!(
                        namespace = self.namespace,
                        operation = self.operation,
                        endpoint = %endpoint,
                        attempt = n + 1,
                        error = %e,
                        "remote attempt failed"
                    );
                    last = Some(e);
                    if n + 1 < attempts {
                        std::thread::sleep(self.backoff);
                    }
                }
            }
        }
        P::exhausted(self.namespace, self.operation, attempts, last)
    }
}
