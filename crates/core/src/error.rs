//! Error taxonomy for gridstore
//!
//! Every adapter reports failures through [`Error`]. The variants follow the
//! propagation policy of the persistence contract:
//!
//! | Variant | Raised when | Treatment |
//! |---------|-------------|-----------|
//! | Configuration | required option missing or unparseable | fatal at construction |
//! | Connectivity | no reachable endpoint / topology undiscoverable | fatal at construction, logged at refresh |
//! | Codec | payload cannot be encoded or decoded | miss on read, error on write |
//! | TransientRemote | a single endpoint attempt failed | retried on the next endpoint |
//! | RemoteOperation | every known endpoint failed | escalated (miss for single-key load) |
//! | Storage | embedded engine failure | escalated |
//! | Closed | adapter used after destroy | escalated |

use thiserror::Error;

/// All gridstore errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid configuration
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cluster topology cannot be discovered or no endpoint is reachable
    #[error("connectivity error: {0}")]
    Connectivity(String),

    /// Payload could not be encoded or decoded
    #[error("codec error: {0}")]
    Codec(String),

    /// One endpoint failed a single attempt
    #[error("remote call to {endpoint} failed: {message}")]
    TransientRemote {
        /// Endpoint the attempt was sent to
        endpoint: String,
        /// Failure description
        message: String,
    },

    /// A remote operation failed on every known endpoint
    #[error("{operation} failed after {attempts} attempt(s): {message}")]
    RemoteOperation {
        /// Operation kind (get, update, delete, commit, select)
        operation: &'static str,
        /// Number of attempts made
        attempts: usize,
        /// Last failure seen
        message: String,
    },

    /// Embedded storage engine failure
    #[error("storage error: {0}")]
    Storage(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The adapter has been destroyed
    #[error("store for namespace '{0}' is closed")]
    Closed(String),
}

/// Result type for gridstore operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build a storage error from any displayable engine error.
    pub fn storage(e: impl std::fmt::Display) -> Self {
        Error::Storage(e.to_string())
    }

    /// Build a codec error from any displayable serializer error.
    pub fn codec(e: impl std::fmt::Display) -> Self {
        Error::Codec(e.to_string())
    }

    /// Build a transient error for one endpoint attempt.
    pub fn transient(endpoint: impl Into<String>, e: impl std::fmt::Display) -> Self {
        Error::TransientRemote {
            endpoint: endpoint.into(),
            message: e.to_string(),
        }
    }

    /// Check if the failure is local to one endpoint and worth retrying elsewhere.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::TransientRemote { .. })
    }

    /// Check if this is a configuration error.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration(_))
    }

    /// Check if this is a codec error.
    pub fn is_codec(&self) -> bool {
        matches!(self, Error::Codec(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_is_retryable() {
        let err = Error::transient("http://node1:8983/solr/core1", "connection refused");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("node1"));
    }

    #[test]
    fn test_remote_operation_not_retryable() {
        let err = Error::RemoteOperation {
            operation: "update",
            attempts: 3,
            message: "timeout".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "update failed after 3 attempt(s): timeout");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_predicates() {
        assert!(Error::Configuration("x".into()).is_configuration());
        assert!(Error::codec("bad").is_codec());
        assert!(!Error::storage("disk").is_codec());
    }
}
