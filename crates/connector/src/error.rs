//! Error types for the connector.
//!
//! [`ConnectorError`] is what callers see. [`ClusterError`] describes a single
//! failed request against a live handle, and [`AttemptError`] is the
//! classification the connection manager uses to decide whether a failed
//! connection attempt is worth retrying.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Boxed error used to keep the cause of a failure without naming its type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

/// The primary error type for all connector operations.
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// A required setting is missing or invalid.
    #[error("invalid configuration for {variable}: {message}")]
    Configuration { variable: String, message: String },

    /// TLS material could not be read or parsed.
    #[error("certificate error in {origin}: {message}")]
    Certificate {
        origin: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The bounded retry budget was used up without a successful connection.
    #[error("could not connect to {host} after {attempts} attempts")]
    ConnectionExhausted { host: String, attempts: u32 },

    /// A protocol-level failure that retrying cannot fix.
    #[error("transport error while connecting to {host}: {message}")]
    Transport {
        host: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Any failure that could not be classified.
    #[error("unexpected error while connecting to {host}: {message}")]
    Unexpected {
        host: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// No client handle exists.
    #[error("not connected to {host}")]
    NotConnected { host: String },

    /// Releasing the client handle failed.
    #[error("error closing connection to {host}")]
    Close {
        host: String,
        #[source]
        source: ClusterError,
    },

    /// The retry loop was cancelled at a backoff boundary.
    #[error("connection to {host} cancelled after {attempts} attempts")]
    Cancelled { host: String, attempts: u32 },

    /// A request against a live handle failed.
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

impl ConnectorError {
    /// Returns true if this error came from the connection retry loop
    /// rather than from a request on a live handle.
    pub fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            ConnectorError::ConnectionExhausted { .. }
                | ConnectorError::Transport { .. }
                | ConnectorError::Unexpected { .. }
                | ConnectorError::Cancelled { .. }
        )
    }
}

/// Errors from a single request against the cluster.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// The cluster answered with a non-success status.
    #[error("{operation} failed with status {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// The request could not be sent or its response could not be read.
    #[error("{operation} request failed")]
    Request {
        operation: &'static str,
        #[source]
        source: BoxError,
    },

    /// The response body did not have the expected shape.
    #[error("failed to decode {operation} response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl ClusterError {
    /// Returns the HTTP status of an API error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClusterError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Classification of a failed connection attempt.
///
/// Only [`AttemptError::Recoverable`] leads to another attempt.
#[derive(Error, Debug)]
pub enum AttemptError {
    /// Network, connection or timeout failure.
    #[error("{message}")]
    Recoverable {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Protocol-level failure: the peer answered but not in a usable way.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Anything else, including failures to build the client.
    #[error("{message}")]
    Unexpected {
        message: String,
        #[source]
        source: Option<BoxError>,
    },
}

impl AttemptError {
    /// Creates a recoverable failure without an underlying cause.
    pub fn recoverable(message: impl Into<String>) -> Self {
        AttemptError::Recoverable {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a transport failure without an underlying cause.
    pub fn transport(message: impl Into<String>) -> Self {
        AttemptError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Creates an unexpected failure without an underlying cause.
    pub fn unexpected(message: impl Into<String>) -> Self {
        AttemptError::Unexpected {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true if another attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AttemptError::Recoverable { .. })
    }

    /// Converts an aborting failure into the caller-facing error.
    ///
    /// Recoverable failures are never surfaced directly; if one reaches this
    /// point it is reported as unexpected.
    pub(crate) fn into_connector_error(self, host: &str) -> ConnectorError {
        match self {
            AttemptError::Transport { message, source } => ConnectorError::Transport {
                host: host.to_string(),
                message,
                source,
            },
            AttemptError::Recoverable { message, source }
            | AttemptError::Unexpected { message, source } => ConnectorError::Unexpected {
                host: host.to_string(),
                message,
                source,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_error_conversion() {
        let err = AttemptError::transport("bad status line").into_connector_error("https://es:9200");
        assert!(matches!(err, ConnectorError::Transport { .. }));
        assert!(err.to_string().contains("https://es:9200"));

        let err = AttemptError::unexpected("boom").into_connector_error("https://es:9200");
        assert!(matches!(err, ConnectorError::Unexpected { .. }));
    }

    #[test]
    fn test_connection_failure_classification() {
        let exhausted = ConnectorError::ConnectionExhausted {
            host: "h".to_string(),
            attempts: 3,
        };
        assert!(exhausted.is_connection_failure());

        let not_connected = ConnectorError::NotConnected {
            host: "h".to_string(),
        };
        assert!(!not_connected.is_connection_failure());
    }

    #[test]
    fn test_cluster_error_status() {
        let err = ClusterError::Api {
            operation: "search",
            status: 404,
            body: "{}".to_string(),
        };
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.to_string(), "search failed with status 404: {}");
    }
}
