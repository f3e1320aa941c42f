//! The seam between the connector and the cluster's HTTP API.
//!
//! [`ClusterClient`] lists every remote call the connection manager and the
//! cluster facade make. [`ClientFactory`] builds a fresh client for each
//! connection attempt. The production pair lives in [`crate::transport`];
//! tests plug in doubles.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AttemptError, ClusterError};
use crate::query::SearchRequest;

/// A handle to a cluster.
///
/// Implementations must be cheap to probe: [`ClusterClient::ping`] is called on
/// every liveness check.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// Issues a liveness probe.
    ///
    /// The error is classified so the connection manager can decide whether
    /// another attempt is worthwhile.
    async fn ping(&self) -> Result<(), AttemptError>;

    /// Returns the cluster root document (name, version, tagline).
    async fn info(&self) -> Result<Value, ClusterError>;

    /// Returns the cluster health document.
    async fn health(&self) -> Result<Value, ClusterError>;

    /// Returns whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, ClusterError>;

    /// Creates an index with the given settings and mappings.
    async fn create_index(&self, index: &str, body: Value) -> Result<Value, ClusterError>;

    /// Deletes an index.
    async fn delete_index(&self, index: &str) -> Result<Value, ClusterError>;

    /// Points an alias at an index.
    async fn put_alias(&self, index: &str, alias: &str) -> Result<Value, ClusterError>;

    /// Indexes a document with a generated id.
    async fn index_document(&self, index: &str, document: Value) -> Result<Value, ClusterError>;

    /// Returns the number of documents in an index.
    async fn count(&self, index: &str) -> Result<u64, ClusterError>;

    /// Returns the aliases of an index.
    async fn get_alias(&self, index: &str) -> Result<Value, ClusterError>;

    /// Returns the mappings of an index.
    async fn get_mapping(&self, index: &str) -> Result<Value, ClusterError>;

    /// Returns the settings of an index.
    async fn get_settings(&self, index: &str) -> Result<Value, ClusterError>;

    /// Executes a composed search request.
    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Value, ClusterError>;

    /// Releases the handle's resources.
    async fn close(&self) -> Result<(), ClusterError> {
        Ok(())
    }
}

/// Builds cluster clients for the connection manager.
pub trait ClientFactory: Send + Sync {
    /// The client type produced by this factory.
    type Client: ClusterClient;

    /// The host clients connect to, for logging and error messages.
    fn host(&self) -> &str;

    /// Builds a new, not yet probed, client.
    fn build(&self) -> Result<Self::Client, AttemptError>;
}
