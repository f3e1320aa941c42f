//! Resilient Elasticsearch connector.
//!
//! This crate keeps a connection to a single Elasticsearch node authenticated
//! with basic credentials and mutual TLS, recovers from transient failures
//! with bounded or persistent retry, and composes search requests from
//! independently optional fragments.
//!
//! # Architecture
//!
//! - [`tls`] - Mutual-TLS context from PEM files
//! - [`settings`] - Credentials and retry settings from the environment
//! - [`client`] - The [`ClusterClient`] / [`ClientFactory`] seam
//! - [`transport`] - Production client over the `elasticsearch` crate
//! - [`connection`] - Connection state, retry loop, liveness and close
//! - [`query`] - Search request composition
//! - [`cluster`] - Index lifecycle, metadata, info, health and search
//! - [`kibana`] - Kibana dashboard/space/data-view counts
//! - [`error`] - Error types for all operations
//!
//! # Quick Start
//!
//! ```no_run
//! use elk_connector::{Cluster, ClusterSettings, SearchOptions, SearchOutcome};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), elk_connector::ConnectorError> {
//! let settings = ClusterSettings::from_env()?;
//! let cluster = Cluster::from_settings(&settings)?;
//! cluster.connect().await?;
//!
//! let options = SearchOptions::new()
//!     .with_query(json!({ "match_all": {} }))
//!     .with_filter(json!({ "term": { "active": true } }))
//!     .with_limit(100);
//!
//! if let SearchOutcome::Found(response) = cluster.search("people", &options).await? {
//!     println!("{} hits", response.total());
//! }
//!
//! cluster.close().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Retry
//!
//! ```
//! use std::time::Duration;
//! use elk_connector::RetryPolicy;
//!
//! let bounded = RetryPolicy::bounded(5).unwrap().with_backoff(Duration::from_secs(1));
//! assert!(!bounded.is_persistent());
//!
//! assert!(RetryPolicy::persistent().is_persistent());
//! assert!(RetryPolicy::bounded(0).is_err());
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod client;
pub mod cluster;
pub mod connection;
pub mod error;
pub mod kibana;
pub mod query;
pub mod settings;
pub mod tls;
pub mod transport;

// Re-export commonly used types at crate root
pub use client::{ClientFactory, ClusterClient};
pub use cluster::{
    Cluster, ClusterHealth, ClusterInfo, CreateIndexOutcome, EsCluster, IndexInfo, SearchOutcome,
    SearchResponse,
};
pub use connection::{
    CancelHandle, ConnectionManager, ConnectionState, MaxAttempts, RetryPolicy, StateView,
};
pub use error::{AttemptError, ClusterError, ConnectorError, ConnectorResult};
pub use kibana::{KibanaClient, KibanaSummary};
pub use query::{SearchOptions, SearchRequest, compose_search};
pub use settings::{ClusterCredentials, ClusterSettings};
pub use tls::TlsContext;
pub use transport::{EsClientFactory, EsClusterClient};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
