//! Cluster operations facade.
//!
//! [`Cluster`] is what driving programs use. Every operation first runs the
//! connection manager's liveness-gated recovery path, so a dropped connection
//! is re-established transparently before the request is sent. Access to the
//! handle is serialized: at most one request is in flight per cluster.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::client::{ClientFactory, ClusterClient};
use crate::connection::{CancelHandle, ConnectionManager, ConnectionState, RetryPolicy, StateView};
use crate::error::{ClusterError, ConnectorResult};
use crate::query::{SearchOptions, SearchRequest, compose_search};
use crate::settings::ClusterSettings;
use crate::transport::EsClientFactory;

/// Result of [`Cluster::create_index`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateIndexOutcome {
    /// The index was created.
    Created,
    /// An index with that name already existed; nothing was changed.
    AlreadyExists,
}

/// Metadata about one index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    /// Index name as requested.
    pub name: String,
    /// Whether the index exists.
    pub exists: bool,
    /// Number of documents.
    pub doc_count: u64,
    /// Alias document as returned by the cluster.
    pub aliases: Value,
    /// Mapping document as returned by the cluster.
    pub mappings: Value,
    /// Settings document as returned by the cluster.
    pub settings: Value,
}

/// Version block of the cluster root document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterVersion {
    /// Version string, e.g. `8.15.0`.
    pub number: String,
}

/// The cluster root document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterInfo {
    /// Cluster name.
    pub cluster_name: String,
    /// Server version.
    pub version: ClusterVersion,
    #[serde(default)]
    /// Greeting line.
    pub tagline: String,
}

/// Cluster health summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterHealth {
    /// Cluster name.
    pub cluster_name: String,
    /// `green`, `yellow` or `red`.
    pub status: String,
    /// Nodes in the cluster.
    pub number_of_nodes: u32,
    /// Data nodes in the cluster.
    pub number_of_data_nodes: u32,
    /// Active primary shards.
    pub active_primary_shards: u32,
    /// Active shards, primaries and replicas.
    pub active_shards: u32,
    /// Shards being moved between nodes.
    pub relocating_shards: u32,
    /// Shards being initialized.
    pub initializing_shards: u32,
    /// Shards not assigned to any node.
    pub unassigned_shards: u32,
}

/// Total hit count as reported by the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TotalHits {
    /// Hit count.
    pub value: u64,
    #[serde(default)]
    /// `eq` for an exact count, `gte` for a lower bound.
    pub relation: String,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    /// Index the hit came from.
    pub index: String,
    #[serde(rename = "_id")]
    /// Document id.
    pub id: String,
    #[serde(rename = "_score", default)]
    /// Relevance score, absent when sorting by field.
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    /// Stored document.
    pub source: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Sort values of the hit.
    pub sort: Option<Vec<Value>>,
}

/// The `hits` block of a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hits {
    #[serde(default)]
    /// Total hit count.
    pub total: Option<TotalHits>,
    #[serde(default)]
    /// Highest score among hits.
    pub max_score: Option<f64>,
    #[serde(default)]
    /// Returned page of hits.
    pub hits: Vec<Hit>,
}

/// A decoded search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    /// Server-side time in milliseconds.
    pub took: u64,
    #[serde(default)]
    /// Whether the search hit its timeout.
    pub timed_out: bool,
    /// Hit block.
    pub hits: Hits,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Aggregation results by name.
    pub aggregations: Option<Map<String, Value>>,
}

impl SearchResponse {
    /// Returns the total hit count, or the number of returned hits if the
    /// cluster did not report one.
    pub fn total(&self) -> u64 {
        self.hits
            .total
            .as_ref()
            .map(|t| t.value)
            .unwrap_or(self.hits.hits.len() as u64)
    }

    /// Returns the `_source` of every hit, in order.
    pub fn sources(&self) -> impl Iterator<Item = &Value> {
        self.hits.hits.iter().map(|h| &h.source)
    }
}

/// Result of [`Cluster::search`].
///
/// A search against a missing index is not an error, but it is also not an
/// empty result set; callers can tell the two apart.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// The search ran; the response may hold zero hits.
    Found(SearchResponse),
    /// The index does not exist.
    IndexMissing,
}

impl SearchOutcome {
    /// Returns the response if the search ran.
    pub fn response(&self) -> Option<&SearchResponse> {
        match self {
            SearchOutcome::Found(response) => Some(response),
            SearchOutcome::IndexMissing => None,
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(
    operation: &'static str,
    body: Value,
) -> Result<T, ClusterError> {
    serde_json::from_value(body).map_err(|e| ClusterError::Decode {
        operation,
        message: e.to_string(),
    })
}

/// The production facade.
pub type EsCluster = Cluster<EsClientFactory>;

/// Cluster operations over a managed connection.
pub struct Cluster<F: ClientFactory> {
    manager: Mutex<ConnectionManager<F>>,
    host: String,
    state: StateView,
    cancel: CancelHandle,
}

impl<F: ClientFactory> std::fmt::Debug for Cluster<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("host", &self.host)
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl Cluster<EsClientFactory> {
    /// Reads the TLS material named by `settings` and creates a facade over
    /// the production client.
    pub fn from_settings(settings: &ClusterSettings) -> ConnectorResult<Self> {
        let factory = EsClientFactory::from_credentials(settings.credentials.clone())?;
        Ok(Self::new(factory, settings.retry))
    }
}

impl<F: ClientFactory> Cluster<F> {
    /// Creates a facade over a new, disconnected manager.
    pub fn new(factory: F, policy: RetryPolicy) -> Self {
        Self::from_manager(ConnectionManager::new(factory, policy))
    }

    /// Creates a facade over an existing manager.
    pub fn from_manager(manager: ConnectionManager<F>) -> Self {
        Self {
            host: manager.host().to_string(),
            state: manager.state_view(),
            cancel: manager.cancel_handle(),
            manager: Mutex::new(manager),
        }
    }

    /// Returns the host this cluster connects to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the connection state without waiting for in-flight work.
    pub fn state(&self) -> ConnectionState {
        self.state.get()
    }

    /// Returns a handle that cancels connection retries.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Establishes the connection.
    pub async fn connect(&self) -> ConnectorResult<()> {
        self.manager.lock().await.connect().await.map(|_| ())
    }

    /// Returns whether the current handle answers the liveness probe.
    pub async fn is_alive(&self) -> bool {
        self.manager.lock().await.is_alive().await
    }

    /// Releases the connection.
    pub async fn close(&self) -> ConnectorResult<()> {
        self.manager.lock().await.close().await
    }

    /// Returns the cluster root document.
    pub async fn info(&self) -> ConnectorResult<ClusterInfo> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;
        let info: ClusterInfo = decode("info", client.info().await?)?;
        info!(
            cluster_name = %info.cluster_name,
            version = %info.version.number,
            tagline = %info.tagline,
            "Cluster info"
        );
        Ok(info)
    }

    /// Returns the cluster health summary.
    pub async fn health(&self) -> ConnectorResult<ClusterHealth> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;
        let health: ClusterHealth = decode("cluster health", client.health().await?)?;
        info!(
            cluster_name = %health.cluster_name,
            status = %health.status,
            nodes = health.number_of_nodes,
            data_nodes = health.number_of_data_nodes,
            active_primary_shards = health.active_primary_shards,
            active_shards = health.active_shards,
            relocating_shards = health.relocating_shards,
            initializing_shards = health.initializing_shards,
            unassigned_shards = health.unassigned_shards,
            "Cluster health"
        );
        Ok(health)
    }

    /// Creates an index unless one with that name already exists.
    pub async fn create_index(&self, index: &str, body: Value) -> ConnectorResult<CreateIndexOutcome> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;

        if client.index_exists(index).await? {
            info!(index = %index, "Index already exists");
            return Ok(CreateIndexOutcome::AlreadyExists);
        }

        let response = client.create_index(index, body).await?;
        info!(index = %index, response = %response, "Index created");
        Ok(CreateIndexOutcome::Created)
    }

    /// Deletes an index.
    pub async fn delete_index(&self, index: &str) -> ConnectorResult<()> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;
        let response = client.delete_index(index).await?;
        info!(index = %index, response = %response, "Index deleted");
        Ok(())
    }

    /// Points `alias` at `index`.
    pub async fn put_alias(&self, index: &str, alias: &str) -> ConnectorResult<()> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;
        let response = client.put_alias(index, alias).await?;
        info!(index = %index, alias = %alias, response = %response, "Alias created");
        Ok(())
    }

    /// Indexes a document and returns the cluster's acknowledgement.
    pub async fn index_document(&self, index: &str, document: Value) -> ConnectorResult<Value> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;
        let response = client.index_document(index, document).await?;
        debug!(index = %index, id = ?response.get("_id"), "Document indexed");
        Ok(response)
    }

    /// Returns the number of documents in an index.
    pub async fn get_index_total_docs(&self, index: &str) -> ConnectorResult<u64> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;
        Ok(client.count(index).await?)
    }

    /// Collects existence, document count, aliases, mappings and settings.
    pub async fn get_index_info(&self, index: &str) -> ConnectorResult<IndexInfo> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;

        Ok(IndexInfo {
            name: index.to_string(),
            exists: client.index_exists(index).await?,
            doc_count: client.count(index).await?,
            aliases: client.get_alias(index).await?,
            mappings: client.get_mapping(index).await?,
            settings: client.get_settings(index).await?,
        })
    }

    /// Composes and executes a search.
    pub async fn search(&self, index: &str, options: &SearchOptions) -> ConnectorResult<SearchOutcome> {
        let mut manager = self.manager.lock().await;
        let client = manager.live_client().await?;

        debug!(
            index = %index,
            query = ?options.query,
            filters = options.filters.len(),
            sort = ?options.sort,
            limit = options.limit,
            offset = options.offset,
            "Received search parameters"
        );

        if !client.index_exists(index).await? {
            warn!(index = %index, "Index does not exist");
            return Ok(SearchOutcome::IndexMissing);
        }

        let request: SearchRequest = compose_search(options);
        let body = match client.search(index, &request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(index = %index, error = %e, "Failed to execute search");
                return Err(e.into());
            }
        };
        let response: SearchResponse = decode("search", body)?;

        info!(
            index = %index,
            total = response.total(),
            returned = response.hits.hits.len(),
            "Search executed"
        );
        Ok(SearchOutcome::Found(response))
    }
}
