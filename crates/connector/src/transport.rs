//! Production cluster client over the `elasticsearch` crate.
//!
//! [`EsClientFactory`] builds a single-node transport per connection attempt,
//! authenticated with basic credentials and the mutual-TLS identity from a
//! [`TlsContext`]. [`EsClusterClient`] maps each [`ClusterClient`] call onto
//! the corresponding API endpoint.

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use elasticsearch::auth::Credentials;
use elasticsearch::cluster::ClusterHealthParts;
use elasticsearch::http::StatusCode;
use elasticsearch::http::headers::{AUTHORIZATION, HeaderMap, HeaderValue};
use elasticsearch::http::response::Response;
use elasticsearch::http::transport::{SingleNodeConnectionPool, Transport, TransportBuilder};
use elasticsearch::indices::{
    IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts, IndicesGetAliasParts,
    IndicesGetMappingParts, IndicesGetSettingsParts, IndicesPutAliasParts,
};
use elasticsearch::{CountParts, Elasticsearch, IndexParts, SearchParts};
use serde_json::Value;

use crate::client::{ClientFactory, ClusterClient};
use crate::error::{AttemptError, ClusterError, ConnectorResult};
use crate::query::SearchRequest;
use crate::settings::ClusterCredentials;
use crate::tls::TlsContext;

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Classifies a transport failure for the retry loop.
///
/// Timeouts and failures that never produced an HTTP status are network
/// problems and worth retrying. A status or an undecodable body means the
/// peer answered in a way another attempt will not change.
pub fn classify(error: elasticsearch::Error) -> AttemptError {
    let message = error.to_string();
    if error.is_timeout() {
        AttemptError::Recoverable {
            message: format!("request timed out: {}", message),
            source: Some(Box::new(error)),
        }
    } else if error.is_json() || error.status_code().is_some() {
        AttemptError::Transport {
            message,
            source: Some(Box::new(error)),
        }
    } else {
        AttemptError::Recoverable {
            message: format!("connection error: {}", message),
            source: Some(Box::new(error)),
        }
    }
}

fn request_error(operation: &'static str, error: elasticsearch::Error) -> ClusterError {
    ClusterError::Request {
        operation,
        source: Box::new(error),
    }
}

/// Fails on non-success statuses, keeping the body for diagnostics.
async fn check_status(operation: &'static str, response: Response) -> Result<Response, ClusterError> {
    let status = response.status_code();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClusterError::Api {
        operation,
        status: status.as_u16(),
        body,
    })
}

async fn json_body(operation: &'static str, response: Response) -> Result<Value, ClusterError> {
    let response = check_status(operation, response).await?;
    response
        .json::<Value>()
        .await
        .map_err(|e| ClusterError::Decode {
            operation,
            message: e.to_string(),
        })
}

/// Builds [`EsClusterClient`]s for one cluster.
#[derive(Clone)]
pub struct EsClientFactory {
    credentials: ClusterCredentials,
    tls: TlsContext,
    host: String,
    request_timeout: Duration,
}

impl Debug for EsClientFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EsClientFactory")
            .field("host", &self.host)
            .field("username", &self.credentials.username())
            .field("tls", &self.tls)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl EsClientFactory {
    /// Creates a factory sharing one TLS context across all clients.
    pub fn new(credentials: ClusterCredentials, tls: TlsContext) -> Self {
        let host = credentials.host().as_str().trim_end_matches('/').to_string();
        tracing::info!(
            host = %host,
            username = %credentials.username(),
            "Using Elasticsearch host"
        );
        Self {
            credentials,
            tls,
            host,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Reads the TLS material named by `credentials` and creates a factory.
    pub fn from_credentials(credentials: ClusterCredentials) -> ConnectorResult<Self> {
        let tls = TlsContext::from_files(
            credentials.ca_cert(),
            credentials.client_cert(),
            credentials.client_key(),
        )?;
        Ok(Self::new(credentials, tls))
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn basic_auth_header(&self) -> Result<HeaderValue, AttemptError> {
        let token = STANDARD.encode(format!(
            "{}:{}",
            self.credentials.username(),
            self.credentials.password()
        ));
        let mut value = HeaderValue::from_str(&format!("Basic {}", token))
            .map_err(|e| AttemptError::unexpected(format!("invalid credentials header: {}", e)))?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn build_transport(&self) -> Result<Transport, AttemptError> {
        let url = self.credentials.host().clone();
        let conn_pool = SingleNodeConnectionPool::new(url);

        let validation = self
            .tls
            .certificate_validation()
            .map_err(|e| AttemptError::Unexpected {
                message: e.to_string(),
                source: Some(Box::new(e)),
            })?;

        // Credentials carry the client certificate; basic auth goes in a default header
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, self.basic_auth_header()?);

        TransportBuilder::new(conn_pool)
            .timeout(self.request_timeout)
            .cert_validation(validation)
            .auth(Credentials::Certificate(self.tls.client_identity()))
            .headers(headers)
            .build()
            .map_err(|e| AttemptError::Unexpected {
                message: format!("failed to build transport: {}", e),
                source: Some(Box::new(e)),
            })
    }
}

impl ClientFactory for EsClientFactory {
    type Client = EsClusterClient;

    fn host(&self) -> &str {
        &self.host
    }

    fn build(&self) -> Result<EsClusterClient, AttemptError> {
        Ok(EsClusterClient::from_transport(self.build_transport()?))
    }
}

/// A cluster handle backed by the official client.
#[derive(Debug, Clone)]
pub struct EsClusterClient {
    client: Elasticsearch,
}

impl EsClusterClient {
    /// Wraps an already configured transport.
    pub fn from_transport(transport: Transport) -> Self {
        Self {
            client: Elasticsearch::new(transport),
        }
    }

    /// Returns the underlying client.
    pub fn inner(&self) -> &Elasticsearch {
        &self.client
    }
}

#[async_trait]
impl ClusterClient for EsClusterClient {
    async fn ping(&self) -> Result<(), AttemptError> {
        let response = self.client.ping().send().await.map_err(classify)?;
        let status = response.status_code();
        match status {
            s if s.is_success() => Ok(()),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AttemptError::transport(
                format!("ping rejected with status {}", status),
            )),
            _ => Err(AttemptError::recoverable(format!(
                "ping failed with status {}",
                status
            ))),
        }
    }

    async fn info(&self) -> Result<Value, ClusterError> {
        let response = self
            .client
            .info()
            .send()
            .await
            .map_err(|e| request_error("info", e))?;
        json_body("info", response).await
    }

    async fn health(&self) -> Result<Value, ClusterError> {
        let response = self
            .client
            .cluster()
            .health(ClusterHealthParts::None)
            .send()
            .await
            .map_err(|e| request_error("cluster health", e))?;
        json_body("cluster health", response).await
    }

    async fn index_exists(&self, index: &str) -> Result<bool, ClusterError> {
        let response = self
            .client
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| request_error("index exists", e))?;

        match response.status_code() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => Err(ClusterError::Api {
                operation: "index exists",
                status: s.as_u16(),
                body: String::new(),
            }),
        }
    }

    async fn create_index(&self, index: &str, body: Value) -> Result<Value, ClusterError> {
        let response = self
            .client
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(body)
            .send()
            .await
            .map_err(|e| request_error("create index", e))?;
        json_body("create index", response).await
    }

    async fn delete_index(&self, index: &str) -> Result<Value, ClusterError> {
        let response = self
            .client
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| request_error("delete index", e))?;
        json_body("delete index", response).await
    }

    async fn put_alias(&self, index: &str, alias: &str) -> Result<Value, ClusterError> {
        let response = self
            .client
            .indices()
            .put_alias(IndicesPutAliasParts::IndexName(&[index], alias))
            .send()
            .await
            .map_err(|e| request_error("put alias", e))?;
        json_body("put alias", response).await
    }

    async fn index_document(&self, index: &str, document: Value) -> Result<Value, ClusterError> {
        let response = self
            .client
            .index(IndexParts::Index(index))
            .body(document)
            .send()
            .await
            .map_err(|e| request_error("index document", e))?;
        json_body("index document", response).await
    }

    async fn count(&self, index: &str) -> Result<u64, ClusterError> {
        let response = self
            .client
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| request_error("count", e))?;
        let body = json_body("count", response).await?;
        body.get("count")
            .and_then(Value::as_u64)
            .ok_or_else(|| ClusterError::Decode {
                operation: "count",
                message: format!("missing count in {}", body),
            })
    }

    async fn get_alias(&self, index: &str) -> Result<Value, ClusterError> {
        let response = self
            .client
            .indices()
            .get_alias(IndicesGetAliasParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| request_error("get alias", e))?;
        json_body("get alias", response).await
    }

    async fn get_mapping(&self, index: &str) -> Result<Value, ClusterError> {
        let response = self
            .client
            .indices()
            .get_mapping(IndicesGetMappingParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| request_error("get mapping", e))?;
        json_body("get mapping", response).await
    }

    async fn get_settings(&self, index: &str) -> Result<Value, ClusterError> {
        let response = self
            .client
            .indices()
            .get_settings(IndicesGetSettingsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| request_error("get settings", e))?;
        json_body("get settings", response).await
    }

    async fn search(&self, index: &str, request: &SearchRequest) -> Result<Value, ClusterError> {
        let response = self
            .client
            .search(SearchParts::Index(&[index]))
            .body(request.to_value())
            .send()
            .await
            .map_err(|e| request_error("search", e))?;
        json_body("search", response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CA: &[u8] = include_bytes!("../tests/fixtures/ca.pem");
    const CERT: &[u8] = include_bytes!("../tests/fixtures/client.pem");
    const KEY: &[u8] = include_bytes!("../tests/fixtures/client.key");

    fn factory() -> EsClientFactory {
        let credentials = ClusterCredentials::new(
            "https://es.internal:9200/",
            "elastic",
            "changeme",
            "/unused/ca.pem",
            "/unused/client.pem",
            "/unused/client.key",
        )
        .unwrap();
        let tls = TlsContext::from_pem(CA, CERT, KEY).unwrap();
        EsClientFactory::new(credentials, tls)
    }

    #[test]
    fn test_factory_host_has_no_trailing_slash() {
        assert_eq!(factory().host(), "https://es.internal:9200");
    }

    #[test]
    fn test_basic_auth_header() {
        let header = factory().basic_auth_header().unwrap();
        assert!(header.is_sensitive());
        assert_eq!(
            header.to_str().unwrap(),
            format!("Basic {}", STANDARD.encode("elastic:changeme"))
        );
    }

    #[test]
    fn test_factory_debug_hides_password() {
        let debug = format!("{:?}", factory());
        assert!(!debug.contains("changeme"));
    }
}
