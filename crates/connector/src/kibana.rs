//! Kibana metadata client.
//!
//! Reports how many dashboards, spaces and data views a Kibana instance
//! holds. Failures never propagate: an unreachable or misbehaving Kibana
//! yields an all-zero summary.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use url::Url;

use crate::error::{ConnectorError, ConnectorResult};

/// Timeout applied to every Kibana request.
pub const KIBANA_TIMEOUT: Duration = Duration::from_secs(10);

const DASHBOARDS_PATH: &str = "/api/saved_objects/_find?type=dashboard";
const SPACES_PATH: &str = "/api/spaces/space";
const DATA_VIEWS_PATH: &str = "/api/data_views";

/// Object counts reported by Kibana.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KibanaSummary {
    /// Saved dashboards.
    pub dashboards: usize,
    /// Spaces.
    pub spaces: usize,
    /// Data views.
    #[serde(rename = "dataViews")]
    pub data_views: usize,
}

/// Client for the Kibana HTTP API.
#[derive(Clone)]
pub struct KibanaClient {
    http: Client,
    base: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for KibanaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KibanaClient")
            .field("base", &self.base)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl KibanaClient {
    /// Creates a client for the Kibana instance at `host`.
    pub fn new(
        host: &Url,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> ConnectorResult<Self> {
        let base = host.as_str().trim_end_matches('/').to_string();
        let http = Client::builder()
            .timeout(KIBANA_TIMEOUT)
            .build()
            .map_err(|e| ConnectorError::Unexpected {
                host: base.clone(),
                message: format!("failed to build HTTP client: {}", e),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base,
            username: username.into(),
            password: password.into(),
        })
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base
    }

    /// Counts dashboards, spaces and data views.
    ///
    /// If any of the three requests fails, the whole summary is zero.
    pub async fn summary(&self) -> KibanaSummary {
        match self.fetch_summary().await {
            Ok(summary) => {
                info!(
                    dashboards = summary.dashboards,
                    spaces = summary.spaces,
                    data_views = summary.data_views,
                    "Kibana info"
                );
                summary
            }
            Err(e) => {
                warn!(host = %self.base, error = %e, "Error retrieving Kibana data");
                KibanaSummary::default()
            }
        }
    }

    async fn fetch_summary(&self) -> Result<KibanaSummary, reqwest::Error> {
        let dashboards = self.get(DASHBOARDS_PATH).await?;
        let spaces = self.get(SPACES_PATH).await?;
        let data_views = self.get(DATA_VIEWS_PATH).await?;

        Ok(KibanaSummary {
            dashboards: array_len(dashboards.get("saved_objects")),
            spaces: array_len(Some(&spaces)),
            data_views: array_len(data_views.get("data_view")),
        })
    }

    async fn get(&self, path: &str) -> Result<Value, reqwest::Error> {
        self.http
            .get(format!("{}{}", self.base, path))
            .basic_auth(&self.username, Some(&self.password))
            .header("kbn-xsrf", "true")
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await
    }
}

fn array_len(value: Option<&Value>) -> usize {
    value.and_then(Value::as_array).map_or(0, Vec::len)
}
