//! Connection settings.
//!
//! Settings are normally sourced from the process environment.
//! Every credential is required; a missing or empty variable fails fast with
//! [`ConnectorError::Configuration`] instead of producing a half-filled value.
//!
//! # Environment Variables
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `ELK_HOST` | yes | Cluster URL |
//! | `ELK_USERNAME` | yes | Basic auth user |
//! | `ELK_PASSWORD` | yes | Basic auth password |
//! | `ELK_CA_CERT` | yes | CA bundle (PEM) |
//! | `ELK_CERT` | yes | Client certificate chain (PEM) |
//! | `ELK_KEY` | yes | Client private key (PEM) |
//! | `KIBANA_HOST` | yes | Kibana URL |
//! | `ELK_MAX_RETRIES` | no (25) | Connection attempts before giving up |
//! | `ELK_RETRY_DELAY` | no (3s) | Backoff between attempts, e.g. `500ms` |
//! | `ELK_PERSISTENT` | no (false) | Retry forever |

use std::fmt::Debug;
use std::path::PathBuf;

use url::Url;

use crate::connection::{MaxAttempts, RetryPolicy};
use crate::error::{ConnectorError, ConnectorResult};

/// Cluster URL.
pub const ENV_HOST: &str = "ELK_HOST";
/// Basic auth user.
pub const ENV_USERNAME: &str = "ELK_USERNAME";
/// Basic auth password.
pub const ENV_PASSWORD: &str = "ELK_PASSWORD";
/// Path of the CA bundle.
pub const ENV_CA_CERT: &str = "ELK_CA_CERT";
/// Path of the client certificate chain.
pub const ENV_CLIENT_CERT: &str = "ELK_CERT";
/// Path of the client private key.
pub const ENV_CLIENT_KEY: &str = "ELK_KEY";
/// Kibana base URL.
pub const ENV_KIBANA_HOST: &str = "KIBANA_HOST";
/// Connection attempt budget.
pub const ENV_MAX_RETRIES: &str = "ELK_MAX_RETRIES";
/// Wait between connection attempts, as a humantime duration.
pub const ENV_RETRY_DELAY: &str = "ELK_RETRY_DELAY";
/// Retry forever when true.
pub const ENV_PERSISTENT: &str = "ELK_PERSISTENT";

/// Credentials for one cluster. Immutable once built.
#[derive(Clone)]
pub struct ClusterCredentials {
    host: Url,
    username: String,
    password: String,
    ca_cert: PathBuf,
    client_cert: PathBuf,
    client_key: PathBuf,
}

impl Debug for ClusterCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterCredentials")
            .field("host", &self.host.as_str())
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ca_cert", &self.ca_cert)
            .field("client_cert", &self.client_cert)
            .field("client_key", &self.client_key)
            .finish()
    }
}

impl ClusterCredentials {
    /// Creates credentials, validating the host URL.
    pub fn new(
        host: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        ca_cert: impl Into<PathBuf>,
        client_cert: impl Into<PathBuf>,
        client_key: impl Into<PathBuf>,
    ) -> ConnectorResult<Self> {
        Ok(Self {
            host: parse_url(ENV_HOST, host)?,
            username: username.into(),
            password: password.into(),
            ca_cert: ca_cert.into(),
            client_cert: client_cert.into(),
            client_key: client_key.into(),
        })
    }

    /// Cluster URL.
    pub fn host(&self) -> &Url {
        &self.host
    }

    /// Basic auth user.
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Basic auth password.
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Path of the CA bundle.
    pub fn ca_cert(&self) -> &PathBuf {
        &self.ca_cert
    }

    /// Path of the client certificate chain.
    pub fn client_cert(&self) -> &PathBuf {
        &self.client_cert
    }

    /// Path of the client private key.
    pub fn client_key(&self) -> &PathBuf {
        &self.client_key
    }
}

/// Everything needed to reach the cluster and its Kibana instance.
#[derive(Debug, Clone)]
pub struct ClusterSettings {
    /// Cluster endpoint, login and TLS material.
    pub credentials: ClusterCredentials,
    /// Kibana base URL.
    pub kibana_host: Url,
    /// Connection retry policy.
    pub retry: RetryPolicy,
}

impl ClusterSettings {
    /// Reads settings from the process environment.
    pub fn from_env() -> ConnectorResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads settings through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> ConnectorResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| -> ConnectorResult<String> {
            match lookup(name) {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(ConnectorError::Configuration {
                    variable: name.to_string(),
                    message: "variable is not set".to_string(),
                }),
            }
        };
        let optional = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let host = required(ENV_HOST)?;
        let username = required(ENV_USERNAME)?;
        let password = required(ENV_PASSWORD)?;
        let ca_cert = required(ENV_CA_CERT)?;
        let client_cert = required(ENV_CLIENT_CERT)?;
        let client_key = required(ENV_CLIENT_KEY)?;
        let kibana_host = parse_url(ENV_KIBANA_HOST, &required(ENV_KIBANA_HOST)?)?;

        let credentials =
            ClusterCredentials::new(&host, username, password, ca_cert, client_cert, client_key)?;

        let persistent = match optional(ENV_PERSISTENT) {
            Some(value) => parse_bool(ENV_PERSISTENT, &value)?,
            None => false,
        };

        // Checked even when persistent
        let max_attempts = match optional(ENV_MAX_RETRIES) {
            Some(value) => {
                let attempts = value.trim().parse::<u32>().map_err(|e| {
                    ConnectorError::Configuration {
                        variable: ENV_MAX_RETRIES.to_string(),
                        message: e.to_string(),
                    }
                })?;
                MaxAttempts::bounded(attempts).ok_or_else(|| ConnectorError::Configuration {
                    variable: ENV_MAX_RETRIES.to_string(),
                    message: "must be at least 1".to_string(),
                })?
            }
            None => MaxAttempts::default(),
        };

        let mut retry = if persistent {
            RetryPolicy::persistent()
        } else {
            RetryPolicy {
                max_attempts,
                ..RetryPolicy::default()
            }
        };

        if let Some(value) = optional(ENV_RETRY_DELAY) {
            let delay = humantime::parse_duration(value.trim()).map_err(|e| {
                ConnectorError::Configuration {
                    variable: ENV_RETRY_DELAY.to_string(),
                    message: e.to_string(),
                }
            })?;
            retry = retry.with_backoff(delay);
        }

        Ok(Self {
            credentials,
            kibana_host,
            retry,
        })
    }
}

fn parse_url(variable: &str, value: &str) -> ConnectorResult<Url> {
    let url = Url::parse(value).map_err(|e| ConnectorError::Configuration {
        variable: variable.to_string(),
        message: format!("invalid URL '{}': {}", value, e),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConnectorError::Configuration {
            variable: variable.to_string(),
            message: format!("unsupported scheme '{}'", url.scheme()),
        });
    }
    Ok(url)
}

fn parse_bool(variable: &str, value: &str) -> ConnectorResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConnectorError::Configuration {
            variable: variable.to_string(),
            message: format!("expected a boolean, got '{}'", other),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use super::*;

    fn base_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            (ENV_HOST, "https://es.internal:9200"),
            (ENV_USERNAME, "elastic"),
            (ENV_PASSWORD, "changeme"),
            (ENV_CA_CERT, "/etc/elk/ca.pem"),
            (ENV_CLIENT_CERT, "/etc/elk/client.pem"),
            (ENV_CLIENT_KEY, "/etc/elk/client.key"),
            (ENV_KIBANA_HOST, "https://kibana.internal:5601"),
        ])
    }

    fn load(env: &HashMap<&'static str, &'static str>) -> ConnectorResult<ClusterSettings> {
        ClusterSettings::from_lookup(|name| env.get(name).map(|v| v.to_string()))
    }

    #[test]
    fn test_settings_from_complete_env() {
        let settings = load(&base_env()).unwrap();
        assert_eq!(settings.credentials.host().as_str(), "https://es.internal:9200/");
        assert_eq!(settings.credentials.username(), "elastic");
        assert_eq!(settings.kibana_host.host_str(), Some("kibana.internal"));
        assert_eq!(settings.retry, RetryPolicy::default());
    }

    #[test]
    fn test_missing_variable_is_named() {
        for missing in [ENV_PASSWORD, ENV_CLIENT_KEY, ENV_KIBANA_HOST] {
            let mut env = base_env();
            env.remove(missing);
            match load(&env).unwrap_err() {
                ConnectorError::Configuration { variable, .. } => assert_eq!(variable, missing),
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_empty_variable_counts_as_missing() {
        let mut env = base_env();
        env.insert(ENV_USERNAME, "  ");
        assert!(matches!(
            load(&env),
            Err(ConnectorError::Configuration { variable, .. }) if variable == ENV_USERNAME
        ));
    }

    #[test]
    fn test_invalid_host_rejected() {
        let mut env = base_env();
        env.insert(ENV_HOST, "not a url");
        assert!(matches!(load(&env), Err(ConnectorError::Configuration { .. })));

        env.insert(ENV_HOST, "ftp://es.internal");
        assert!(matches!(load(&env), Err(ConnectorError::Configuration { .. })));
    }

    #[test]
    fn test_retry_overrides() {
        let mut env = base_env();
        env.insert(ENV_MAX_RETRIES, "5");
        env.insert(ENV_RETRY_DELAY, "250ms");
        let settings = load(&env).unwrap();
        assert_eq!(settings.retry.max_attempts, MaxAttempts::bounded(5).unwrap());
        assert_eq!(settings.retry.backoff_delay, Duration::from_millis(250));

        env.insert(ENV_PERSISTENT, "true");
        let settings = load(&env).unwrap();
        assert!(settings.retry.is_persistent());
    }

    #[test]
    fn test_zero_retries_rejected() {
        let mut env = base_env();
        env.insert(ENV_MAX_RETRIES, "0");
        assert!(matches!(
            load(&env),
            Err(ConnectorError::Configuration { variable, .. }) if variable == ENV_MAX_RETRIES
        ));
    }

    #[test]
    fn test_malformed_retries_rejected_when_persistent() {
        let mut env = base_env();
        env.insert(ENV_PERSISTENT, "true");
        env.insert(ENV_MAX_RETRIES, "abc");
        assert!(matches!(
            load(&env),
            Err(ConnectorError::Configuration { variable, .. }) if variable == ENV_MAX_RETRIES
        ));
    }

    #[test]
    fn test_password_redacted_in_debug() {
        let settings = load(&base_env()).unwrap();
        let debug = format!("{:?}", settings.credentials);
        assert!(!debug.contains("changeme"));
        assert!(debug.contains("<redacted>"));
    }
}
