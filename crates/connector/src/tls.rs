//! Mutual-TLS context for cluster connections.
//!
//! The server is verified against a pinned CA bundle and the client presents
//! its own certificate chain and private key. All material is read and
//! checked once; the resulting [`TlsContext`] is immutable and shared by every
//! connection attempt.

use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

use elasticsearch::auth::ClientCertificate;
use elasticsearch::cert::{Certificate, CertificateValidation};

use crate::error::{ConnectorError, ConnectorResult};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PRIVATE_KEY_SUFFIX: &str = "PRIVATE KEY";

/// Returns the label of every PEM block in `pem`, checking BEGIN/END pairing.
fn pem_labels(pem: &str) -> Result<Vec<String>, String> {
    let mut labels = Vec::new();
    let mut open: Option<&str> = None;

    for line in pem.lines().map(str::trim) {
        if let Some(label) = line
            .strip_prefix("-----BEGIN ")
            .and_then(|rest| rest.strip_suffix("-----"))
        {
            if let Some(outer) = open {
                return Err(format!("BEGIN {} inside {} block", label, outer));
            }
            open = Some(label);
        } else if let Some(label) = line
            .strip_prefix("-----END ")
            .and_then(|rest| rest.strip_suffix("-----"))
        {
            let begun = open
                .take()
                .ok_or_else(|| format!("END {} without BEGIN", label))?;
            if begun != label {
                return Err(format!("BEGIN {} closed by END {}", begun, label));
            }
            labels.push(label.to_string());
        }
    }

    if let Some(label) = open {
        return Err(format!("unterminated {} block", label));
    }

    Ok(labels)
}

fn certificate_error(origin: &str, message: impl Into<String>) -> ConnectorError {
    ConnectorError::Certificate {
        origin: origin.to_string(),
        message: message.into(),
        source: None,
    }
}

fn rejected(origin: &str, error: reqwest::Error) -> ConnectorError {
    ConnectorError::Certificate {
        origin: origin.to_string(),
        message: "rejected by TLS backend".to_string(),
        source: Some(Box::new(error)),
    }
}

fn read_pem_file(path: &Path) -> ConnectorResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| ConnectorError::Certificate {
        origin: path.display().to_string(),
        message: "unable to read file".to_string(),
        source: Some(Box::new(e)),
    })
}

/// Checks that `pem` holds at least one block accepted by `accept`.
fn require_blocks(
    origin: &str,
    pem: &[u8],
    what: &str,
    accept: impl Fn(&str) -> bool,
) -> ConnectorResult<()> {
    let text = std::str::from_utf8(pem)
        .map_err(|_| certificate_error(origin, "file is not PEM encoded"))?;
    let labels = pem_labels(text).map_err(|message| certificate_error(origin, message))?;
    if !labels.iter().any(|label| accept(label)) {
        return Err(certificate_error(origin, format!("no {} found", what)));
    }
    Ok(())
}

fn tls_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .use_rustls_tls()
        .tls_built_in_root_certs(false)
}

/// Parses every certificate in `pem` as DER. Returns how many there are.
fn check_certificates(origin: &str, pem: &[u8]) -> ConnectorResult<usize> {
    let certificates =
        reqwest::Certificate::from_pem_bundle(pem).map_err(|e| rejected(origin, e))?;
    let count = certificates.len();
    if count == 0 {
        return Err(certificate_error(origin, "no certificate found"));
    }
    certificates
        .into_iter()
        .fold(tls_builder(), |builder, cert| builder.add_root_certificate(cert))
        .build()
        .map_err(|e| rejected(origin, e))?;
    Ok(count)
}

/// Loads the certificate chain and key as a client identity.
fn check_identity(origin: &str, identity: &[u8]) -> ConnectorResult<()> {
    let identity = reqwest::Identity::from_pem(identity).map_err(|e| rejected(origin, e))?;
    tls_builder()
        .identity(identity)
        .build()
        .map_err(|e| rejected(origin, e))?;
    Ok(())
}

/// Immutable mutual-TLS material.
///
/// Cloning is cheap; all clones share the same buffers.
#[derive(Clone)]
pub struct TlsContext {
    ca_bundle: Arc<[u8]>,
    identity: Arc<[u8]>,
    ca_certificates: usize,
}

impl Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("ca_certificates", &self.ca_certificates)
            .field("identity_len", &self.identity.len())
            .finish_non_exhaustive()
    }
}

impl TlsContext {
    /// Reads the CA bundle, client certificate chain and client key from disk.
    pub fn from_files(
        ca_cert: impl AsRef<Path>,
        client_cert: impl AsRef<Path>,
        client_key: impl AsRef<Path>,
    ) -> ConnectorResult<Self> {
        let (ca_cert, client_cert, client_key) =
            (ca_cert.as_ref(), client_cert.as_ref(), client_key.as_ref());

        let ca = read_pem_file(ca_cert)?;
        let cert = read_pem_file(client_cert)?;
        let key = read_pem_file(client_key)?;

        Self::build(
            (&ca_cert.display().to_string(), &ca),
            (&client_cert.display().to_string(), &cert),
            (&client_key.display().to_string(), &key),
        )
    }

    /// Builds a context from in-memory PEM data.
    pub fn from_pem(ca_cert: &[u8], client_cert: &[u8], client_key: &[u8]) -> ConnectorResult<Self> {
        Self::build(
            ("ca certificate", ca_cert),
            ("client certificate", client_cert),
            ("client key", client_key),
        )
    }

    fn build(
        (ca_origin, ca): (&str, &[u8]),
        (cert_origin, cert): (&str, &[u8]),
        (key_origin, key): (&str, &[u8]),
    ) -> ConnectorResult<Self> {
        require_blocks(ca_origin, ca, "certificate", |label| label == CERTIFICATE_LABEL)?;
        require_blocks(cert_origin, cert, "certificate", |label| {
            label == CERTIFICATE_LABEL
        })?;
        require_blocks(key_origin, key, "private key", |label| {
            label.ends_with(PRIVATE_KEY_SUFFIX)
        })?;

        let ca_certificates = check_certificates(ca_origin, ca)?;
        check_certificates(cert_origin, cert)?;

        // The transport expects the chain followed by the key in one buffer
        let mut identity = Vec::with_capacity(cert.len() + key.len() + 1);
        identity.extend_from_slice(cert);
        if !cert.ends_with(b"\n") {
            identity.push(b'\n');
        }
        identity.extend_from_slice(key);
        check_identity(key_origin, &identity)?;

        tracing::debug!(ca_certificates, "Built mutual TLS context");

        Ok(Self {
            ca_bundle: Arc::from(ca),
            identity: Arc::from(identity),
            ca_certificates,
        })
    }

    /// Returns the number of certificates in the CA bundle.
    pub fn ca_certificate_count(&self) -> usize {
        self.ca_certificates
    }

    /// Returns server verification pinned to the CA bundle.
    pub fn certificate_validation(&self) -> ConnectorResult<CertificateValidation> {
        let certificate =
            Certificate::from_pem(&self.ca_bundle).map_err(|e| ConnectorError::Certificate {
                origin: "ca certificate".to_string(),
                message: "rejected by TLS backend".to_string(),
                source: Some(Box::new(e)),
            })?;
        Ok(CertificateValidation::Full(certificate))
    }

    /// Returns the client identity presented during the handshake.
    pub fn client_identity(&self) -> ClientCertificate {
        ClientCertificate::Pem(self.identity.to_vec())
    }
}
