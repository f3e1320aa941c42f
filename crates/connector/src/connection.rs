//! Connection management with retry and liveness checks.
//!
//! [`ConnectionManager`] owns one client handle and drives it through
//! [`ConnectionState`]:
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──▶ Connected ──close──▶ Disconnected
//!                               │  ▲            │
//!                               ▼  └─liveness───┘
//!                             Failed ──connect──▶ Connecting
//! ```
//!
//! Each call to [`ConnectionManager::connect`] runs its own attempt loop with a
//! local attempt counter. Every attempt ends in one of three ways:
//!
//! - **Connected**: the new client answered the liveness probe.
//! - **Aborted**: a transport-level or unclassified failure; retrying cannot fix it.
//! - **Retry**: a network or timeout failure; wait the backoff delay and try again,
//!   unless the bounded budget is spent (**Exhausted**) or the loop was cancelled.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::client::{ClientFactory, ClusterClient};
use crate::error::{AttemptError, ConnectorError, ConnectorResult};

/// Default number of connection attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 25;

/// Default wait between connection attempts.
pub const DEFAULT_BACKOFF_DELAY: Duration = Duration::from_secs(3);

/// Attempt after which a "still retrying" notice is logged.
pub const DEFAULT_NOTICE_AT: u32 = 10;

/// Lifecycle of the managed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// No handle.
    Disconnected,
    /// An attempt loop is running.
    Connecting,
    /// A handle answered the liveness probe.
    Connected,
    /// The last attempt loop ended without a handle.
    Failed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Failed => write!(f, "failed"),
        }
    }
}

/// How many attempts a connect call may make.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxAttempts {
    /// Give up after this many attempts.
    Bounded(NonZeroU32),
    /// Retry until connected, aborted or cancelled.
    Unbounded,
}

impl MaxAttempts {
    /// Returns a bounded budget, or `None` for zero.
    pub fn bounded(attempts: u32) -> Option<Self> {
        NonZeroU32::new(attempts).map(MaxAttempts::Bounded)
    }

    fn is_exhausted(&self, attempts: u32) -> bool {
        match self {
            MaxAttempts::Bounded(max) => attempts >= max.get(),
            MaxAttempts::Unbounded => false,
        }
    }
}

impl Default for MaxAttempts {
    fn default() -> Self {
        MaxAttempts::Bounded(NonZeroU32::new(DEFAULT_MAX_ATTEMPTS).unwrap_or(NonZeroU32::MIN))
    }
}

/// Retry configuration, fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempt budget.
    pub max_attempts: MaxAttempts,
    /// Fixed wait between attempts.
    pub backoff_delay: Duration,
    /// Attempt number that triggers the "still retrying" notice.
    pub still_retrying_notice_at: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MaxAttempts::default(),
            backoff_delay: DEFAULT_BACKOFF_DELAY,
            still_retrying_notice_at: DEFAULT_NOTICE_AT,
        }
    }
}

impl RetryPolicy {
    /// A policy that gives up after `attempts` attempts.
    pub fn bounded(attempts: u32) -> ConnectorResult<Self> {
        let max_attempts =
            MaxAttempts::bounded(attempts).ok_or_else(|| ConnectorError::Configuration {
                variable: "max_attempts".to_string(),
                message: "must be at least 1".to_string(),
            })?;
        Ok(Self {
            max_attempts,
            ..Self::default()
        })
    }

    /// A policy that retries until connected.
    pub fn persistent() -> Self {
        Self {
            max_attempts: MaxAttempts::Unbounded,
            ..Self::default()
        }
    }

    /// Replaces the backoff delay.
    pub fn with_backoff(mut self, delay: Duration) -> Self {
        self.backoff_delay = delay;
        self
    }

    /// Replaces the attempt that triggers the "still retrying" notice.
    pub fn with_notice_at(mut self, attempt: u32) -> Self {
        self.still_retrying_notice_at = attempt;
        self
    }

    /// Returns true if retries never run out.
    pub fn is_persistent(&self) -> bool {
        self.max_attempts == MaxAttempts::Unbounded
    }
}

/// Cancels a running attempt loop.
///
/// Cancellation is observed only while waiting between attempts, never in the
/// middle of one. It stays in effect until [`CancelHandle::reset`].
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelHandle {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelHandle {
    /// Creates a handle that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    /// Clears a previous cancellation.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sleeps for `delay`. Returns true if cancelled before or during the wait.
    async fn backoff(&self, delay: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return true;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => false,
            changed = rx.wait_for(|cancelled| *cancelled) => changed.is_ok(),
        }
    }
}

/// Read-only view of a manager's state, usable while the manager is busy.
#[derive(Debug, Clone)]
pub struct StateView {
    state: Arc<RwLock<ConnectionState>>,
}

impl StateView {
    /// Returns the current state.
    pub fn get(&self) -> ConnectionState {
        *self.state.read()
    }
}

/// Outcome of one connection attempt.
enum Attempt<C> {
    Connected(C),
    Aborted(AttemptError),
    Retry(AttemptError),
}

/// Owns a cluster handle and keeps it alive.
pub struct ConnectionManager<F: ClientFactory> {
    factory: F,
    policy: RetryPolicy,
    client: Option<F::Client>,
    state: Arc<RwLock<ConnectionState>>,
    cancel: CancelHandle,
}

impl<F: ClientFactory> std::fmt::Debug for ConnectionManager<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("host", &self.factory.host())
            .field("policy", &self.policy)
            .field("state", &self.state())
            .field("has_client", &self.client.is_some())
            .finish_non_exhaustive()
    }
}

impl<F: ClientFactory> ConnectionManager<F> {
    /// Creates a disconnected manager.
    pub fn new(factory: F, policy: RetryPolicy) -> Self {
        Self {
            factory,
            policy,
            client: None,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            cancel: CancelHandle::new(),
        }
    }

    /// Returns the host this manager connects to.
    pub fn host(&self) -> &str {
        self.factory.host()
    }

    /// Returns the retry policy.
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Returns the current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    /// Returns a view of the state that outlives borrows of the manager.
    pub fn state_view(&self) -> StateView {
        StateView {
            state: self.state.clone(),
        }
    }

    /// Returns a handle that cancels this manager's attempt loops.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    fn transition(&self, next: ConnectionState) {
        let mut state = self.state.write();
        if *state != next {
            debug!(host = %self.factory.host(), from = %*state, to = %next, "Connection state changed");
            *state = next;
        }
    }

    /// Returns the live handle.
    pub fn client(&self) -> ConnectorResult<&F::Client> {
        self.client.as_ref().ok_or_else(|| ConnectorError::NotConnected {
            host: self.factory.host().to_string(),
        })
    }

    async fn attempt(&self) -> Attempt<F::Client> {
        let client = match self.factory.build() {
            Ok(client) => client,
            Err(e) if e.is_recoverable() => return Attempt::Retry(e),
            Err(e) => return Attempt::Aborted(e),
        };
        match client.ping().await {
            Ok(()) => Attempt::Connected(client),
            Err(e) if e.is_recoverable() => Attempt::Retry(e),
            Err(e) => Attempt::Aborted(e),
        }
    }

    /// Establishes a new handle, retrying recoverable failures.
    ///
    /// Any previous handle is dropped first.
    pub async fn connect(&mut self) -> ConnectorResult<&F::Client> {
        let host = self.factory.host().to_string();
        self.client = None;
        self.transition(ConnectionState::Connecting);

        let mut attempts: u32 = 0;
        loop {
            attempts += 1;

            match self.attempt().await {
                Attempt::Connected(client) => {
                    info!(host = %host, attempts, "Connected to Elasticsearch");
                    self.transition(ConnectionState::Connected);
                    return Ok(self.client.insert(client));
                }
                Attempt::Aborted(e) => {
                    error!(host = %host, attempt = attempts, error = %e, "Connection attempt aborted");
                    self.transition(ConnectionState::Failed);
                    return Err(e.into_connector_error(&host));
                }
                Attempt::Retry(e) => {
                    warn!(
                        host = %host,
                        attempt = attempts,
                        max_attempts = ?self.policy.max_attempts,
                        delay_ms = self.policy.backoff_delay.as_millis() as u64,
                        error = %e,
                        "Connection issue, retrying"
                    );
                }
            }

            if attempts == self.policy.still_retrying_notice_at {
                info!(host = %host, attempts, "Still trying to connect to Elasticsearch");
            }

            if self.policy.max_attempts.is_exhausted(attempts) {
                error!(host = %host, attempts, "Maximum retries reached, giving up");
                self.transition(ConnectionState::Failed);
                return Err(ConnectorError::ConnectionExhausted { host, attempts });
            }

            if self.cancel.backoff(self.policy.backoff_delay).await {
                warn!(host = %host, attempts, "Connection attempts cancelled");
                self.transition(ConnectionState::Failed);
                return Err(ConnectorError::Cancelled { host, attempts });
            }
        }
    }

    /// Probes the current handle. Never fails; no handle means not alive.
    pub async fn is_alive(&self) -> bool {
        match self.client {
            Some(ref client) => match client.ping().await {
                Ok(()) => true,
                Err(e) => {
                    debug!(host = %self.factory.host(), error = %e, "Liveness probe failed");
                    false
                }
            },
            None => false,
        }
    }

    /// Reconnects if the current handle does not answer the liveness probe.
    pub async fn verify_client_alive(&mut self) -> ConnectorResult<()> {
        if !self.is_alive().await {
            debug!(host = %self.factory.host(), "Client not alive, reconnecting");
            self.connect().await?;
        }
        Ok(())
    }

    /// Returns a handle that answered the liveness probe, reconnecting if needed.
    pub async fn live_client(&mut self) -> ConnectorResult<&F::Client> {
        self.verify_client_alive().await?;
        self.client()
    }

    /// Releases the handle.
    pub async fn close(&mut self) -> ConnectorResult<()> {
        let host = self.factory.host().to_string();
        let client = self
            .client
            .take()
            .ok_or_else(|| ConnectorError::NotConnected { host: host.clone() })?;

        self.transition(ConnectionState::Disconnected);
        match client.close().await {
            Ok(()) => {
                info!(host = %host, "Connection closed");
                Ok(())
            }
            Err(source) => {
                error!(host = %host, error = %source, "Error closing connection");
                Err(ConnectorError::Close { host, source })
            }
        }
    }
}
