//! Lazy, self-healing store connection manager.
//!
//! ```text
//! acquire()
//!   cached handle? ── ping ok ──────────────────────────────▶ reuse
//!        │              │ ping failed
//!        ▼              ▼
//!   secrets: host (required), port + password (best effort)
//!        │ host missing / provider error ─────────────────▶ unavailable
//!        ▼
//!   connector.connect(params)   (no I/O)
//!        │ bad address ───────────────────────────────────▶ unavailable
//!        ▼
//!   ping new handle ── failed ────────────────────────────▶ unavailable
//!        │ ok
//!        ▼
//!   cache + return
//! ```
//!
//! Every failure clears the slot and degrades only the current request.
//! Concurrent rebuilds may race; the last writer of the slot wins.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::error::{AppError, SecretError};
use crate::metrics::{self, LookupOutcome, ProbeOutcome};
use crate::secrets::SecretProvider;

use super::client::{ConnectionParams, StoreConnector, StoreHandle};

/// Host secret names, tried in order; deployments differ in which they set.
pub const HOST_SECRETS: [&str; 3] = ["redis_host", "redis_address", "redis_ip"];

/// Port secret name.
pub const PORT_SECRET: &str = "redis_port";

/// Password secret name.
pub const PASSWORD_SECRET: &str = "redis_password";

/// Owns at most one cached store handle.
pub struct ConnectionManager {
    secrets: Arc<dyn SecretProvider>,
    connector: Arc<dyn StoreConnector>,
    namespace: String,
    slot: RwLock<Option<StoreHandle>>,
}

impl ConnectionManager {
    /// Create a manager; no secrets are read and nothing is connected yet.
    pub fn new(
        secrets: Arc<dyn SecretProvider>,
        connector: Arc<dyn StoreConnector>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            secrets,
            connector,
            namespace: namespace.into(),
            slot: RwLock::new(None),
        }
    }

    /// Secrets namespace in use.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Return a usable handle, or `None` when the store is unavailable.
    pub async fn acquire(&self) -> Option<StoreHandle> {
        let cached = self.slot.read().await.clone();

        if let Some(handle) = cached {
            match probe(&handle).await {
                Ok(()) => return Some(handle),
                Err(e) => {
                    warn!(
                        address = %handle.address(),
                        error = %e,
                        "Cached store connection failed probe, reconnecting"
                    );
                }
            }
        }

        match self.connect().await {
            Ok(handle) => {
                info!(address = %handle.address(), "Connected to score store");
                metrics::inc_store_reconnects();
                *self.slot.write().await = Some(Arc::clone(&handle));
                Some(handle)
            }
            Err(e) => {
                warn!(namespace = %self.namespace, error = %e, "Score store unavailable");
                metrics::inc_store_unavailable();
                *self.slot.write().await = None;
                None
            }
        }
    }

    /// Drop the cached handle so the next `acquire` rebuilds it.
    pub async fn invalidate(&self) {
        if self.slot.write().await.take().is_some() {
            debug!("Cached store connection dropped");
        }
    }

    /// Whether a handle is currently cached. Says nothing about its health.
    pub async fn is_connected(&self) -> bool {
        self.slot.read().await.is_some()
    }

    /// Build and probe a fresh handle from freshly read secrets.
    #[instrument(skip(self), fields(namespace = %self.namespace))]
    async fn connect(&self) -> Result<StoreHandle, AppError> {
        let params = self.connection_params().await?;
        let handle = self.connector.connect(&params)?;
        probe(&handle).await?;
        Ok(handle)
    }

    /// Resolve connection parameters from the secret provider.
    ///
    /// The host is required; port and password are best effort.
    pub async fn connection_params(&self) -> Result<ConnectionParams, SecretError> {
        let host = self.host().await?;
        let port = self.optional_secret(PORT_SECRET).await;
        let password = self.optional_secret(PASSWORD_SECRET).await;

        Ok(ConnectionParams {
            host,
            port,
            password,
        })
    }

    /// Look up the store host under the first candidate name that exists.
    pub async fn host(&self) -> Result<String, SecretError> {
        for name in HOST_SECRETS {
            match self.secret(name).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Err(SecretError::not_found(&self.namespace, HOST_SECRETS[0]))
    }

    /// Look up a secret, mapping any failure to `None`.
    pub async fn optional_secret(&self, name: &str) -> Option<String> {
        match self.secret(name).await {
            Ok(value) => Some(value),
            Err(e) => {
                if !e.is_not_found() {
                    warn!(secret = name, error = %e, "Secret lookup failed");
                }
                None
            }
        }
    }

    async fn secret(&self, name: &str) -> Result<String, SecretError> {
        let result = self.secrets.get_secret(&self.namespace, name).await;
        metrics::inc_secret_lookups(match &result {
            Ok(_) => LookupOutcome::Found,
            Err(e) if e.is_not_found() => LookupOutcome::Missing,
            Err(_) => LookupOutcome::Error,
        });
        result
    }
}

async fn probe(handle: &StoreHandle) -> Result<(), crate::error::StoreError> {
    let start = Instant::now();
    let result = handle.ping().await;
    metrics::record_store_probe(
        start,
        if result.is_ok() {
            ProbeOutcome::Healthy
        } else {
            ProbeOutcome::Failed
        },
    );
    result
}
