//! Key-value store client seam and its Redis implementation.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use url::Url;

use crate::error::StoreError;

/// Shared handle to a live store session.
pub type StoreHandle = Arc<dyn KvStore>;

/// Operations the score service needs from the key-value store.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Lightweight liveness round trip.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Read a key; `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a key without expiry.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Address this handle talks to, for logs.
    fn address(&self) -> &str;
}

/// Builds store handles from connection parameters.
///
/// Construction must not perform any I/O; the first command establishes
/// the session.
pub trait StoreConnector: Send + Sync {
    /// Create a handle for `params`.
    fn connect(&self, params: &ConnectionParams) -> Result<StoreHandle, StoreError>;
}

/// Store connection parameters as read from the secret provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    /// Hostname or IP address.
    pub host: String,
    /// Port exactly as stored; may be absent or malformed.
    pub port: Option<String>,
    /// Password; `None` means no AUTH.
    pub password: Option<String>,
}

impl ConnectionParams {
    /// `host:port` as assembled from the secrets, port empty when absent.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port.as_deref().unwrap_or_default())
    }

    /// Parse the port, rejecting absent or malformed values.
    pub fn port_number(&self) -> Result<u16, StoreError> {
        let raw = self.port.as_deref().map(str::trim).unwrap_or_default();
        raw.parse::<u16>().map_err(|_| StoreError::InvalidAddress {
            address: self.address(),
            reason: if raw.is_empty() {
                "missing port".to_string()
            } else {
                format!("invalid port {:?}", raw)
            },
        })
    }

    /// Redis URL for these parameters, with the password percent-encoded.
    pub fn redis_url(&self) -> Result<Url, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidAddress {
            address: self.address(),
            reason: reason.to_string(),
        };

        let port = self.port_number()?;
        let host = self.host.trim();
        if host.is_empty() {
            return Err(invalid("empty host"));
        }

        let mut url = Url::parse("redis://localhost").map_err(|e| invalid(&e.to_string()))?;
        url.set_host(Some(host)).map_err(|e| invalid(&e.to_string()))?;
        url.set_port(Some(port)).map_err(|_| invalid("cannot set port"))?;
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            url.set_password(Some(password))
                .map_err(|_| invalid("cannot set password"))?;
        }

        Ok(url)
    }
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Redis-backed store handle.
///
/// Holds an inert `redis::Client`; the multiplexed connection is opened on
/// the first command and reused afterwards.
pub struct RedisStore {
    client: redis::Client,
    address: String,
    timeout: Duration,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisStore {
    /// Create a handle without touching the network.
    pub fn open(params: &ConnectionParams, timeout: Duration) -> Result<Self, StoreError> {
        let url = params.redis_url()?;
        let client = redis::Client::open(url.as_str())?;

        Ok(Self {
            client,
            address: params.address(),
            timeout,
            connection: OnceCell::new(),
        })
    }

    async fn bounded<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(StoreError::from),
            Err(_) => Err(StoreError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let conn = self
            .connection
            .get_or_try_init(|| async {
                debug!(address = %self.address, "Opening Redis connection");
                self.bounded(self.client.get_multiplexed_async_connection())
                    .await
            })
            .await?;
        Ok(conn.clone())
    }
}

#[async_trait]
impl KvStore for RedisStore {
    #[instrument(skip(self), fields(address = %self.address))]
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let reply: String = self
            .bounded(redis::cmd("PING").query_async(&mut conn))
            .await?;

        if reply.eq_ignore_ascii_case("PONG") {
            Ok(())
        } else {
            Err(StoreError::Unavailable(format!("unexpected PING reply {:?}", reply)))
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.get(key)).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        self.bounded(conn.set::<_, _, ()>(key, value)).await
    }

    fn address(&self) -> &str {
        &self.address
    }
}

/// Connector producing `RedisStore` handles.
#[derive(Debug, Clone)]
pub struct RedisConnector {
    timeout: Duration,
}

impl RedisConnector {
    /// Create a connector whose handles bound every round trip by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl StoreConnector for RedisConnector {
    fn connect(&self, params: &ConnectionParams) -> Result<StoreHandle, StoreError> {
        Ok(Arc::new(RedisStore::open(params, self.timeout)?))
    }
}
