//! Unified error types for the game server.

use thiserror::Error;

/// Unified error type for the game server.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// Secret lookup error.
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),

    /// Key-value store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Secret provider errors.
#[derive(Error, Debug)]
pub enum SecretError {
    /// No secret with this name exists in the namespace.
    #[error("secret {namespace}/{name} not found")]
    NotFound {
        /// Namespace that was searched.
        namespace: String,
        /// Secret name.
        name: String,
    },

    /// The secrets service rejected our credentials.
    #[error("secrets service rejected credentials: {0}")]
    Unauthorized(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The secrets service answered with something we cannot use.
    #[error("unexpected response from secrets service: {0}")]
    UnexpectedResponse(String),

    /// Provider misconfiguration.
    #[error("secret provider misconfigured: {0}")]
    Config(String),
}

impl SecretError {
    /// Build a `NotFound` error.
    pub fn not_found(namespace: &str, name: &str) -> Self {
        Self::NotFound {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Whether the secret is simply absent, as opposed to the provider failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Connection parameters do not form a usable address.
    #[error("invalid store address {address}: {reason}")]
    InvalidAddress {
        /// The address as assembled from secrets.
        address: String,
        /// Why it is unusable.
        reason: String,
    },

    /// Redis command or connection failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Connect or command exceeded the configured timeout.
    #[error("store operation timed out after {0}ms")]
    Timeout(u64),

    /// Store is not reachable.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Rejection of a malformed `POST /score` body.
#[derive(Error, Debug, PartialEq, Eq)]
#[error("score must be a non-negative integer, got {input:?}")]
pub struct ScoreInputError {
    /// The offending body, trimmed.
    pub input: String,
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, AppError>;
