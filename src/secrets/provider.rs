//! Secret provider trait and the environment-backed implementation.

use async_trait::async_trait;

use crate::error::SecretError;

/// Source of named secrets grouped by application namespace.
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Get a single secret value.
    ///
    /// Returns `SecretError::NotFound` when nothing is configured under
    /// `namespace`/`name`; any other error means the provider itself failed.
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<String, SecretError>;
}

/// Reads secrets from `{NAMESPACE}_{NAME}` environment variables.
#[derive(Debug, Clone, Default)]
pub struct EnvSecretProvider;

impl EnvSecretProvider {
    /// Create a new environment provider.
    pub fn new() -> Self {
        Self
    }

    /// Environment variable consulted for a secret.
    pub fn var_name(namespace: &str, name: &str) -> String {
        format!("{}_{}", namespace, name)
            .to_uppercase()
            .replace(['-', '.', '/'], "_")
    }
}

#[async_trait]
impl SecretProvider for EnvSecretProvider {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<String, SecretError> {
        let var = Self::var_name(namespace, name);
        match std::env::var(&var) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => {
                tracing::debug!(var = %var, "Secret not found in environment variables");
                Err(SecretError::not_found(namespace, name))
            }
        }
    }
}
