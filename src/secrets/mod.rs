//! Secret lookup for store connection parameters.
//!
//! This module handles:
//! - The `SecretProvider` seam used by the connection manager
//! - HCP Vault Secrets client
//! - Environment variable fallback
//! - Mock provider for testing

pub mod hvs;
pub mod mock;
pub mod provider;

use std::sync::Arc;

pub use hvs::HvsSecretProvider;
pub use mock::MockSecretProvider;
pub use provider::{EnvSecretProvider, SecretProvider};

use crate::config::Config;
use crate::error::SecretError;

/// Pick the provider the configuration asks for.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn SecretProvider>, SecretError> {
    if config.use_hcp() {
        tracing::info!(
            api = %config.hcp_api_url,
            namespace = %config.app_name,
            "Using HCP Vault Secrets provider"
        );
        Ok(Arc::new(HvsSecretProvider::from_config(config)?))
    } else {
        tracing::info!(
            namespace = %config.app_name,
            "HCP credentials not set, reading secrets from environment"
        );
        Ok(Arc::new(EnvSecretProvider::new()))
    }
}
