//! Mock secret provider for unit testing.
//!
//! This module provides an in-memory provider that counts lookups so tests
//! can assert when the connection manager does (and does not) re-read
//! secrets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::SecretError;

use super::provider::SecretProvider;

/// In-memory secret provider for testing.
#[derive(Debug, Clone, Default)]
pub struct MockSecretProvider {
    /// Secrets by (namespace, name).
    secrets: Arc<Mutex<HashMap<(String, String), String>>>,
    /// Number of `get_secret` calls served.
    lookups: Arc<AtomicUsize>,
    /// Whether every lookup fails with a provider error.
    failing: Arc<AtomicBool>,
}

impl MockSecretProvider {
    /// Create an empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a provider holding a reachable store's parameters.
    pub fn with_store(namespace: &str, host: &str, port: u16) -> Self {
        let provider = Self::new();
        provider.set(namespace, "redis_host", host);
        provider.set(namespace, "redis_port", &port.to_string());
        provider
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<(String, String), String>> {
        self.secrets.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Set or replace a secret.
    pub fn set(&self, namespace: &str, name: &str, value: &str) {
        self.entries()
            .insert((namespace.to_string(), name.to_string()), value.to_string());
    }

    /// Remove a secret.
    pub fn remove(&self, namespace: &str, name: &str) {
        self.entries()
            .remove(&(namespace.to_string(), name.to_string()));
    }

    /// Make every lookup fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of lookups served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Reset the lookup counter.
    pub fn reset_lookups(&self) {
        self.lookups.store(0, Ordering::SeqCst);
    }
}

#[async_trait]
impl SecretProvider for MockSecretProvider {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<String, SecretError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.failing.load(Ordering::SeqCst) {
            return Err(SecretError::UnexpectedResponse(
                "Mock secrets failure".to_string(),
            ));
        }

        self.entries()
            .get(&(namespace.to_string(), name.to_string()))
            .cloned()
            .ok_or_else(|| SecretError::not_found(namespace, name))
    }
}
