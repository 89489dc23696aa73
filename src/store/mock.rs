//! Mock key-value store for unit testing.
//!
//! `MockStore` plays both the server and the connector. Handles remember the
//! server epoch they were created in; `restart()` bumps the epoch so every
//! outstanding handle fails its next probe while fresh handles work, which
//! is how a real client behaves after the server drops its sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::error::StoreError;

use super::client::{ConnectionParams, KvStore, StoreConnector, StoreHandle};

#[derive(Debug, Default)]
struct Backend {
    data: Mutex<HashMap<String, String>>,
    unreachable: AtomicBool,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
    epoch: AtomicU64,
    pings: AtomicUsize,
    connects: AtomicUsize,
    writes: AtomicUsize,
    last_params: Mutex<Option<ConnectionParams>>,
}

/// In-memory store and connector for testing.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    backend: Arc<Backend>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MockStore {
    /// Create an empty, reachable store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the server unreachable (or reachable again).
    pub fn set_reachable(&self, reachable: bool) {
        self.backend.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Make every SET fail while reads keep working.
    pub fn set_fail_writes(&self, fail: bool) {
        self.backend.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every GET time out while PING and SET keep working.
    pub fn set_fail_reads(&self, fail: bool) {
        self.backend.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Simulate a server restart: data survives, existing sessions die.
    pub fn restart(&self) {
        self.backend.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Read a key directly, bypassing handles.
    pub fn value(&self, key: &str) -> Option<String> {
        lock(&self.backend.data).get(key).cloned()
    }

    /// Seed a key directly, bypassing handles.
    pub fn insert(&self, key: &str, value: &str) {
        lock(&self.backend.data).insert(key.to_string(), value.to_string());
    }

    /// Number of PINGs received.
    pub fn pings(&self) -> usize {
        self.backend.pings.load(Ordering::SeqCst)
    }

    /// Number of handles constructed.
    pub fn connects(&self) -> usize {
        self.backend.connects.load(Ordering::SeqCst)
    }

    /// Number of successful SETs.
    pub fn writes(&self) -> usize {
        self.backend.writes.load(Ordering::SeqCst)
    }

    /// Parameters passed to the most recent `connect`.
    pub fn last_params(&self) -> Option<ConnectionParams> {
        lock(&self.backend.last_params).clone()
    }
}

impl StoreConnector for MockStore {
    fn connect(&self, params: &ConnectionParams) -> Result<StoreHandle, StoreError> {
        *lock(&self.backend.last_params) = Some(params.clone());
        params.port_number()?;
        self.backend.connects.fetch_add(1, Ordering::SeqCst);

        Ok(Arc::new(MockHandle {
            backend: Arc::clone(&self.backend),
            epoch: self.backend.epoch.load(Ordering::SeqCst),
            address: params.address(),
        }))
    }
}

/// Handle issued by `MockStore`.
#[derive(Debug)]
pub struct MockHandle {
    backend: Arc<Backend>,
    epoch: u64,
    address: String,
}

impl MockHandle {
    fn check_alive(&self) -> Result<(), StoreError> {
        if self.backend.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(format!(
                "{}: connection refused",
                self.address
            )));
        }
        if self.backend.epoch.load(Ordering::SeqCst) != self.epoch {
            return Err(StoreError::Unavailable(format!(
                "{}: connection reset",
                self.address
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for MockHandle {
    async fn ping(&self) -> Result<(), StoreError> {
        self.backend.pings.fetch_add(1, Ordering::SeqCst);
        self.check_alive()
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check_alive()?;
        if self.backend.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout(2000));
        }
        Ok(lock(&self.backend.data).get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check_alive()?;
        if self.backend.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("Mock write failure".to_string()));
        }
        lock(&self.backend.data).insert(key.to_string(), value.to_string());
        self.backend.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn address(&self) -> &str {
        &self.address
    }
}
