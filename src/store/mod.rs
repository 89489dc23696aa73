//! Score store access.
//!
//! This module handles:
//! - The key-value client seam and its Redis implementation
//! - The self-healing connection manager
//! - Mock store for testing

pub mod client;
pub mod manager;
pub mod mock;

pub use client::{ConnectionParams, KvStore, RedisConnector, RedisStore, StoreConnector, StoreHandle};
pub use manager::ConnectionManager;
pub use mock::MockStore;
