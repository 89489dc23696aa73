//! Terramino game server.
//!
//! Serves the game's static assets and HTML shell, plus a tiny score API
//! backed by Redis:
//!
//! ```text
//! GET  /score   ──▶ HighScoreService::get_high_score ──┐
//! POST /score   ──▶ HighScoreService::set_high_score ──┤
//!                                                      ▼
//!                                          ConnectionManager::acquire
//!                                            │ cached handle + PING
//!                                            │ or secrets ──▶ new handle
//!                                            ▼
//!                                          Redis (GET / SET / PING)
//! ```
//!
//! Store connection parameters come from HCP Vault Secrets (or environment
//! variables) and are re-read whenever the cached connection stops
//! answering, so a store provisioned or rotated after startup is picked up
//! without a restart. When the store cannot be reached the score reads as 0
//! and submissions are acknowledged without being persisted.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`secrets`]: Secret providers (HCP Vault Secrets, environment, mock)
//! - [`store`]: Redis client and the self-healing connection manager
//! - [`score`]: High score read / maximum-wins update
//! - [`web`]: Static asset lookup and index page
//! - [`api`]: HTTP routes and handlers
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod metrics;
pub mod score;
pub mod secrets;
pub mod store;
pub mod utils;
pub mod web;

pub use config::Config;
pub use error::{AppError, Result};
