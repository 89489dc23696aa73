//! HTTP API module for the game shell, score, and diagnostic endpoints.

pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::create_router;
