//! HTTP API handlers.

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{debug, error};

use crate::config::Config;
use crate::score::{parse_score, HighScoreService};
use crate::store::manager::PORT_SECRET;
use crate::store::ConnectionManager;
use crate::web;

/// Application state shared with handlers.
#[derive(Clone)]
pub struct AppState {
    /// High score service.
    pub scores: Arc<HighScoreService>,
    /// Store connection manager behind `scores`.
    pub connections: Arc<ConnectionManager>,
    /// Static asset directory.
    pub web_root: Arc<PathBuf>,
    /// Index template path.
    pub index_path: Arc<PathBuf>,
    /// Prefix for `/env`.
    pub env_prefix: Arc<str>,
    /// Prometheus renderer, when metrics are enabled.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new app state.
    pub fn new(config: &Config, connections: Arc<ConnectionManager>) -> Self {
        let scores = Arc::new(HighScoreService::new(
            Arc::clone(&connections),
            config.score_key.clone(),
        ));

        Self {
            scores,
            connections,
            web_root: Arc::new(config.web_root.clone()),
            index_path: Arc::new(config.index_path()),
            env_prefix: Arc::from(config.env_prefix.as_str()),
            metrics: None,
        }
    }

    /// Attach the Prometheus handle rendered by `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Store health response.
#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    /// "available" or "unavailable".
    pub store: &'static str,
}

/// `GET /score` - current high score as a decimal body.
pub async fn get_score(State(state): State<AppState>) -> String {
    state.scores.get_high_score().await.to_string()
}

/// `POST /score` - submit a score; answers with the effective high score.
pub async fn post_score(State(state): State<AppState>, body: String) -> Response {
    match parse_score(&body) {
        Ok(candidate) => state
            .scores
            .set_high_score(candidate)
            .await
            .to_string()
            .into_response(),
        Err(e) => {
            debug!(error = %e, "Rejected score submission");
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
    }
}

/// `GET /` - the game shell.
pub async fn index(State(state): State<AppState>) -> Response {
    match web::render_index(&state.index_path).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(path = %state.index_path.display(), error = %e, "Failed to render index");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /{path}` - a file from the static root.
pub async fn static_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
    request: Request,
) -> Response {
    match web::lookup(&state.web_root, &name).await {
        Ok(Some(path)) => match ServeFile::new(path).oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!(file = %name, error = %e, "Failed to look up static file");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// `GET /env` - debug listing of prefixed environment variables.
pub async fn env_dump(State(state): State<AppState>) -> String {
    web::env_listing(&state.env_prefix)
}

/// `GET /redis` - debug view of the store location as the secrets see it.
pub async fn redis_info(State(state): State<AppState>) -> String {
    let host = state.connections.host().await.unwrap_or_default();
    let port = state
        .connections
        .optional_secret(PORT_SECRET)
        .await
        .unwrap_or_default();

    format!("redis_host={}\nredis_port={}\n", host, port)
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Store health handler - returns 200 if the store answers, 503 otherwise.
pub async fn store_health(State(state): State<AppState>) -> impl IntoResponse {
    if state.connections.acquire().await.is_some() {
        (StatusCode::OK, Json(StoreHealthResponse { store: "available" }))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(StoreHealthResponse {
                store: "unavailable",
            }),
        )
    }
}

/// Prometheus exposition.
pub async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
