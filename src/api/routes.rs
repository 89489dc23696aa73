//! HTTP API route definitions.

use std::time::Instant;

use axum::extract::{MatchedPath, Request};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{
    env_dump, get_score, health, index, metrics_handler, post_score, redis_info, static_file,
    store_health, AppState,
};
use crate::metrics;

/// Create the game server router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Game shell and score API
        .route("/", get(index))
        .route("/score", get(get_score).post(post_score))
        // Diagnostics
        .route("/env", get(env_dump))
        .route("/redis", get(redis_info))
        .route("/health", get(health))
        .route("/health/store", get(store_health))
        .route("/metrics", get(metrics_handler))
        // Static assets
        .route("/:path", get(static_file))
        .route_layer(middleware::from_fn(track_latency))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn track_latency(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_http_latency(start, &endpoint);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use pretty_assertions::assert_eq;
    use tower::ServiceExt;

    use crate::config::Config;
    use crate::secrets::MockSecretProvider;
    use crate::store::{ConnectionManager, MockStore};

    struct Fixture {
        app: Router,
        store: MockStore,
        secrets: MockSecretProvider,
        _web: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let web = tempfile::tempdir().unwrap();
        std::fs::write(web.path().join("index.html"), "<html>terramino</html>").unwrap();
        std::fs::write(web.path().join("style.css"), "body { margin: 0; }").unwrap();

        let config = Config {
            web_root: web.path().to_path_buf(),
            ..Config::default()
        };
        let secrets = MockSecretProvider::with_store(&config.app_name, "cache.local", 6379);
        let store = MockStore::new();
        let manager = ConnectionManager::new(
            Arc::new(secrets.clone()),
            Arc::new(store.clone()),
            config.app_name.clone(),
        );

        Fixture {
            app: create_router(AppState::new(&config, Arc::new(manager))),
            store,
            secrets,
            _web: web,
        }
    }

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, String) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_score(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/score")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn score_scenario() {
        let f = fixture();

        assert_eq!(send(&f.app, get("/score")).await, (StatusCode::OK, "0".to_string()));
        assert_eq!(send(&f.app, post_score("42")).await, (StatusCode::OK, "42".to_string()));
        assert_eq!(f.store.value("score").as_deref(), Some("42"));
        assert_eq!(send(&f.app, post_score("10")).await, (StatusCode::OK, "42".to_string()));
        assert_eq!(f.store.value("score").as_deref(), Some("42"));
        assert_eq!(send(&f.app, get("/score")).await, (StatusCode::OK, "42".to_string()));
    }

    #[tokio::test]
    async fn malformed_score_is_rejected() {
        let f = fixture();

        let (status, _) = send(&f.app, post_score("forty-two")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(f.store.writes(), 0);
    }

    #[tokio::test]
    async fn score_without_store_is_zero() {
        let f = fixture();
        f.secrets.remove("terramino", "redis_host");

        assert_eq!(send(&f.app, get("/score")).await, (StatusCode::OK, "0".to_string()));
        assert_eq!(send(&f.app, post_score("5")).await, (StatusCode::OK, "5".to_string()));
    }

    #[tokio::test]
    async fn index_serves_template() {
        let f = fixture();

        let response = f.app.clone().oneshot(get("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
    }

    #[tokio::test]
    async fn static_file_has_content_type() {
        let f = fixture();

        let response = f.app.clone().oneshot(get("/style.css")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/css");
    }

    #[tokio::test]
    async fn missing_static_file_is_404_with_empty_body() {
        let f = fixture();

        assert_eq!(
            send(&f.app, get("/missing.js")).await,
            (StatusCode::NOT_FOUND, String::new())
        );
    }

    #[tokio::test]
    async fn redis_info_shows_resolved_location() {
        let f = fixture();

        let (status, body) = send(&f.app, get("/redis")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "redis_host=cache.local\nredis_port=6379\n");
    }

    #[tokio::test]
    async fn store_health_reflects_reachability() {
        let f = fixture();

        let (status, _) = send(&f.app, get("/health/store")).await;
        assert_eq!(status, StatusCode::OK);

        f.store.set_reachable(false);
        let (status, body) = send(&f.app, get("/health/store")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, r#"{"store":"unavailable"}"#);
    }

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let f = fixture();

        assert_eq!(
            send(&f.app, get("/health")).await,
            (StatusCode::OK, r#"{"status":"ok"}"#.to_string())
        );
    }

    #[tokio::test]
    async fn metrics_disabled_is_404() {
        let f = fixture();

        let (status, _) = send(&f.app, get("/metrics")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
