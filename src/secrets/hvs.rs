//! HCP Vault Secrets client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::error::SecretError;

use super::provider::SecretProvider;

/// API version segment of the secrets endpoints.
const API_VERSION: &str = "2023-11-28";

/// Audience requested for service principal tokens.
const TOKEN_AUDIENCE: &str = "https://api.hashicorp.cloud";

/// Refresh tokens this long before they actually expire.
const TOKEN_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

/// HCP Vault Secrets API client authenticated as a service principal.
#[derive(Debug)]
pub struct HvsSecretProvider {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Secrets API base URL.
    api_url: String,
    /// OAuth2 token endpoint.
    auth_url: String,
    /// Service principal client ID.
    client_id: String,
    /// Service principal client secret.
    client_secret: String,
    /// Organization ID.
    organization_id: String,
    /// Project ID.
    project_id: String,
    /// Cached bearer token.
    token: RwLock<Option<CachedToken>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// OAuth2 token response.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

/// Response of the `:open` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSecretResponse {
    /// The opened secret.
    pub secret: OpenSecret,
}

/// Opened secret with its current version.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenSecret {
    /// Secret name.
    #[serde(default)]
    pub name: Option<String>,
    /// Current static version (2023-11-28 API).
    #[serde(default)]
    pub static_version: Option<SecretVersion>,
    /// Current version (2023-06-13 API).
    #[serde(default)]
    pub version: Option<SecretVersion>,
}

/// Single secret version.
#[derive(Debug, Clone, Deserialize)]
pub struct SecretVersion {
    /// Plaintext value.
    pub value: Option<String>,
}

impl OpenSecretResponse {
    /// Extract the plaintext value, whichever API shape was returned.
    pub fn into_value(self) -> Option<String> {
        self.secret
            .static_version
            .and_then(|v| v.value)
            .or_else(|| self.secret.version.and_then(|v| v.value))
    }
}

impl HvsSecretProvider {
    /// Create a client from config; all four HCP credentials must be present.
    pub fn from_config(config: &Config) -> Result<Self, SecretError> {
        let missing = |field: &str| SecretError::Config(format!("{} is not set", field));

        let http = reqwest::Client::builder()
            .timeout(config.secrets_timeout())
            .connect_timeout(Duration::from_millis(config.secrets_timeout_ms.min(2000)))
            .build()?;

        Ok(Self {
            http,
            api_url: config.hcp_api_url.trim_end_matches('/').to_string(),
            auth_url: config.hcp_auth_url.clone(),
            client_id: config
                .hcp_client_id
                .clone()
                .ok_or_else(|| missing("HCP_CLIENT_ID"))?,
            client_secret: config
                .hcp_client_secret
                .clone()
                .ok_or_else(|| missing("HCP_CLIENT_SECRET"))?,
            organization_id: config
                .hcp_organization_id
                .clone()
                .ok_or_else(|| missing("HCP_ORGANIZATION_ID"))?,
            project_id: config
                .hcp_project_id
                .clone()
                .ok_or_else(|| missing("HCP_PROJECT_ID"))?,
            token: RwLock::new(None),
        })
    }

    /// URL of the `:open` endpoint for one secret.
    pub fn secret_url(&self, app: &str, name: &str) -> String {
        format!(
            "{}/secrets/{}/organizations/{}/projects/{}/apps/{}/secrets/{}:open",
            self.api_url, API_VERSION, self.organization_id, self.project_id, app, name
        )
    }

    /// Return a valid bearer token, fetching a new one when the cache is stale.
    async fn access_token(&self) -> Result<String, SecretError> {
        if let Some(token) = self.token.read().await.as_ref() {
            if Instant::now() < token.refresh_at {
                return Ok(token.access_token.clone());
            }
        }

        debug!("Requesting HCP service principal token");

        let response = self
            .http
            .post(&self.auth_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("audience", TOKEN_AUDIENCE),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SecretError::Unauthorized(format!("token request: HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(SecretError::UnexpectedResponse(format!(
                "token request: HTTP {}",
                status
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            SecretError::UnexpectedResponse(format!("failed to parse token: {}", e))
        })?;

        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(TOKEN_EXPIRY_MARGIN);
        *self.token.write().await = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });

        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretProvider for HvsSecretProvider {
    #[instrument(skip(self))]
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<String, SecretError> {
        let token = self.access_token().await?;
        let url = self.secret_url(namespace, name);

        let response = self.http.get(&url).bearer_auth(&token).send().await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(SecretError::not_found(namespace, name)),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                // Token may have been revoked; fetch a fresh one next time.
                *self.token.write().await = None;
                warn!(status = %response.status(), "Secrets service rejected token");
                return Err(SecretError::Unauthorized(format!(
                    "open {}: HTTP {}",
                    name,
                    response.status()
                )));
            }
            status if !status.is_success() => {
                return Err(SecretError::UnexpectedResponse(format!(
                    "open {}: HTTP {}",
                    name, status
                )));
            }
            _ => {}
        }

        let opened: OpenSecretResponse = response.json().await.map_err(|e| {
            SecretError::UnexpectedResponse(format!("failed to parse secret {}: {}", name, e))
        })?;

        opened
            .into_value()
            .ok_or_else(|| SecretError::not_found(namespace, name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> Config {
        Config {
            hcp_client_id: Some("client".to_string()),
            hcp_client_secret: Some("shh".to_string()),
            hcp_organization_id: Some("org-1".to_string()),
            hcp_project_id: Some("proj-2".to_string()),
            hcp_api_url: "https://api.example.test/".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn secret_url_includes_scope_and_name() {
        let provider = HvsSecretProvider::from_config(&test_config()).unwrap();
        assert_eq!(
            provider.secret_url("terramino", "redis_host"),
            "https://api.example.test/secrets/2023-11-28/organizations/org-1/projects/proj-2/apps/terramino/secrets/redis_host:open"
        );
    }

    #[test]
    fn from_config_requires_credentials() {
        let err = HvsSecretProvider::from_config(&Config::default()).unwrap_err();
        assert!(matches!(err, SecretError::Config(_)));
    }

    #[test]
    fn open_response_reads_static_version() {
        let json = r#"{"secret":{"name":"redis_host","type":"kv","static_version":{"version":3,"value":"10.1.2.3"}}}"#;
        let parsed: OpenSecretResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_value().as_deref(), Some("10.1.2.3"));
    }

    #[test]
    fn open_response_reads_legacy_version() {
        let json = r#"{"secret":{"name":"redis_port","version":{"version":"1","value":"6379"}}}"#;
        let parsed: OpenSecretResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_value().as_deref(), Some("6379"));
    }

    #[test]
    fn token_response_defaults_lifetime() {
        let parsed: TokenResponse = serde_json::from_str(r#"{"access_token":"abc"}"#).unwrap();
        assert_eq!(parsed.access_token, "abc");
        assert_eq!(parsed.expires_in, 3600);
    }

    mod http {
        use std::collections::HashMap;
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::{Arc, Mutex};

        use axum::extract::State;
        use axum::http::{header, HeaderMap, StatusCode, Uri};
        use axum::response::{IntoResponse, Response};
        use axum::routing::post;
        use axum::{Json, Router};
        use serde_json::json;
        use tokio::net::TcpListener;

        use super::*;

        #[derive(Clone, Default)]
        struct Stub {
            secrets: Arc<Mutex<HashMap<String, String>>>,
            token_status: Arc<Mutex<Option<StatusCode>>>,
            secret_status: Arc<Mutex<Option<StatusCode>>>,
            tokens_issued: Arc<AtomicUsize>,
            bearers: Arc<Mutex<Vec<String>>>,
        }

        impl Stub {
            fn put(&self, name: &str, value: &str) {
                self.secrets
                    .lock()
                    .unwrap()
                    .insert(name.to_string(), value.to_string());
            }

            fn fail_secrets_with(&self, status: Option<StatusCode>) {
                *self.secret_status.lock().unwrap() = status;
            }

            fn fail_tokens_with(&self, status: Option<StatusCode>) {
                *self.token_status.lock().unwrap() = status;
            }

            fn tokens_issued(&self) -> usize {
                self.tokens_issued.load(Ordering::SeqCst)
            }

            fn bearers(&self) -> Vec<String> {
                self.bearers.lock().unwrap().clone()
            }
        }

        async fn issue_token(State(stub): State<Stub>) -> Response {
            if let Some(status) = *stub.token_status.lock().unwrap() {
                return status.into_response();
            }
            let n = stub.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
            Json(json!({ "access_token": format!("tok-{}", n), "expires_in": 3600 }))
                .into_response()
        }

        async fn open_secret(State(stub): State<Stub>, headers: HeaderMap, uri: Uri) -> Response {
            if let Some(bearer) = headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
            {
                stub.bearers.lock().unwrap().push(bearer.to_string());
            }
            if let Some(status) = *stub.secret_status.lock().unwrap() {
                return status.into_response();
            }

            let name = uri
                .path()
                .rsplit('/')
                .next()
                .and_then(|segment| segment.strip_suffix(":open"))
                .unwrap_or_default()
                .to_string();
            match stub.secrets.lock().unwrap().get(&name) {
                Some(value) => Json(json!({
                    "secret": { "name": name, "static_version": { "version": 1, "value": value } }
                }))
                .into_response(),
                None => StatusCode::NOT_FOUND.into_response(),
            }
        }

        async fn start() -> (Stub, HvsSecretProvider) {
            let stub = Stub::default();
            let app = Router::new()
                .route("/oauth2/token", post(issue_token))
                .fallback(open_secret)
                .with_state(stub.clone());

            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, app).await.unwrap();
            });

            let config = Config {
                hcp_api_url: format!("http://{}", addr),
                hcp_auth_url: format!("http://{}/oauth2/token", addr),
                ..test_config()
            };
            (stub, HvsSecretProvider::from_config(&config).unwrap())
        }

        #[tokio::test]
        async fn opens_secrets_with_one_cached_token() {
            let (stub, provider) = start().await;
            stub.put("redis_host", "10.0.0.7");
            stub.put("redis_port", "6380");

            assert_eq!(
                provider.get_secret("terramino", "redis_host").await.unwrap(),
                "10.0.0.7"
            );
            assert_eq!(
                provider.get_secret("terramino", "redis_port").await.unwrap(),
                "6380"
            );
            assert_eq!(stub.tokens_issued(), 1);
            assert_eq!(stub.bearers(), vec!["Bearer tok-1", "Bearer tok-1"]);
        }

        #[tokio::test]
        async fn missing_secret_is_not_found() {
            let (_stub, provider) = start().await;

            let err = provider
                .get_secret("terramino", "redis_password")
                .await
                .unwrap_err();
            assert!(err.is_not_found());
        }

        #[tokio::test]
        async fn rejected_token_is_dropped_and_refetched() {
            let (stub, provider) = start().await;
            stub.put("redis_host", "cache.internal");

            for status in [StatusCode::UNAUTHORIZED, StatusCode::FORBIDDEN] {
                stub.fail_secrets_with(Some(status));
                let err = provider
                    .get_secret("terramino", "redis_host")
                    .await
                    .unwrap_err();
                assert!(matches!(err, SecretError::Unauthorized(_)));
            }

            stub.fail_secrets_with(None);
            assert_eq!(
                provider.get_secret("terramino", "redis_host").await.unwrap(),
                "cache.internal"
            );
            assert_eq!(stub.tokens_issued(), 3);
            assert_eq!(
                stub.bearers(),
                vec!["Bearer tok-1", "Bearer tok-2", "Bearer tok-3"]
            );
        }

        #[tokio::test]
        async fn server_error_is_unexpected_response() {
            let (stub, provider) = start().await;
            stub.put("redis_host", "cache.internal");
            stub.fail_secrets_with(Some(StatusCode::INTERNAL_SERVER_ERROR));

            let err = provider
                .get_secret("terramino", "redis_host")
                .await
                .unwrap_err();
            assert!(matches!(err, SecretError::UnexpectedResponse(_)));
            assert!(!err.is_not_found());
            assert_eq!(stub.tokens_issued(), 1);
        }

        #[tokio::test]
        async fn refused_credentials_are_unauthorized() {
            let (stub, provider) = start().await;
            stub.put("redis_host", "cache.internal");
            stub.fail_tokens_with(Some(StatusCode::UNAUTHORIZED));

            let err = provider
                .get_secret("terramino", "redis_host")
                .await
                .unwrap_err();
            assert!(matches!(err, SecretError::Unauthorized(_)));
            assert!(stub.bearers().is_empty());
        }
    }
}
