//! Application configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Server Configuration ===
    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,

    /// Expose Prometheus metrics on `/metrics`.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    // === Game Assets ===
    /// Directory holding the static assets and the index template.
    #[serde(default = "default_web_root")]
    pub web_root: PathBuf,

    /// Index template file name, relative to `web_root`.
    #[serde(default = "default_index_template")]
    pub index_template: String,

    /// Prefix of the environment variables listed by `/env`.
    #[serde(default = "default_env_prefix")]
    pub env_prefix: String,

    // === Score Store ===
    /// Secrets namespace holding the store connection parameters.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Key the high score lives under.
    #[serde(default = "default_score_key")]
    pub score_key: String,

    /// Upper bound for establishing a store connection or running a command.
    #[serde(default = "default_store_timeout_ms")]
    pub store_timeout_ms: u64,

    // === HCP Vault Secrets ===
    /// Service principal client ID.
    #[serde(default)]
    pub hcp_client_id: Option<String>,

    /// Service principal client secret.
    #[serde(default)]
    pub hcp_client_secret: Option<String>,

    /// Organization the application belongs to.
    #[serde(default)]
    pub hcp_organization_id: Option<String>,

    /// Project the application belongs to.
    #[serde(default)]
    pub hcp_project_id: Option<String>,

    /// Vault Secrets API base URL.
    #[serde(default = "default_hcp_api_url")]
    pub hcp_api_url: String,

    /// OAuth2 token endpoint.
    #[serde(default = "default_hcp_auth_url")]
    pub hcp_auth_url: String,

    /// Request timeout for the secrets service.
    #[serde(default = "default_secrets_timeout_ms")]
    pub secrets_timeout_ms: u64,
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_web_root() -> PathBuf {
    PathBuf::from("web")
}

fn default_index_template() -> String {
    "index.html".to_string()
}

fn default_env_prefix() -> String {
    "HCP_".to_string()
}

fn default_app_name() -> String {
    "terramino".to_string()
}

fn default_score_key() -> String {
    "score".to_string()
}

fn default_store_timeout_ms() -> u64 {
    2000
}

fn default_hcp_api_url() -> String {
    "https://api.cloud.hashicorp.com".to_string()
}

fn default_hcp_auth_url() -> String {
    "https://auth.idp.hashicorp.com/oauth2/token".to_string()
}

fn default_secrets_timeout_ms() -> u64 {
    5000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
            metrics_enabled: default_true(),
            web_root: default_web_root(),
            index_template: default_index_template(),
            env_prefix: default_env_prefix(),
            app_name: default_app_name(),
            score_key: default_score_key(),
            store_timeout_ms: default_store_timeout_ms(),
            hcp_client_id: None,
            hcp_client_secret: None,
            hcp_organization_id: None,
            hcp_project_id: None,
            hcp_api_url: default_hcp_api_url(),
            hcp_auth_url: default_hcp_auth_url(),
            secrets_timeout_ms: default_secrets_timeout_ms(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.app_name.trim().is_empty() {
            return Err("APP_NAME must not be empty".to_string());
        }

        if self.score_key.trim().is_empty() {
            return Err("SCORE_KEY must not be empty".to_string());
        }

        if self.web_root.as_os_str().is_empty() {
            return Err("WEB_ROOT must not be empty".to_string());
        }

        if self.store_timeout_ms == 0 {
            return Err("STORE_TIMEOUT_MS must be greater than 0".to_string());
        }

        if self.secrets_timeout_ms == 0 {
            return Err("SECRETS_TIMEOUT_MS must be greater than 0".to_string());
        }

        let hcp_fields = [
            &self.hcp_client_id,
            &self.hcp_client_secret,
            &self.hcp_organization_id,
            &self.hcp_project_id,
        ];
        let present = hcp_fields.iter().filter(|f| f.is_some()).count();
        if present != 0 && present != hcp_fields.len() {
            return Err(
                "HCP_CLIENT_ID, HCP_CLIENT_SECRET, HCP_ORGANIZATION_ID and HCP_PROJECT_ID must be set together"
                    .to_string(),
            );
        }

        Ok(())
    }

    /// Whether secrets come from HCP Vault Secrets rather than the environment.
    pub fn use_hcp(&self) -> bool {
        self.hcp_client_id.is_some()
            && self.hcp_client_secret.is_some()
            && self.hcp_organization_id.is_some()
            && self.hcp_project_id.is_some()
    }

    /// Store connect/command timeout.
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    /// Secrets service request timeout.
    pub fn secrets_timeout(&self) -> Duration {
        Duration::from_millis(self.secrets_timeout_ms)
    }

    /// Tracing filter directive: `rust_log`, or crate-level debug when
    /// verbose logging is requested here or on the command line.
    pub fn log_directive(&self, verbose: bool) -> String {
        if self.verbose || verbose {
            "terramino_server=debug,info".to_string()
        } else {
            self.rust_log.clone()
        }
    }

    /// Full path of the index template.
    pub fn index_path(&self) -> PathBuf {
        self.web_root.join(&self.index_template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.app_name, "terramino");
        assert_eq!(config.score_key, "score");
        assert_eq!(config.env_prefix, "HCP_");
        assert_eq!(config.index_path(), PathBuf::from("web/index.html"));
        assert!(config.validate().is_ok());
        assert!(!config.use_hcp());
    }

    #[test]
    fn validate_rejects_empty_namespace() {
        let config = Config {
            app_name: "  ".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_store_timeout() {
        let config = Config {
            store_timeout_ms: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_partial_hcp_credentials() {
        let config = Config {
            hcp_client_id: Some("id".to_string()),
            hcp_client_secret: Some("secret".to_string()),
            ..Config::default()
        };

        assert!(config.validate().is_err());
        assert!(!config.use_hcp());
    }

    #[test]
    fn full_hcp_credentials_select_hcp() {
        let config = Config {
            hcp_client_id: Some("id".to_string()),
            hcp_client_secret: Some("secret".to_string()),
            hcp_organization_id: Some("org".to_string()),
            hcp_project_id: Some("proj".to_string()),
            ..Config::default()
        };

        assert!(config.validate().is_ok());
        assert!(config.use_hcp());
    }

    #[test]
    fn log_directive_follows_rust_log_unless_verbose() {
        let config = Config {
            rust_log: "warn,tower_http=debug".to_string(),
            ..Config::default()
        };
        assert_eq!(config.log_directive(false), "warn,tower_http=debug");
        assert_eq!(config.log_directive(true), "terramino_server=debug,info");

        let verbose = Config {
            verbose: true,
            ..config
        };
        assert_eq!(verbose.log_directive(false), "terramino_server=debug,info");
    }
}
