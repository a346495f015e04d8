// OnlyRepo Client Configuration
// Persistent client settings, overridable from the environment

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ClientError;

/// Environment variable overriding `api_url`
pub const ENV_API_URL: &str = "ONLYREPO_API_URL";
/// Environment variable overriding `page_limit`
pub const ENV_PAGE_LIMIT: &str = "ONLYREPO_PAGE_LIMIT";

/// Client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the file-manager API (e.g., https://files.example.com/api)
    pub api_url: String,
    /// Entries requested per page from each listing endpoint
    #[serde(default = "default_page_limit")]
    pub page_limit: u32,
    /// Whole-request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// TCP/TLS connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Distance from the end of the list at which the next page is requested
    #[serde(default = "default_near_end_threshold")]
    pub near_end_threshold: f64,
}

fn default_page_limit() -> u32 {
    20
}

fn default_request_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_near_end_threshold() -> f64 {
    100.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:5000/api".to_string(),
            page_limit: default_page_limit(),
            request_timeout_secs: default_request_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            near_end_threshold: default_near_end_threshold(),
        }
    }
}

impl ClientConfig {
    /// Apply `ONLYREPO_*` environment overrides on top of this config
    pub fn with_env_overrides(mut self) -> Self {
        self.apply_overrides(
            std::env::var(ENV_API_URL).ok(),
            std::env::var(ENV_PAGE_LIMIT).ok(),
        );
        self
    }

    fn apply_overrides(&mut self, api_url: Option<String>, page_limit: Option<String>) {
        if let Some(url) = api_url.filter(|u| !u.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
        if let Some(raw) = page_limit {
            match raw.trim().parse::<u32>() {
                Ok(limit) => self.page_limit = limit,
                Err(e) => tracing::warn!("Ignoring {}={:?}: {}", ENV_PAGE_LIMIT, raw, e),
            }
        }
    }
}

/// Get the path to the client config file
pub fn get_config_path() -> PathBuf {
    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")));
    config_dir.join("onlyrepo").join("config.json")
}

/// Load client configuration from `path`, falling back to defaults
pub fn load_client_config_from(path: &Path) -> ClientConfig {
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to parse client config {:?}: {}", path, e);
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read client config {:?}: {}", path, e);
            }
        }
    }

    ClientConfig::default()
}

/// Load client configuration from the default location plus environment overrides
pub fn load_client_config() -> ClientConfig {
    load_client_config_from(&get_config_path()).with_env_overrides()
}

/// Save client configuration to `path`
pub fn save_client_config_to(config: &ClientConfig, path: &Path) -> Result<(), ClientError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)
        .map_err(|e| ClientError::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
    fs::write(path, content)?;

    tracing::info!("Client config saved to {:?}", path);
    Ok(())
}

/// Save client configuration to the default location
pub fn save_client_config(config: &ClientConfig) -> Result<(), ClientError> {
    save_client_config_to(config, &get_config_path())
}

/// Validate client configuration
pub fn validate_config(config: &ClientConfig) -> Result<(), ClientError> {
    let url = url::Url::parse(config.api_url.trim())
        .map_err(|e| ClientError::InvalidConfig(format!("API URL is not a valid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ClientError::InvalidConfig(format!(
            "API URL must use http or https, got {}",
            url.scheme()
        )));
    }

    if config.page_limit == 0 {
        return Err(ClientError::Validation("Page limit must be at least 1".to_string()));
    }

    if config.request_timeout_secs == 0 || config.connect_timeout_secs == 0 {
        return Err(ClientError::InvalidConfig("Timeouts must be at least one second".to_string()));
    }

    if config.near_end_threshold.is_nan() || config.near_end_threshold < 0.0 {
        return Err(ClientError::InvalidConfig("Near-end threshold cannot be negative".to_string()));
    }

    Ok(())
}
