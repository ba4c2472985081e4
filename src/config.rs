//! Configuration loading for the Tillar client
//!
//! Configuration is loaded from a TOML file, with defaults that point at
//! the test API host and a per-user preferences database.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::ClientError;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote API configuration
    pub api: ApiConfig,
    /// Local storage configuration
    pub storage: StorageConfig,
}

/// Remote API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL, without a trailing slash
    pub host: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// How many times a request is re-issued after a token refresh
    pub retry_limit: u32,
    /// User-Agent header sent with every request
    pub user_agent: String,
}

/// Local storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the SQLite preferences database
    pub db_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "https://api.test.hayotex.uz".to_string(),
            timeout_secs: 30,
            retry_limit: 1,
            user_agent: format!("tillar-client/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: dirs::data_local_dir()
                .map(|d| d.join("tillar").join("prefs.db"))
                .unwrap_or_else(|| PathBuf::from(".tillar/prefs.db")),
        }
    }
}

impl ApiConfig {
    /// Request timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url, ClientError> {
        Url::parse(self.host.trim_end_matches('/'))
            .map_err(|e| ClientError::Config(format!("invalid api host {:?}: {e}", self.host)))
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self, ClientError> {
        let config_path = path.cloned().unwrap_or_else(|| {
            dirs::config_dir()
                .map(|d| d.join("tillar").join("config.toml"))
                .unwrap_or_else(|| PathBuf::from(".tillar/config.toml"))
        });

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .map_err(|e| ClientError::Config(format!("failed to read config: {e}")))?;
            let config: Config = toml::from_str(&contents)
                .map_err(|e| ClientError::Config(format!("failed to parse config: {e}")))?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::info!("no config file found at {}, using defaults", config_path.display());
            Ok(Config::default())
        }
    }

    fn validate(&self) -> Result<(), ClientError> {
        self.api.base_url()?;
        if self.api.timeout_secs == 0 {
            return Err(ClientError::Config("api.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}
