//! Configuration management for feedwire.
//!
//! Configuration is read from `~/.config/feedwire/config.toml`.
//! If the file doesn't exist, a default configuration with comments is created.

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::realtime::bayeux::{DEFAULT_POLL_TIMEOUT_SECS, DEFAULT_REALTIME_URL};
use crate::transport::http::DEFAULT_TIMEOUT_SECS;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub realtime: RealtimeConfig,
}

/// API credentials and request behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_key: String,
    /// Needed for real-time subscriptions only.
    pub app_id: Option<String>,
    /// Region prefix, e.g. `us-east`.
    pub location: Option<String>,
    /// Overrides the host derived from `location`.
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub enrich_by_default: bool,
    /// Current user; becomes the default actor `SU:{user_id}`.
    pub user_id: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            app_id: None,
            location: None,
            base_url: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            enrich_by_default: false,
            user_id: None,
        }
    }
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    pub url: String,
    pub poll_timeout_secs: u64,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_REALTIME_URL.to_string(),
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
        }
    }
}

impl RealtimeConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/feedwire/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("feedwire").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> String {
        r##"# feedwire configuration

[client]
# API key of your application (required)
api_key = ""

# Application id, required for real-time subscriptions
# app_id = "12345"

# Region, e.g. "us-east", "eu-west", "singapore"
# location = "us-east"

# Full API base URL, overrides `location`
# base_url = "https://us-east-api.stream-io-api.com/api/v1.0/"

# Request timeout in seconds
timeout_secs = 10

# Read from the enriched endpoint even without reaction flags
enrich_by_default = false

# Current user id, used as the default activity actor ("SU:<user_id>")
# user_id = "alice"

[realtime]
# Bayeux endpoint for real-time updates
url = "https://faye-us-east.stream-io-api.com/faye"

# Long-poll timeout in seconds
poll_timeout_secs = 60
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}
