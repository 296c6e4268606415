//! Configuration management.
//!
//! Settings are read from a TOML file and overridden by environment variables
//! prefixed with `PUBCHEM`, using `__` between section and key:
//!
//! ```toml
//! [api]
//! base_url = "https://pubchem.ncbi.nlm.nih.gov/rest/pug"
//! timeout_secs = 30
//!
//! [rate_limits]
//! min_request_interval_ms = 200
//!
//! [polling]
//! max_wait_secs = 300
//! ```
//!
//! `PUBCHEM_POLLING__MAX_WAIT_SECS=60` overrides the last value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Service endpoint and HTTP settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Client-side request spacing
    #[serde(default)]
    pub rate_limits: RateLimitConfig,

    /// Retry policy for transient failures
    #[serde(default)]
    pub retry: RetrySettings,

    /// List-key polling and pagination
    #[serde(default)]
    pub polling: PollingConfig,

    /// Download settings
    #[serde(default)]
    pub downloads: DownloadConfig,
}

/// Service endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Overrides the default `pubchem-client/<version>` agent
    #[serde(default)]
    pub user_agent: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            user_agent: None,
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_base_url() -> String {
    "https://pubchem.ncbi.nlm.nih.gov/rest/pug".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

/// Rate limiting configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Minimum spacing between request starts; 0 disables the limiter
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

fn default_min_request_interval_ms() -> u64 {
    // five requests per second
    200
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Attempts for busy and timeout responses
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_retry_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_retry_multiplier")]
    pub backoff_multiplier: f64,

    #[serde(default = "default_max_total_time_secs")]
    pub max_total_time_secs: u64,

    /// Attempts for generic server errors and transport failures
    #[serde(default = "default_server_error_attempts")]
    pub server_error_attempts: u32,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_retry_initial_delay_ms(),
            max_delay_ms: default_retry_max_delay_ms(),
            backoff_multiplier: default_retry_multiplier(),
            max_total_time_secs: default_max_total_time_secs(),
            server_error_attempts: default_server_error_attempts(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_initial_delay_ms() -> u64 {
    500
}

fn default_retry_max_delay_ms() -> u64 {
    10_000
}

fn default_retry_multiplier() -> f64 {
    2.0
}

fn default_max_total_time_secs() -> u64 {
    120
}

fn default_server_error_attempts() -> u32 {
    3
}

/// List-key polling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_poll_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Growth factor while the job reports it is still running
    #[serde(default = "default_poll_multiplier")]
    pub backoff_multiplier: f64,

    /// Growth factor after a busy or transient failure
    #[serde(default = "default_busy_multiplier")]
    pub busy_multiplier: f64,

    #[serde(default = "default_max_wait_secs")]
    pub max_wait_secs: u64,

    #[serde(default = "default_max_busy_attempts")]
    pub max_busy_attempts: u32,

    /// Largest `listkey_count` requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_poll_initial_delay_ms(),
            max_delay_ms: default_poll_max_delay_ms(),
            backoff_multiplier: default_poll_multiplier(),
            busy_multiplier: default_busy_multiplier(),
            max_wait_secs: default_max_wait_secs(),
            max_busy_attempts: default_max_busy_attempts(),
            page_size: default_page_size(),
        }
    }
}

fn default_poll_initial_delay_ms() -> u64 {
    500
}

fn default_poll_max_delay_ms() -> u64 {
    8_000
}

fn default_poll_multiplier() -> f64 {
    1.5
}

fn default_busy_multiplier() -> f64 {
    2.0
}

fn default_max_wait_secs() -> u64 {
    300
}

fn default_max_busy_attempts() -> u32 {
    5
}

fn default_page_size() -> u32 {
    10_000
}

/// Download configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Replace existing files by default
    #[serde(default)]
    pub overwrite: bool,
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl RateLimitConfig {
    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Config error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

/// Load configuration from a file, with `PUBCHEM_*` environment overrides
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path))
        .add_source(environment())
        .build()?;

    Ok(settings.try_deserialize()?)
}

/// Defaults with `PUBCHEM_*` environment overrides applied
pub fn get_config() -> Result<Config, ConfigError> {
    let settings = config::Config::builder().add_source(environment()).build()?;
    Ok(settings.try_deserialize()?)
}

fn environment() -> config::Environment {
    config::Environment::with_prefix("PUBCHEM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Look for `./pubchem.toml`, then `<config dir>/pubchem-client/config.toml`
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pubchem.toml");
    if local.is_file() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("pubchem-client").join("config.toml"))
        .filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api.base_url, "https://pubchem.ncbi.nlm.nih.gov/rest/pug");
        assert_eq!(config.rate_limits.min_request_interval(), Duration::from_millis(200));
        assert_eq!(config.retry.server_error_attempts, 3);
        assert_eq!(config.polling.page_size, 10_000);
        assert!(!config.downloads.overwrite);
    }

    #[test]
    fn test_config_file_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[api]
base_url = "http://localhost:8080/rest/pug"

[rate_limits]
min_request_interval_ms = 0

[polling]
max_wait_secs = 30
page_size = 500
"#;

        let mut file = File::create(&path).unwrap();
        file.write_all(toml_content.as_bytes()).unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:8080/rest/pug");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.rate_limits.min_request_interval_ms, 0);
        assert_eq!(config.polling.max_wait_secs, 30);
        assert_eq!(config.polling.page_size, 500);
        assert_eq!(config.polling.initial_delay_ms, 500);
    }

    #[test]
    fn test_config_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.retry.max_attempts = 7;
        config.save(&path).unwrap();

        let loaded = load_config(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = load_config(Path::new("/nonexistent/pubchem.toml"));
        assert!(result.is_err());
    }
}
