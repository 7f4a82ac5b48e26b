//! TOML configuration parsing and management.

use super::environment::EnvironmentLoader;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Retry budget granted to a sequence when none is configured.
pub const DEFAULT_MAX_RETRIES: u32 = 20;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    /// Remote inference endpoint settings
    #[serde(default)]
    pub generator: GeneratorConfig,
    /// Retry budget and delay bounds
    #[serde(default)]
    pub retry: RetryConfig,
    /// Sequence log settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Remote inference endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Full URL that receives `{ "input": ... }` POST requests
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Per-request timeout for the HTTP client (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_endpoint() -> String {
    "http://localhost:3000/api/generate".to_string()
}

fn default_request_timeout() -> u64 {
    120
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Retry attempts allowed after the original submission
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Floor applied to server-suggested delays (seconds)
    #[serde(default)]
    pub min_retry_delay_seconds: f64,
    /// Cap applied to server-suggested delays (seconds)
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_seconds: f64,
    /// HTTP status the service uses for "model loading"
    #[serde(default = "default_unavailable_status")]
    pub unavailable_status: u16,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_max_retry_delay() -> f64 {
    600.0
}

fn default_unavailable_status() -> u16 {
    503
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            min_retry_delay_seconds: 0.0,
            max_retry_delay_seconds: default_max_retry_delay(),
            unavailable_status: default_unavailable_status(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Markdown log file path
    #[serde(default = "default_log_file")]
    pub log_file: String,
    /// Log level name (INFO, DEBUG, ...)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_file() -> String {
    std::env::temp_dir()
        .join("avagen")
        .join(format!(
            "avagen_{}_{}.md",
            Utc::now().timestamp_millis(),
            std::process::id()
        ))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            log_level: default_log_level(),
        }
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    /// Path the configuration was (or would have been) read from
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None or missing, uses default config.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/avagen.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Self::get_default_config()
        };

        Ok(Self {
            config_path,
            config,
        })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config_path: PathBuf::from("config/avagen.toml"),
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Configuration = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?;

        if config.retry.min_retry_delay_seconds > config.retry.max_retry_delay_seconds {
            anyhow::bail!(
                "Invalid retry config in {}: min_retry_delay_seconds ({}) exceeds max_retry_delay_seconds ({})",
                path.display(),
                config.retry.min_retry_delay_seconds,
                config.retry.max_retry_delay_seconds
            );
        }

        Ok(config)
    }

    /// Get default configuration.
    fn get_default_config() -> Configuration {
        Configuration::default()
    }

    /// Apply environment overrides on top of the loaded file.
    pub fn apply_environment(&mut self, env: &EnvironmentLoader) {
        if let Some(endpoint) = env.endpoint() {
            self.config.generator.endpoint = endpoint;
        }
        if let Some(level) = env.log_level() {
            self.config.logging.log_level = level;
        }
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "generator.endpoint" => Some(self.config.generator.endpoint.clone()),
            "logging.log_file" => Some(self.config.logging.log_file.clone()),
            "logging.log_level" => Some(self.config.logging.log_level.clone()),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match key {
            "generator.request_timeout_seconds" => {
                Some(self.config.generator.request_timeout_seconds)
            }
            "retry.max_retries" => Some(self.config.retry.max_retries as u64),
            "retry.unavailable_status" => Some(self.config.retry.unavailable_status as u64),
            _ => None,
        }
    }

    /// Get floating point configuration value.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        match key {
            "retry.min_retry_delay_seconds" => Some(self.config.retry.min_retry_delay_seconds),
            "retry.max_retry_delay_seconds" => Some(self.config.retry.max_retry_delay_seconds),
            _ => None,
        }
    }
}
