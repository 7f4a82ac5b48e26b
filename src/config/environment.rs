//! Environment variable loading and management.
//!
//! Only a handful of host-level settings can be overridden from the
//! environment; everything else comes from the TOML file.

use std::env;
use std::path::Path;

/// Environment variable overriding `generator.endpoint`.
pub const ENDPOINT_VAR: &str = "AVAGEN_ENDPOINT";

/// Environment variable overriding `logging.log_level`.
pub const LOG_LEVEL_VAR: &str = "AVAGEN_LOG_LEVEL";

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to .env file. If None, no file is loaded.
    pub fn new(env_file: Option<&Path>) -> Self {
        // No implicit .env lookup in the working directory.
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to load .env file");
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// Path of the loaded .env file, if one was requested.
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Inference endpoint override.
    pub fn endpoint(&self) -> Option<String> {
        non_empty_var(ENDPOINT_VAR)
    }

    /// Log level override.
    pub fn log_level(&self) -> Option<String> {
        non_empty_var(LOG_LEVEL_VAR)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}
