//! Configuration management for the generation client.
//!
//! This module provides configuration loading through TOML files and
//! environment variable overrides via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use avagen::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! // Load environment variables
//! let env = EnvironmentLoader::new(None);
//!
//! // Load configuration from TOML and apply overrides
//! let mut loader = ConfigurationLoader::new(Some(Path::new("config/avagen.toml"))).unwrap();
//! loader.apply_environment(&env);
//!
//! println!("Endpoint: {}", loader.config.generator.endpoint);
//! println!("Max retries: {}", loader.config.retry.max_retries);
//! ```

pub mod config;
pub mod environment;

// Re-export main types for convenience
pub use self::config::{
    Configuration, ConfigurationLoader, GeneratorConfig, LoggingConfig, RetryConfig,
    DEFAULT_MAX_RETRIES,
};
pub use self::environment::EnvironmentLoader;
