//! Observability utilities for generation sequences.
//!
//! This module provides a markdown sequence log whose entries are mirrored
//! to the console as `tracing` events.
//!
//! # Example
//!
//! ```no_run
//! use avagen::observability::Logger;
//! use std::time::Duration;
//!
//! let logger = Logger::new(None, Some("DEBUG")).unwrap();
//!
//! logger.log_sequence_start("seq-1", "jagonzalr astronaut", 20).unwrap();
//! logger.log_retry_scheduled("seq-1", Duration::from_secs(5), 20).unwrap();
//! logger.log_success("seq-1", "jagonzalr astronaut", "https://cdn/img.png", 2).unwrap();
//! ```

pub mod logger;

// Re-export main types for convenience
pub use logger::Logger;
