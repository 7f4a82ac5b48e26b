//! Avagen - client-side orchestration for a single image generation request
//!
//! Avagen drives one generation request against a remote inference service that
//! may answer "model still loading, try again in N seconds". It re-submits the
//! request after the server-suggested delay, bounded by a retry budget, and keeps
//! exactly one logical request in flight per session.
//!
//! - **`config`** - TOML configuration and environment overrides
//! - **`observability`** - Markdown sequence log mirrored to `tracing`
//! - **`provider`** - Inference client trait, HTTP client and response classification
//! - **`orchestration`** - Session state, request orchestrator and retry scheduler
//!
//! # Features
//!
//! ```toml
//! [dependencies]
//! avagen = { version = "0.1", default-features = false, features = ["provider"] }
//! # Or everything (the default):
//! avagen = { version = "0.1", features = ["all"] }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use avagen::prelude::*;
//! use std::sync::Arc;
//!
//! async fn generate() -> anyhow::Result<()> {
//!     let loader = ConfigurationLoader::new(None)?;
//!     let client = HttpInferenceClient::from_config(&loader.config.generator)?;
//!     let orchestrator = RequestOrchestrator::builder(Arc::new(client))
//!         .retry_config(loader.config.retry.clone())
//!         .build();
//!
//!     let mut updates = orchestrator.subscribe();
//!     orchestrator.submit("jagonzalr astronaut").await?;
//!     while updates.changed().await.is_ok() {
//!         let snapshot = updates.borrow().clone();
//!         if !snapshot.is_generating {
//!             println!("image: {:?}", snapshot.current_image);
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Configuration management (enabled with the `config` feature)
#[cfg(feature = "config")]
pub mod config;

/// Observability utilities (enabled with the `observability` feature)
#[cfg(feature = "observability")]
pub mod observability;

/// Inference provider abstraction (enabled with the `provider` feature)
#[cfg(feature = "provider")]
pub mod provider;

/// Request orchestration and retry scheduling (enabled with the `orchestration` feature)
#[cfg(feature = "orchestration")]
pub mod orchestration;

/// Prelude module for convenient imports
pub mod prelude {
    #[cfg(feature = "config")]
    pub use crate::config::{Configuration, ConfigurationLoader, EnvironmentLoader};

    #[cfg(feature = "observability")]
    pub use crate::observability::Logger;

    #[cfg(feature = "provider")]
    pub use crate::provider::{
        Classification, GenerationError, GenerationRequest, HttpInferenceClient,
        InferenceClient, RawResponse, ResponseClassifier, StatusClassifier,
    };

    #[cfg(feature = "orchestration")]
    pub use crate::orchestration::{
        GenerationOutcome, Notice, RequestOrchestrator, RetryScheduler, RetryState,
        SequencePhase, SequenceReport, SessionContext, SessionSnapshot, SubmitDisposition,
    };
}
