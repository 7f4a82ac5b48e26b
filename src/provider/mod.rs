//! Inference provider abstraction module
//!
//! This module provides the client trait used to reach the remote inference
//! service, a reqwest-based HTTP implementation, and the response classifier
//! that maps service responses onto the generation error taxonomy.

pub mod classify;
pub mod error;
pub mod http;
pub mod traits;
pub mod types;

// Re-export main types
pub use classify::{Classification, ResponseClassifier, StatusClassifier};
pub use error::{GenerationError, GenerationResult};
pub use http::HttpInferenceClient;
pub use traits::InferenceClient;
pub use types::{GeneratedImage, GenerationRequest, RawResponse};
