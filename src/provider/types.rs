//! Wire types exchanged with the inference service.

use serde::{Deserialize, Serialize};

/// A single generation request.
///
/// Serializes to the `{ "input": "..." }` body the inference endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Prompt text
    #[serde(rename = "input")]
    pub input_text: String,
}

impl GenerationRequest {
    /// Create a request for the given prompt.
    pub fn new(input_text: impl Into<String>) -> Self {
        Self {
            input_text: input_text.into(),
        }
    }
}

/// Unclassified response from the inference service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP-style status code
    pub status: u16,
    /// Response body bytes (expected to be JSON)
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Create a raw response.
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Build a response whose body is the given JSON value.
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    /// Whether the status is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Image produced by a successful generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// Image reference as returned by the service (URL or data URL)
    pub image_ref: String,
}

/// JSON payload shared by every response shape.
///
/// Success carries `image`, "model loading" carries `estimated_time`, and any
/// other failure carries `error`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ResponsePayload {
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}
