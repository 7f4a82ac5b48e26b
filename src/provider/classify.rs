//! Response classification.
//!
//! Status conventions belong to the inference service, so classification is a
//! trait the orchestrator takes by injection. [`StatusClassifier`] implements the
//! common "503 + `estimated_time` while the model loads" convention.

use super::error::{GenerationError, GenerationResult};
use super::types::{GeneratedImage, RawResponse, ResponsePayload};

/// Result of classifying one response.
pub type Classification = GenerationResult<GeneratedImage>;

/// Maps a raw response onto the generation error taxonomy.
pub trait ResponseClassifier: Send + Sync {
    /// Classify a response.
    ///
    /// Returns the generated image on success, `GenerationError::Unavailable`
    /// when the request should be retried, and any other error otherwise.
    fn classify(&self, response: &RawResponse) -> Classification;
}

/// Classifier keyed on a single "service unavailable" status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusClassifier {
    unavailable_status: u16,
}

impl StatusClassifier {
    /// Create a classifier treating `unavailable_status` as "model loading".
    pub fn new(unavailable_status: u16) -> Self {
        Self { unavailable_status }
    }

    /// Status treated as "model loading".
    pub fn unavailable_status(&self) -> u16 {
        self.unavailable_status
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::new(503)
    }
}

impl ResponseClassifier for StatusClassifier {
    fn classify(&self, response: &RawResponse) -> Classification {
        let payload: ResponsePayload = serde_json::from_slice(&response.body).map_err(|e| {
            GenerationError::MalformedResponse(format!(
                "HTTP {} body is not valid JSON: {}",
                response.status, e
            ))
        })?;

        if response.status == self.unavailable_status {
            return Err(GenerationError::Unavailable {
                estimated_time: payload.estimated_time.as_ref().and_then(estimate_seconds),
            });
        }

        if !response.is_success() {
            return Err(GenerationError::Terminal {
                status: response.status,
                message: error_message(response.status, payload.error.as_ref()),
            });
        }

        match payload.image {
            Some(image_ref) if !image_ref.is_empty() => Ok(GeneratedImage { image_ref }),
            _ => Err(GenerationError::MalformedResponse(
                "success response has no image".to_string(),
            )),
        }
    }
}

/// Read `estimated_time` leniently: numbers and numeric strings are accepted.
fn estimate_seconds(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn error_message(status: u16, error: Option<&serde_json::Value>) -> String {
    match error {
        Some(serde_json::Value::String(message)) if !message.is_empty() => message.clone(),
        Some(serde_json::Value::Array(items)) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join("; "),
        Some(serde_json::Value::Null)
        | Some(serde_json::Value::String(_))
        | Some(serde_json::Value::Array(_))
        | None => format!("Request failed with HTTP {}", status),
        Some(other) => other.to_string(),
    }
}
