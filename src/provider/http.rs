//! HTTP inference client built on reqwest.

use super::error::{GenerationError, GenerationResult};
use super::traits::InferenceClient;
use super::types::{GenerationRequest, RawResponse};
use crate::config::GeneratorConfig;
use std::time::Duration;

/// Posts `{ "input": ... }` to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpInferenceClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpInferenceClient {
    /// Create a client for `endpoint` with the given per-request timeout.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> GenerationResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    /// Create a client from the `[generator]` configuration section.
    pub fn from_config(config: &GeneratorConfig) -> GenerationResult<Self> {
        Self::new(config.endpoint.clone(), config.request_timeout())
    }
}

#[async_trait::async_trait]
impl InferenceClient for HttpInferenceClient {
    async fn send(&self, request: &GenerationRequest) -> GenerationResult<RawResponse> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GenerationError::Network(format!("Request to {} timed out", self.endpoint))
                } else {
                    GenerationError::Network(format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| GenerationError::Network(format!("Failed to read response body: {}", e)))?;

        tracing::debug!(
            endpoint = %self.endpoint,
            status,
            bytes = body.len(),
            "inference response received"
        );

        Ok(RawResponse::new(status, body.to_vec()))
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}
