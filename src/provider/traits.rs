//! Inference client abstraction.
//!
//! This module defines the trait the orchestrator uses to reach the remote
//! inference service. The HTTP implementation lives in [`super::http`]; tests
//! substitute scripted clients.

use super::error::GenerationResult;
use super::types::{GenerationRequest, RawResponse};

/// Transport to the remote inference service.
///
/// One call to [`InferenceClient::send`] is exactly one network submission.
/// Implementations return the response unclassified; a response with an error
/// status is still `Ok`. `Err` is reserved for requests that never produced a
/// response (connection refused, timeout, unreadable body), reported as
/// `GenerationError::Network`.
///
/// # Example
///
/// ```ignore
/// use avagen::provider::{GenerationRequest, InferenceClient};
///
/// async fn probe(client: &dyn InferenceClient) -> anyhow::Result<()> {
///     let response = client.send(&GenerationRequest::new("jagonzalr astronaut")).await?;
///     println!("status: {}", response.status);
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    /// Submit a generation request and return the raw response.
    async fn send(&self, request: &GenerationRequest) -> GenerationResult<RawResponse>;

    /// Endpoint description for logging and debugging.
    fn endpoint(&self) -> &str;
}
