//! Errors returned to callers of the orchestrator.

use thiserror::Error;

/// Caller-side errors from [`super::RequestOrchestrator`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrchestrationError {
    /// The prompt was empty or whitespace.
    #[error("Prompt must not be empty")]
    EmptyInput,

    /// Another sequence owns the session.
    #[error("A generation sequence is already in flight")]
    SequenceInFlight,
}

/// Result type for orchestration operations.
pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
