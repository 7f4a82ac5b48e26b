//! Error taxonomy for generation attempts.

use thiserror::Error;

/// Errors an attempt can end with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    /// The model is still loading; retry after the suggested delay.
    #[error("Model is loading (estimated time: {})", format_estimate(.estimated_time))]
    Unavailable {
        /// Server-suggested wait in seconds, untrusted and possibly missing.
        estimated_time: Option<f64>,
    },

    /// The service rejected the request.
    #[error("{message}")]
    Terminal {
        /// Status code of the rejected response.
        status: u16,
        /// Error message from the response payload.
        message: String,
    },

    /// The retry budget ran out while the model was still loading.
    #[error("Model still loading after {max_retries} retries")]
    BudgetExhausted {
        /// Budget that was exhausted.
        max_retries: u32,
    },

    /// The response could not be parsed or classified.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The request never produced a response.
    #[error("Network error: {0}")]
    Network(String),
}

fn format_estimate(estimated_time: &Option<f64>) -> String {
    match estimated_time {
        Some(secs) => format!("{}s", secs),
        None => "unknown".to_string(),
    }
}

impl GenerationError {
    /// Whether the sequence should re-submit after this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Unavailable { .. })
    }
}

/// Result type for provider operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GenerationError::Terminal {
            status: 400,
            message: "NSFW content detected".to_string(),
        };
        assert_eq!(err.to_string(), "NSFW content detected");

        let err = GenerationError::Unavailable {
            estimated_time: Some(5.0),
        };
        assert!(err.to_string().contains("5s"));

        let err = GenerationError::Unavailable {
            estimated_time: None,
        };
        assert!(err.to_string().contains("unknown"));

        let err = GenerationError::BudgetExhausted { max_retries: 20 };
        assert!(err.to_string().contains("20 retries"));
    }

    #[test]
    fn test_only_unavailable_is_retryable() {
        assert!(GenerationError::Unavailable {
            estimated_time: None
        }
        .is_retryable());
        assert!(!GenerationError::Network("refused".to_string()).is_retryable());
        assert!(!GenerationError::MalformedResponse("eof".to_string()).is_retryable());
        assert!(!GenerationError::BudgetExhausted { max_retries: 20 }.is_retryable());
    }
}
