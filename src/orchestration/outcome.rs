//! Attempt and sequence outcomes.

use crate::provider::{Classification, GenerationError, GenerationRequest};

/// Classified result of one attempt, consumed immediately by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The service produced an image
    Success {
        /// Image reference returned by the service
        image_ref: String,
        /// Prompt the image was generated from
        echoed_prompt: String,
    },
    /// The model is loading; retry after the (untrusted) suggested delay
    RetryRequested {
        /// Server-suggested delay in seconds, if the response carried one
        delay_seconds: Option<f64>,
    },
    /// Non-retryable failure
    Failure {
        /// Message surfaced to the caller
        message: String,
    },
    /// The retry budget ran out while the model was still loading
    BudgetExhausted,
    /// The pending retry was cancelled
    Cancelled,
}

impl GenerationOutcome {
    /// Map a classification onto an outcome for `request`.
    pub fn from_classification(request: &GenerationRequest, classification: Classification) -> Self {
        match classification {
            Ok(image) => GenerationOutcome::Success {
                image_ref: image.image_ref,
                echoed_prompt: request.input_text.clone(),
            },
            Err(GenerationError::Unavailable { estimated_time }) => {
                GenerationOutcome::RetryRequested {
                    delay_seconds: estimated_time,
                }
            }
            Err(err) => GenerationOutcome::Failure {
                message: err.to_string(),
            },
        }
    }

    /// Whether this outcome ends the sequence.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationOutcome::RetryRequested { .. })
    }
}

/// Summary of a finished sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceReport {
    /// Sequence identifier
    pub sequence_id: String,
    /// Terminal outcome
    pub outcome: GenerationOutcome,
    /// Network calls made, including the original submission
    pub attempts: u32,
    /// Retry attempts made beyond the original submission
    pub retries_used: u32,
    /// Budget left at the moment the sequence ended, before the reset
    pub remaining_retries: u32,
}

impl SequenceReport {
    /// Whether the sequence produced an image.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, GenerationOutcome::Success { .. })
    }
}
