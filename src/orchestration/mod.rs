//! Request orchestration - retry lifecycle for generation sequences
//!
//! This module drives one prompt submission to a terminal outcome:
//! - Idempotent manual submission (a second submit while busy is ignored)
//! - Classification of each attempt into success, retry or failure
//! - Bounded retries on a per-sequence budget, spaced by server-suggested delays
//! - Cancellation of a pending retry
//!
//! ## State machine
//!
//! ```text
//! Idle -> Submitting -> AwaitingRetryDelay -> Submitting -> ... -> Terminal
//!                  \-> Terminal (success, failure, budget exhausted)
//! ```
//!
//! A terminal sequence restores the full retry budget. The next accepted
//! submission moves the session from Terminal back through Idle.

pub mod error;
pub mod orchestrator;
pub mod outcome;
pub mod scheduler;
pub mod state;

pub use error::{OrchestrationError, OrchestrationResult};
pub use orchestrator::{OrchestratorBuilder, RequestOrchestrator, SequenceHandle, SubmitDisposition};
pub use outcome::{GenerationOutcome, SequenceReport};
pub use scheduler::{RetryDecision, RetryResumption, RetryScheduler, ScheduledRetry};
pub use state::{Notice, RetryState, SequencePhase, SessionContext, SessionSnapshot};
