//! Request orchestrator - lifecycle of one generation sequence
//!
//! A sequence is the original attempt plus any retry attempts the scheduler
//! grants while the model is loading. The orchestrator accepts a manual
//! submission only when its session is idle, runs the sequence as a single
//! task (attempt, classify, schedule, repeat) and publishes every transition
//! through the session context.

use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::error::{OrchestrationError, OrchestrationResult};
use super::outcome::{GenerationOutcome, SequenceReport};
use super::scheduler::{RetryDecision, RetryResumption, RetryScheduler};
use super::state::{Notice, SequencePhase, SessionContext, SessionSnapshot};
use crate::config::{Configuration, RetryConfig};
use crate::observability::Logger;
use crate::provider::{
    GenerationRequest, HttpInferenceClient, InferenceClient, ResponseClassifier, StatusClassifier,
};

/// Result of a manual submission.
#[derive(Debug)]
pub enum SubmitDisposition {
    /// A new sequence started
    Accepted(SequenceHandle),
    /// A sequence was already in flight; nothing was sent
    Ignored,
}

impl SubmitDisposition {
    /// Whether a new sequence started.
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitDisposition::Accepted(_))
    }

    /// Handle of the started sequence, if any.
    pub fn into_handle(self) -> Option<SequenceHandle> {
        match self {
            SubmitDisposition::Accepted(handle) => Some(handle),
            SubmitDisposition::Ignored => None,
        }
    }
}

/// Handle to a sequence running on its own task.
#[derive(Debug)]
pub struct SequenceHandle {
    sequence_id: String,
    join: JoinHandle<SequenceReport>,
}

impl SequenceHandle {
    /// Identifier of the sequence.
    pub fn sequence_id(&self) -> &str {
        &self.sequence_id
    }

    /// Abort the sequence task. The session is reset with a failure notice.
    pub fn abort(&self) {
        self.join.abort();
    }

    /// Wait for the sequence to end. `None` if the task was aborted.
    pub async fn finished(self) -> Option<SequenceReport> {
        self.join.await.ok()
    }
}

struct OrchestratorInner {
    client: Arc<dyn InferenceClient>,
    classifier: Arc<dyn ResponseClassifier>,
    scheduler: RetryScheduler,
    session: SessionContext,
    logger: Option<Arc<Logger>>,
}

/// Builder for [`RequestOrchestrator`].
pub struct OrchestratorBuilder {
    client: Arc<dyn InferenceClient>,
    classifier: Option<Arc<dyn ResponseClassifier>>,
    retry: RetryConfig,
    session: Option<SessionContext>,
    logger: Option<Arc<Logger>>,
}

impl OrchestratorBuilder {
    /// Retry budget and delay bounds (default: 20 retries, 0..600 s).
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Response classifier (default: [`StatusClassifier`] on `retry.unavailable_status`).
    pub fn classifier(mut self, classifier: Arc<dyn ResponseClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Session to drive (default: a fresh session with the configured budget).
    pub fn session(mut self, session: SessionContext) -> Self {
        self.session = Some(session);
        self
    }

    /// Sequence log.
    pub fn logger(mut self, logger: Arc<Logger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Build the orchestrator.
    pub fn build(self) -> RequestOrchestrator {
        let classifier = self
            .classifier
            .unwrap_or_else(|| Arc::new(StatusClassifier::new(self.retry.unavailable_status)));
        let session = self
            .session
            .unwrap_or_else(|| SessionContext::new(self.retry.max_retries));

        RequestOrchestrator {
            inner: Arc::new(OrchestratorInner {
                client: self.client,
                classifier,
                scheduler: RetryScheduler::from_config(&self.retry),
                session,
                logger: self.logger,
            }),
        }
    }
}

struct SequenceStart {
    request: GenerationRequest,
    sequence_id: String,
    max_retries: u32,
}

#[derive(Debug, Clone, Copy)]
struct AttemptProgress {
    attempt: u32,
    is_retry: bool,
    remaining_retries: u32,
}

/// Outcome that ends a sequence. Retry requests are consumed by the loop.
#[derive(Debug)]
enum SequenceEnd {
    Success {
        image_ref: String,
        echoed_prompt: String,
    },
    Failure {
        message: String,
    },
    BudgetExhausted,
    Cancelled,
}

impl From<SequenceEnd> for GenerationOutcome {
    fn from(end: SequenceEnd) -> Self {
        match end {
            SequenceEnd::Success {
                image_ref,
                echoed_prompt,
            } => GenerationOutcome::Success {
                image_ref,
                echoed_prompt,
            },
            SequenceEnd::Failure { message } => GenerationOutcome::Failure { message },
            SequenceEnd::BudgetExhausted => GenerationOutcome::BudgetExhausted,
            SequenceEnd::Cancelled => GenerationOutcome::Cancelled,
        }
    }
}

/// Resets the session if a sequence task is dropped before it finishes.
struct SequenceGuard {
    session: SessionContext,
    sequence_id: String,
    armed: bool,
}

impl SequenceGuard {
    fn new(session: SessionContext, sequence_id: String) -> Self {
        Self {
            session,
            sequence_id,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SequenceGuard {
    fn drop(&mut self) {
        if self.armed {
            self.session.abandon(&self.sequence_id);
        }
    }
}

/// Drives generation sequences for one session.
///
/// Cloning is cheap; clones share the session, client and scheduler.
#[derive(Clone)]
pub struct RequestOrchestrator {
    inner: Arc<OrchestratorInner>,
}

impl RequestOrchestrator {
    /// Create an orchestrator with default retry settings.
    pub fn new(client: Arc<dyn InferenceClient>) -> Self {
        Self::builder(client).build()
    }

    /// Start building an orchestrator around `client`.
    pub fn builder(client: Arc<dyn InferenceClient>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            client,
            classifier: None,
            retry: RetryConfig::default(),
            session: None,
            logger: None,
        }
    }

    /// Build the HTTP client, logger and retry policy from configuration.
    pub fn from_config(config: &Configuration) -> anyhow::Result<Self> {
        let client = HttpInferenceClient::from_config(&config.generator)
            .context("Failed to create inference client")?;
        let logger = Logger::new(
            Some(Path::new(&config.logging.log_file)),
            Some(config.logging.log_level.as_str()),
        )?;

        Ok(Self::builder(Arc::new(client))
            .retry_config(config.retry.clone())
            .logger(Arc::new(logger))
            .build())
    }

    /// Session this orchestrator drives.
    pub fn session(&self) -> &SessionContext {
        &self.inner.session
    }

    /// Current session state.
    pub async fn snapshot(&self) -> SessionSnapshot {
        self.inner.session.snapshot().await
    }

    /// Observe every session state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.session.subscribe()
    }

    /// Submit a prompt from the UI.
    ///
    /// Starts a sequence on its own task when the session is idle. While a
    /// sequence is submitting or waiting for its retry, the call is a no-op and
    /// returns `Ignored`. Results arrive through the session state.
    pub async fn submit(&self, input: impl Into<String>) -> OrchestrationResult<SubmitDisposition> {
        let Some(start) = self.begin_sequence(input.into()).await? else {
            tracing::debug!("submission ignored, a sequence is already in flight");
            return Ok(SubmitDisposition::Ignored);
        };

        let sequence_id = start.sequence_id.clone();
        let this = self.clone();
        let join = tokio::spawn(async move { this.drive_sequence(start).await });

        Ok(SubmitDisposition::Accepted(SequenceHandle { sequence_id, join }))
    }

    /// Submit a prompt and drive the sequence to its end on the current task.
    pub async fn run(&self, input: impl Into<String>) -> OrchestrationResult<SequenceReport> {
        let start = self
            .begin_sequence(input.into())
            .await?
            .ok_or(OrchestrationError::SequenceInFlight)?;
        Ok(self.drive_sequence(start).await)
    }

    /// Cancel a pending retry.
    ///
    /// Only a sequence waiting out its retry delay can be cancelled; it ends
    /// immediately with [`Notice::Cancelled`]. Returns whether one was cancelled.
    pub async fn cancel(&self) -> bool {
        self.inner
            .session
            .update(|state| {
                if state.snapshot.phase != SequencePhase::AwaitingRetryDelay {
                    return false;
                }
                match state.pending_retry.take() {
                    Some(token) => {
                        token.cancel();
                        state.terminate(Some(Notice::Cancelled));
                        true
                    }
                    None => false,
                }
            })
            .await
    }

    /// Claim the session for a new sequence, or `None` if one is in flight.
    async fn begin_sequence(&self, input: String) -> OrchestrationResult<Option<SequenceStart>> {
        if input.trim().is_empty() {
            return Err(OrchestrationError::EmptyInput);
        }

        let sequence_id = uuid::Uuid::new_v4().to_string();
        let max_retries = self
            .inner
            .session
            .update(|state| {
                if state.snapshot.is_generating {
                    return None;
                }
                if state.snapshot.phase == SequencePhase::Terminal {
                    state.snapshot.phase = SequencePhase::Idle;
                    state.snapshot.retry.reset();
                }

                state.snapshot.phase = SequencePhase::Submitting;
                state.snapshot.is_generating = true;
                state.snapshot.input = input.clone();
                state.snapshot.attempts = 0;
                state.snapshot.sequence_id = Some(sequence_id.clone());
                state.snapshot.last_notice = None;
                state.pending_retry = None;
                Some(state.snapshot.retry.max_retries())
            })
            .await;

        Ok(max_retries.map(|max_retries| SequenceStart {
            request: GenerationRequest::new(input),
            sequence_id,
            max_retries,
        }))
    }

    async fn drive_sequence(&self, start: SequenceStart) -> SequenceReport {
        let SequenceStart {
            request,
            sequence_id,
            max_retries,
        } = start;
        let mut guard = SequenceGuard::new(self.inner.session.clone(), sequence_id.clone());

        self.log(|logger| logger.log_sequence_start(&sequence_id, &request.input_text, max_retries));

        let mut is_retry = false;
        let mut retry_token: Option<CancellationToken> = None;
        let mut attempts = 0;
        let mut remaining_retries = max_retries;

        let end = loop {
            let Some(progress) = self
                .begin_attempt(&sequence_id, is_retry, retry_token.as_ref())
                .await
            else {
                break SequenceEnd::Cancelled;
            };
            attempts = progress.attempt;
            remaining_retries = progress.remaining_retries;

            let delay_seconds = match self.attempt(&request, &sequence_id, progress).await {
                GenerationOutcome::RetryRequested { delay_seconds } => delay_seconds,
                GenerationOutcome::Success {
                    image_ref,
                    echoed_prompt,
                } => {
                    break SequenceEnd::Success {
                        image_ref,
                        echoed_prompt,
                    }
                }
                GenerationOutcome::Failure { message } => break SequenceEnd::Failure { message },
                GenerationOutcome::BudgetExhausted => break SequenceEnd::BudgetExhausted,
                GenerationOutcome::Cancelled => break SequenceEnd::Cancelled,
            };

            let decision = self
                .inner
                .session
                .update(|state| {
                    let decision = self
                        .inner
                        .scheduler
                        .on_retry_requested(delay_seconds, &mut state.snapshot.retry);
                    if let RetryDecision::Scheduled(scheduled) = &decision {
                        state.snapshot.phase = SequencePhase::AwaitingRetryDelay;
                        state.pending_retry = Some(scheduled.cancellation_token());
                    }
                    decision
                })
                .await;

            match decision {
                RetryDecision::Exhausted { .. } => break SequenceEnd::BudgetExhausted,
                RetryDecision::Scheduled(scheduled) => {
                    self.log(|logger| {
                        logger.log_retry_scheduled(&sequence_id, scheduled.delay(), remaining_retries)
                    });
                    retry_token = Some(scheduled.cancellation_token());
                    match scheduled.wait().await {
                        RetryResumption::Fire => is_retry = true,
                        RetryResumption::Cancelled => break SequenceEnd::Cancelled,
                    }
                }
            }
        };

        let report = self
            .finish(&sequence_id, end, attempts, max_retries, remaining_retries)
            .await;
        guard.disarm();
        report
    }

    /// Enter Submitting for the next attempt, spending a retry if this is one.
    ///
    /// Returns `None` when the sequence lost the session to a cancellation.
    async fn begin_attempt(
        &self,
        sequence_id: &str,
        is_retry: bool,
        retry_token: Option<&CancellationToken>,
    ) -> Option<AttemptProgress> {
        self.inner
            .session
            .update(|state| {
                let cancelled = retry_token.is_some_and(|token| token.is_cancelled());
                if cancelled || state.snapshot.sequence_id.as_deref() != Some(sequence_id) {
                    return None;
                }

                if is_retry {
                    state.snapshot.retry.consume_retry();
                }
                state.pending_retry = None;
                state.snapshot.phase = SequencePhase::Submitting;
                state.snapshot.attempts += 1;

                Some(AttemptProgress {
                    attempt: state.snapshot.attempts,
                    is_retry,
                    remaining_retries: state.snapshot.retry.remaining_retries,
                })
            })
            .await
    }

    /// One network submission and its classification.
    async fn attempt(
        &self,
        request: &GenerationRequest,
        sequence_id: &str,
        progress: AttemptProgress,
    ) -> GenerationOutcome {
        self.log(|logger| {
            logger.log_attempt(
                sequence_id,
                progress.attempt,
                progress.is_retry,
                progress.remaining_retries,
            )
        });

        let classification = match self.inner.client.send(request).await {
            Ok(response) => self.inner.classifier.classify(&response),
            Err(err) => Err(err),
        };
        if let Err(err) = &classification {
            tracing::debug!(
                sequence = sequence_id,
                attempt = progress.attempt,
                endpoint = self.inner.client.endpoint(),
                retryable = err.is_retryable(),
                error = %err,
                "attempt did not produce an image"
            );
        }

        GenerationOutcome::from_classification(request, classification)
    }

    /// Apply a terminal outcome to the session and build the report.
    async fn finish(
        &self,
        sequence_id: &str,
        end: SequenceEnd,
        attempts: u32,
        max_retries: u32,
        remaining_retries: u32,
    ) -> SequenceReport {
        match &end {
            SequenceEnd::Success {
                image_ref,
                echoed_prompt,
            } => {
                self.inner
                    .session
                    .update(|state| {
                        state.snapshot.current_image = Some(image_ref.clone());
                        state.snapshot.echoed_prompt = Some(echoed_prompt.clone());
                        state.snapshot.input.clear();
                        state.terminate(None);
                    })
                    .await;
                self.log(|logger| logger.log_success(sequence_id, echoed_prompt, image_ref, attempts));
            }
            SequenceEnd::Failure { message } => {
                self.inner
                    .session
                    .update(|state| {
                        state.terminate(Some(Notice::Failure {
                            message: message.clone(),
                        }))
                    })
                    .await;
                self.log(|logger| logger.log_failure(sequence_id, message, attempts));
            }
            SequenceEnd::BudgetExhausted => {
                let notice = Notice::BudgetExhausted { max_retries };
                let message = notice.message();
                self.inner
                    .session
                    .update(|state| state.terminate(Some(notice)))
                    .await;
                self.log(|logger| logger.log_budget_exhausted(sequence_id, &message));
            }
            // cancel() already moved the session to Terminal; it may now belong
            // to a newer sequence, so it is left alone here.
            SequenceEnd::Cancelled => {
                self.log(|logger| logger.log_cancelled(sequence_id, attempts));
            }
        }

        SequenceReport {
            sequence_id: sequence_id.to_string(),
            outcome: end.into(),
            attempts,
            retries_used: max_retries.saturating_sub(remaining_retries),
            remaining_retries,
        }
    }

    fn log(&self, write: impl FnOnce(&Logger) -> anyhow::Result<()>) {
        if let Some(logger) = &self.inner.logger {
            if let Err(e) = write(logger) {
                tracing::warn!(error = %e, "failed to write sequence log");
            }
        }
    }
}
