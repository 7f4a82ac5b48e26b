//! Session state shared between the orchestrator, the scheduler and observers.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;

use crate::config::DEFAULT_MAX_RETRIES;
use crate::provider::GenerationError;

/// Phase of the request state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencePhase {
    /// No sequence has run yet, or the last one was reset for a new submission
    Idle,
    /// A network attempt is in flight
    Submitting,
    /// Waiting out a server-suggested delay before the next attempt
    AwaitingRetryDelay,
    /// The last sequence ended; the next accepted submission resets to Idle
    Terminal,
}

/// Retry budget for the active sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    /// Retry attempts still permitted in this sequence
    pub remaining_retries: u32,
    /// Delay of the scheduled retry; `None` when no retry is pending
    pub pending_delay: Option<Duration>,
    max_retries: u32,
}

impl RetryState {
    /// Create a full budget of `max_retries`.
    pub fn new(max_retries: u32) -> Self {
        Self {
            remaining_retries: max_retries,
            pending_delay: None,
            max_retries,
        }
    }

    /// Budget a sequence starts with.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Whether no retries remain.
    pub fn is_exhausted(&self) -> bool {
        self.remaining_retries == 0
    }

    /// Retries spent so far in this sequence.
    pub fn retries_used(&self) -> u32 {
        self.max_retries.saturating_sub(self.remaining_retries)
    }

    /// Whether the state equals a fresh budget.
    pub fn is_initial(&self) -> bool {
        self.remaining_retries == self.max_retries && self.pending_delay.is_none()
    }

    /// Spend one retry (floored at zero) and clear the pending delay.
    pub(crate) fn consume_retry(&mut self) {
        self.remaining_retries = self.remaining_retries.saturating_sub(1);
        self.pending_delay = None;
    }

    /// Restore the full budget.
    pub(crate) fn reset(&mut self) {
        self.remaining_retries = self.max_retries;
        self.pending_delay = None;
    }
}

impl Default for RetryState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

/// Terminal notification for the UI's log channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The service rejected the request, or it could not be completed
    Failure {
        /// Message surfaced to the user
        message: String,
    },
    /// The model was still loading when the retry budget ran out
    BudgetExhausted {
        /// Budget that was exhausted
        max_retries: u32,
    },
    /// A pending retry was cancelled
    Cancelled,
}

impl Notice {
    /// Message for the UI's notification channel.
    pub fn message(&self) -> String {
        match self {
            Notice::Failure { message } => message.clone(),
            Notice::BudgetExhausted { max_retries } => format!(
                "{}. Try request again in 5 minutes.",
                GenerationError::BudgetExhausted {
                    max_retries: *max_retries
                }
            ),
            Notice::Cancelled => "Pending retry cancelled".to_string(),
        }
    }
}

/// Observable view of a session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// Current state machine phase
    pub phase: SequencePhase,
    /// True while a sequence, including pending retries, is unresolved
    pub is_generating: bool,
    /// Prompt input field; cleared after a successful generation
    pub input: String,
    /// Image produced by the last successful sequence
    pub current_image: Option<String>,
    /// Prompt that produced `current_image`
    pub echoed_prompt: Option<String>,
    /// Retry budget of the active sequence
    pub retry: RetryState,
    /// Network attempts made by the current or last sequence
    pub attempts: u32,
    /// Identifier of the current or last sequence
    pub sequence_id: Option<String>,
    /// Terminal notice of the last sequence, if it did not succeed
    pub last_notice: Option<Notice>,
}

impl SessionSnapshot {
    fn new(max_retries: u32) -> Self {
        Self {
            phase: SequencePhase::Idle,
            is_generating: false,
            input: String::new(),
            current_image: None,
            echoed_prompt: None,
            retry: RetryState::new(max_retries),
            attempts: 0,
            sequence_id: None,
            last_notice: None,
        }
    }
}

/// Mutable session state guarded by [`SessionContext`].
#[derive(Debug)]
pub(crate) struct SessionState {
    pub snapshot: SessionSnapshot,
    /// Cancellation handle of the scheduled resumption, while one is pending
    pub pending_retry: Option<CancellationToken>,
}

impl SessionState {
    /// Move to Terminal: clear the in-flight flag and restore the budget.
    pub fn terminate(&mut self, notice: Option<Notice>) {
        self.snapshot.phase = SequencePhase::Terminal;
        self.snapshot.is_generating = false;
        self.snapshot.retry.reset();
        self.snapshot.last_notice = notice;
        self.pending_retry = None;
    }

    /// Terminate `sequence_id` if it still owns the session.
    fn reset_abandoned(&mut self, sequence_id: &str) {
        if self.snapshot.sequence_id.as_deref() != Some(sequence_id) || !self.snapshot.is_generating
        {
            return;
        }
        if let Some(token) = self.pending_retry.take() {
            token.cancel();
        }
        self.terminate(Some(Notice::Failure {
            message: "Generation sequence aborted".to_string(),
        }));
        tracing::warn!(sequence = sequence_id, "generation sequence aborted, session reset");
    }
}

/// Request context shared by one orchestrator and its observers.
///
/// Each context carries at most one active sequence. Independent contexts
/// run independent sequences.
#[derive(Debug, Clone)]
pub struct SessionContext {
    state: Arc<RwLock<SessionState>>,
    updates: Arc<watch::Sender<SessionSnapshot>>,
    /// Sequence whose task ended while the state lock was busy
    abandoned: Arc<Mutex<Option<String>>>,
}

impl SessionContext {
    /// Create an idle session with a retry budget of `max_retries`.
    pub fn new(max_retries: u32) -> Self {
        let snapshot = SessionSnapshot::new(max_retries);
        let (updates, _) = watch::channel(snapshot.clone());
        Self {
            state: Arc::new(RwLock::new(SessionState {
                snapshot,
                pending_retry: None,
            })),
            updates: Arc::new(updates),
            abandoned: Arc::new(Mutex::new(None)),
        }
    }

    /// Current state (read-only copy).
    pub async fn snapshot(&self) -> SessionSnapshot {
        if self.has_abandoned() {
            return self.update(|state| state.snapshot.clone()).await;
        }
        self.state.read().await.snapshot.clone()
    }

    /// Observe every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Update the prompt input field.
    pub async fn set_input(&self, input: impl Into<String>) {
        let input = input.into();
        self.update(|state| state.snapshot.input = input).await;
    }

    /// Mutate the state under the write lock and publish the result.
    pub(crate) async fn update<R>(&self, f: impl FnOnce(&mut SessionState) -> R) -> R {
        let mut state = self.state.write().await;
        self.settle_abandoned(&mut state);
        let result = f(&mut state);
        self.updates.send_replace(state.snapshot.clone());
        result
    }

    /// Reset the session for a sequence whose task ended without finishing.
    ///
    /// Callable from `Drop`. When the state lock is busy the sequence is
    /// recorded and reset by the next write; a task is also spawned to perform
    /// that write so observers see the reset without further calls.
    pub(crate) fn abandon(&self, sequence_id: &str) {
        if let Ok(mut state) = self.state.try_write() {
            state.reset_abandoned(sequence_id);
            self.updates.send_replace(state.snapshot.clone());
            return;
        }

        *self.abandoned.lock().unwrap_or_else(PoisonError::into_inner) = Some(sequence_id.to_string());
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let session = self.clone();
                handle.spawn(async move { session.update(|_| ()).await });
            }
            Err(_) => tracing::debug!(
                sequence = sequence_id,
                "no runtime available, reset deferred to the next session update"
            ),
        }
    }

    fn has_abandoned(&self) -> bool {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn settle_abandoned(&self, state: &mut SessionState) {
        let abandoned = self
            .abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(sequence_id) = abandoned {
            state.reset_abandoned(&sequence_id);
        }
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}
