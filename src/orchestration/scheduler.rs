//! Delayed re-invocation of generation attempts.
//!
//! The scheduler decides whether a "model loading" response may be retried and,
//! if so, hands back a [`ScheduledRetry`]: a timer for the server-suggested delay
//! that can be cancelled before it fires.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::state::RetryState;
use crate::config::RetryConfig;

/// Deadline offset used when a configured delay overflows `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// What to do with a `RetryRequested` outcome.
#[derive(Debug)]
pub enum RetryDecision {
    /// Wait on the timer, then re-submit as a retry attempt
    Scheduled(ScheduledRetry),
    /// Budget spent; the sequence must terminate without another call
    Exhausted {
        /// Budget that was exhausted
        max_retries: u32,
    },
}

/// How a scheduled retry resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryResumption {
    /// The delay elapsed; re-submit now
    Fire,
    /// The retry was cancelled before the delay elapsed
    Cancelled,
}

/// Timer handle for one pending retry.
#[derive(Debug)]
pub struct ScheduledRetry {
    delay: Duration,
    deadline: Instant,
    token: CancellationToken,
}

impl ScheduledRetry {
    fn new(delay: Duration) -> Self {
        let now = Instant::now();
        Self {
            delay,
            deadline: now.checked_add(delay).unwrap_or_else(|| now + FAR_FUTURE),
            token: CancellationToken::new(),
        }
    }

    /// Delay this retry waits for.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Token that cancels this retry; a pending or future `wait` then resolves `Cancelled`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Suspend until the delay elapses or the retry is cancelled.
    pub async fn wait(self) -> RetryResumption {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => RetryResumption::Cancelled,
            _ = tokio::time::sleep_until(self.deadline) => RetryResumption::Fire,
        }
    }
}

/// Turns server-suggested delays into scheduled retries within a budget.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryScheduler {
    min_delay: Duration,
    max_delay: Duration,
}

impl RetryScheduler {
    /// Create a scheduler clamping delays into `[min_delay, max_delay]`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay: max_delay.max(min_delay),
        }
    }

    /// Create a scheduler from the `[retry]` configuration section.
    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            seconds_to_duration(config.min_retry_delay_seconds),
            seconds_to_duration(config.max_retry_delay_seconds),
        )
    }

    /// Smallest delay ever scheduled.
    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    /// Largest delay ever scheduled.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Convert an untrusted server estimate into a delay.
    ///
    /// Missing, NaN and non-positive values become the minimum delay; values
    /// beyond the maximum (including infinity) are capped.
    pub fn sanitize_delay(&self, delay_seconds: Option<f64>) -> Duration {
        match delay_seconds {
            Some(secs) if secs.is_nan() || secs <= 0.0 => self.min_delay,
            Some(secs) if secs >= self.max_delay.as_secs_f64() => self.max_delay,
            Some(secs) => Duration::try_from_secs_f64(secs)
                .unwrap_or(self.max_delay)
                .max(self.min_delay),
            None => self.min_delay,
        }
    }

    /// Handle a `RetryRequested` outcome against the sequence's budget.
    ///
    /// With budget left, records the pending delay on `retry` and returns the
    /// timer. With none left, returns `Exhausted` and leaves `retry` untouched so
    /// the caller observes `remaining_retries == 0` before resetting.
    pub fn on_retry_requested(
        &self,
        delay_seconds: Option<f64>,
        retry: &mut RetryState,
    ) -> RetryDecision {
        if retry.is_exhausted() {
            return RetryDecision::Exhausted {
                max_retries: retry.max_retries(),
            };
        }

        let delay = self.sanitize_delay(delay_seconds);
        retry.pending_delay = Some(delay);
        RetryDecision::Scheduled(ScheduledRetry::new(delay))
    }
}

impl Default for RetryScheduler {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

fn seconds_to_duration(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    } else if secs == f64::INFINITY {
        Duration::MAX
    } else {
        Duration::ZERO
    }
}
