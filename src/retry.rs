//! Retry controller with exponential backoff
//!
//! Drives one download through a bounded state machine:
//!
//! ```text
//! Idle -> Attempting -> Succeeded
//!                    -> Canceled
//!                    -> ExhaustedFailed
//!                    -> RetryScheduled -> Attempting ...
//! ```
//!
//! The cancel flag is checked before every attempt and raced against every
//! backoff wait. An attempt that is already running is never interrupted, so an
//! attempt that succeeds after a cancel request still yields `Succeeded`.

use crate::cancel::CancelFlag;
use crate::classify::{ClassifiedError, classify};
use crate::config::RetryConfig;
use crate::error::Error;
use crate::types::DownloadOutcome;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Controller state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetryPhase {
    /// No attempt made yet
    Idle,
    /// An engine invocation is in flight
    Attempting,
    /// Waiting before the next attempt
    RetryScheduled(Duration),
    /// An attempt succeeded
    Succeeded,
    /// Cancellation was observed
    Canceled,
    /// A non-retryable failure, or the attempt limit was reached
    ExhaustedFailed,
}

impl RetryPhase {
    /// Whether the controller has stopped
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetryPhase::Succeeded | RetryPhase::Canceled | RetryPhase::ExhaustedFailed
        )
    }
}

/// Per-run retry bookkeeping, owned by one controller
#[derive(Debug, Default)]
pub struct RetryState {
    /// Attempts started so far
    pub attempt: u32,
    /// Most recent failure while a retry is pending
    ///
    /// Moved into the outcome when the run ends in failure.
    pub last_error: Option<ClassifiedError>,
    /// Cancellation was observed
    pub canceled: bool,
}

/// Result of a controller run
#[derive(Debug)]
pub struct RetryOutcome {
    /// Engine invocations made
    pub attempts: u32,
    /// Terminal outcome
    pub outcome: DownloadOutcome,
}

/// Bounded retry state machine for one download
#[derive(Debug)]
pub struct RetryController<'a> {
    config: &'a RetryConfig,
    cancel: &'a CancelFlag,
    phase: RetryPhase,
    state: RetryState,
}

impl<'a> RetryController<'a> {
    /// Create a controller in the `Idle` phase
    pub fn new(config: &'a RetryConfig, cancel: &'a CancelFlag) -> Self {
        Self {
            config,
            cancel,
            phase: RetryPhase::Idle,
            state: RetryState::default(),
        }
    }

    /// Current phase
    pub fn phase(&self) -> RetryPhase {
        self.phase
    }

    /// Current bookkeeping
    pub fn state(&self) -> &RetryState {
        &self.state
    }

    /// Run `operation` until it succeeds, fails permanently, exhausts the
    /// attempt limit, or the run is canceled
    ///
    /// `operation` receives the 1-based attempt number. Exactly one terminal
    /// phase is reached.
    pub async fn run<F, Fut>(&mut self, mut operation: F) -> RetryOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), Error>>,
    {
        let cancel = self.cancel;
        let max_attempts = self.config.max_attempts.max(1);

        loop {
            if cancel.is_cancelled() {
                return self.finish_canceled();
            }

            self.state.attempt += 1;
            self.phase = RetryPhase::Attempting;
            let attempt = self.state.attempt;
            tracing::info!(attempt, max_attempts, "Starting download attempt");

            let error = match operation(attempt).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Download succeeded after retry");
                    }
                    self.phase = RetryPhase::Succeeded;
                    self.state.last_error = None;
                    return RetryOutcome {
                        attempts: attempt,
                        outcome: DownloadOutcome::Succeeded,
                    };
                }
                Err(e) => classify(e),
            };

            if cancel.is_cancelled() {
                tracing::info!(attempt, error = %error.cause, "Attempt failed after cancel request");
                return self.finish_canceled();
            }

            if !error.kind.is_retryable() {
                tracing::error!(
                    attempt,
                    kind = %error.kind,
                    error = %error.cause,
                    "Download failed with non-retryable error"
                );
                return self.finish_failed(error);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    attempts = attempt,
                    kind = %error.kind,
                    error = %error.cause,
                    "Download failed after all retry attempts exhausted"
                );
                return self.finish_failed(error);
            }

            let delay = self.backoff_delay(attempt);
            tracing::warn!(
                attempt,
                max_attempts,
                kind = %error.kind,
                error = %error.cause,
                delay_ms = delay.as_millis() as u64,
                "Download attempt failed, retrying"
            );
            self.state.last_error = Some(error);
            self.phase = RetryPhase::RetryScheduled(delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = cancel.cancelled() => {
                    tracing::info!(attempt, "Canceled during backoff");
                    return self.finish_canceled();
                }
            }
        }
    }

    /// Delay before the attempt following `attempt` (1-based)
    ///
    /// `initial_delay * multiplier^(attempt - 1)`, capped at `max_delay`, with
    /// optional jitter applied after the cap.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.config.initial_delay.as_secs_f64()
            * self.config.backoff_multiplier.powi(exponent);
        let max_secs = self.config.max_delay.as_secs_f64();
        let base = if secs.is_finite() && secs < max_secs {
            Duration::from_secs_f64(secs.max(0.0))
        } else {
            self.config.max_delay
        };

        if self.config.jitter {
            add_jitter(base)
        } else {
            base
        }
    }

    fn finish_canceled(&mut self) -> RetryOutcome {
        self.phase = RetryPhase::Canceled;
        self.state.canceled = true;
        self.state.last_error = None;
        RetryOutcome {
            attempts: self.state.attempt,
            outcome: DownloadOutcome::Canceled,
        }
    }

    fn finish_failed(&mut self, error: ClassifiedError) -> RetryOutcome {
        self.phase = RetryPhase::ExhaustedFailed;
        self.state.last_error = None;
        RetryOutcome {
            attempts: self.state.attempt,
            outcome: DownloadOutcome::Failed(error),
        }
    }
}

/// Add random jitter to a delay
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor))
        .unwrap_or(Duration::MAX)
}
