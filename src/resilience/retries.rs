//! Bounded retry of a single external operation.
//!
//! # Responsibilities
//! - Invoke the operation at most `max_attempts` times, strictly sequentially
//! - Sleep between transient failures according to the backoff policy
//! - Stop immediately on a fatal failure
//! - Report exhaustion with the last cause instead of dropping it
//!
//! # Design Decisions
//! - No backoff after the final attempt
//! - Cancellation is checked before every attempt and interrupts a pending backoff
//! - Attempt timeouts count as transient failures

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::schema::RetryConfig;
use crate::lifecycle::shutdown::CancelToken;
use crate::resilience::backoff::Backoff;
use crate::resilience::sleeper::{Sleeper, TokioSleeper};
use crate::resilience::timeouts;

/// Outcome of one attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult<T> {
    Success(T),
    /// Likely to succeed on retry (network, availability).
    TransientFailure(String),
    /// Certain to recur (malformed request, permanent rejection).
    FatalFailure(String),
}

/// What the executor derived from its sequence of attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    ExhaustedRetries { last_cause: String, attempts: u32 },
    /// A fatal attempt ended the loop early.
    Failed { cause: String, attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<T> RetryOutcome<T> {
    /// Number of external calls actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. }
            | Self::ExhaustedRetries { attempts, .. }
            | Self::Failed { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetryConfigError {
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(u32),
}

/// Wraps an operation with bounded retry and backoff.
#[derive(Clone)]
pub struct RetryExecutor {
    max_attempts: u32,
    backoff: Backoff,
    attempt_timeout: Option<Duration>,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for RetryExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryExecutor")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("attempt_timeout", &self.attempt_timeout)
            .finish()
    }
}

impl RetryExecutor {
    pub fn new(max_attempts: u32, backoff: Backoff) -> Result<Self, RetryConfigError> {
        if max_attempts == 0 {
            return Err(RetryConfigError::InvalidMaxAttempts(max_attempts));
        }
        Ok(Self {
            max_attempts,
            backoff,
            attempt_timeout: None,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    pub fn from_config(config: &RetryConfig) -> Result<Self, RetryConfigError> {
        let executor = Self::new(config.max_attempts, Backoff::from_config(config))?;
        Ok(match config.attempt_timeout_secs {
            0 => executor,
            secs => executor.with_attempt_timeout(Duration::from_secs(secs)),
        })
    }

    pub fn with_attempt_timeout(mut self, limit: Duration) -> Self {
        self.attempt_timeout = Some(limit);
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `operation` until it succeeds, fails fatally, is cancelled, or
    /// the attempt bound is reached. The closure receives the 1-based
    /// attempt number.
    pub async fn execute<T, F, Fut>(&self, mut operation: F, cancel: &CancelToken) -> RetryOutcome<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = AttemptResult<T>>,
    {
        let mut last_cause = String::new();

        for attempt in 1..=self.max_attempts {
            if cancel.is_cancelled() {
                tracing::info!(attempt, "Cancellation observed before attempt");
                return RetryOutcome::Cancelled { attempts: attempt - 1 };
            }

            let result = match self.attempt_timeout {
                Some(limit) => timeouts::bounded(limit, operation(attempt)).await,
                None => operation(attempt).await,
            };

            match result {
                AttemptResult::Success(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "Operation succeeded after retry");
                    }
                    return RetryOutcome::Succeeded { value, attempts: attempt };
                }
                AttemptResult::FatalFailure(cause) => {
                    tracing::error!(attempt, cause = %cause, "Fatal failure, not retrying");
                    return RetryOutcome::Failed { cause, attempts: attempt };
                }
                AttemptResult::TransientFailure(cause) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        cause = %cause,
                        "Transient failure"
                    );
                    last_cause = cause;
                }
            }

            if attempt < self.max_attempts {
                let delay = self.backoff.delay(attempt - 1);
                tracing::debug!(delay_ms = delay.as_millis() as u64, "Backing off");
                tokio::select! {
                    _ = self.sleeper.sleep(delay) => {}
                    _ = cancel.cancelled() => {
                        tracing::info!(attempt, "Cancellation observed during backoff");
                        return RetryOutcome::Cancelled { attempts: attempt };
                    }
                }
            }
        }

        tracing::warn!(
            attempts = self.max_attempts,
            last_cause = %last_cause,
            "Retries exhausted"
        );
        RetryOutcome::ExhaustedRetries {
            last_cause,
            attempts: self.max_attempts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::shutdown::CancellationSignal;
    use crate::resilience::backoff::BackoffPolicy;
    use crate::resilience::sleeper::RecordingSleeper;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn executor(max_attempts: u32, sleeper: &RecordingSleeper) -> RetryExecutor {
        RetryExecutor::new(max_attempts, Backoff::new(BackoffPolicy::fixed(Duration::from_secs(2))))
            .unwrap()
            .with_sleeper(sleeper.clone())
    }

    /// Fails transiently `failures` times, then succeeds.
    fn flaky(failures: u32, calls: &AtomicU32) -> impl FnMut(u32) -> std::future::Ready<AttemptResult<&'static str>> + '_ {
        move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < failures {
                AttemptResult::TransientFailure(format!("unavailable #{}", n + 1))
            } else {
                AttemptResult::Success("ok")
            })
        }
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let err = RetryExecutor::new(0, Backoff::default()).unwrap_err();
        assert_eq!(err, RetryConfigError::InvalidMaxAttempts(0));
    }

    #[tokio::test]
    async fn test_succeeds_after_k_failures() {
        for k in 0..3 {
            let sleeper = RecordingSleeper::new();
            let calls = AtomicU32::new(0);
            let outcome = executor(3, &sleeper).execute(flaky(k, &calls), &CancelToken::never()).await;
            assert_eq!(outcome, RetryOutcome::Succeeded { value: "ok", attempts: k + 1 });
            assert_eq!(calls.load(Ordering::SeqCst), k + 1);
            assert_eq!(sleeper.count(), k as usize);
        }
    }

    #[tokio::test]
    async fn test_exhaustion_reports_last_cause() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);
        let outcome = executor(3, &sleeper).execute(flaky(10, &calls), &CancelToken::never()).await;
        assert_eq!(
            outcome,
            RetryOutcome::ExhaustedRetries {
                last_cause: "unavailable #3".to_string(),
                attempts: 3
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(2); 2]);
    }

    #[tokio::test]
    async fn test_fatal_failure_stops_immediately() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);
        let outcome: RetryOutcome<()> = executor(5, &sleeper)
            .execute(
                |_| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { AttemptResult::FatalFailure("400 bad request".to_string()) }
                },
                &CancelToken::never(),
            )
            .await;
        assert_eq!(
            outcome,
            RetryOutcome::Failed {
                cause: "400 bad request".to_string(),
                attempts: 1
            }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(sleeper.count(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_attempt() {
        let signal = CancellationSignal::new();
        signal.cancel();
        let calls = AtomicU32::new(0);
        let outcome = executor(3, &RecordingSleeper::new())
            .execute(flaky(0, &calls), &signal.token())
            .await;
        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 0 });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_backoff() {
        let signal = CancellationSignal::new();
        let token = signal.token();
        let calls = AtomicU32::new(0);
        let executor = RetryExecutor::new(3, Backoff::new(BackoffPolicy::fixed(Duration::from_secs(3600)))).unwrap();

        let run = executor.execute(flaky(10, &calls), &token);
        let cancel = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            signal.cancel();
        };
        let (outcome, ()) = tokio::time::timeout(Duration::from_secs(5), async move { tokio::join!(run, cancel) })
            .await
            .unwrap();
        assert_eq!(outcome, RetryOutcome::Cancelled { attempts: 1 });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_retried() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);
        let outcome = executor(2, &sleeper)
            .with_attempt_timeout(Duration::from_millis(10))
            .execute(
                |attempt| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if attempt == 1 {
                            tokio::time::sleep(Duration::from_secs(10)).await;
                        }
                        AttemptResult::Success(attempt)
                    }
                },
                &CancelToken::never(),
            )
            .await;
        assert_eq!(outcome, RetryOutcome::Succeeded { value: 2, attempts: 2 });
        assert_eq!(sleeper.count(), 1);
    }
}
