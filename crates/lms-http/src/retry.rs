//! Retry policy and the retry loop state machine
//!
//! ```text
//! Attempting --ok-------------------> Succeeded
//! Attempting --terminal / exhausted-> FailedTerminal
//! Attempting --retryable-----------> Sleeping
//! Sleeping   --delay elapsed-------> Attempting (attempt + 1)
//! ```
//!
//! The machine only computes transitions; the client drives it and owns the
//! response and last error. Delays go through [`Sleeper`] so the loop does
//! not depend on a particular scheduler.

use futures::future::BoxFuture;
use rand::Rng;
use std::time::Duration;

use crate::config::RetryConfig;
use crate::error::HttpError;

/// Backoff parameters derived from [`RetryConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
            jitter_ratio: config.jitter_ratio,
        }
    }

    /// `base * 2^(attempt-1)`, saturating
    pub fn exponential(&self, attempt: u32) -> Duration {
        let factor = 2u64
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let base_ms = self.base_delay.as_millis() as u64;
        Duration::from_millis(base_ms.saturating_mul(factor))
    }

    /// Delay before the attempt following `attempt`, for a jitter sample in `[0, 1)`
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let exponential = self.exponential(attempt);
        let jitter_ms = exponential.as_millis() as f64 * self.jitter_ratio * sample.clamp(0.0, 1.0);
        let total = exponential.saturating_add(Duration::from_millis(jitter_ms as u64));
        total.min(self.max_delay)
    }

    /// Delay before the attempt following `attempt`, with random jitter
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let sample: f64 = rand::thread_rng().r#gen();
        self.delay_with_sample(attempt, sample)
    }

    /// Whether `error` on attempt number `attempt` should be retried
    pub fn should_retry(&self, attempt: u32, error: &HttpError) -> bool {
        error.is_retryable() && attempt < self.max_attempts
    }
}

/// State of one logical request's retry loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RetryState {
    Attempting { attempt: u32 },
    Sleeping { attempt: u32, delay: Duration },
    Succeeded,
    FailedTerminal,
}

impl RetryState {
    pub fn start() -> Self {
        RetryState::Attempting { attempt: 1 }
    }

    pub fn on_success(self) -> Self {
        match self {
            RetryState::Attempting { .. } => RetryState::Succeeded,
            other => other,
        }
    }

    pub fn on_failure(self, error: &HttpError, policy: &RetryPolicy) -> Self {
        match self {
            RetryState::Attempting { attempt } => {
                if policy.should_retry(attempt, error) {
                    RetryState::Sleeping {
                        attempt,
                        delay: policy.delay_for(attempt),
                    }
                } else {
                    RetryState::FailedTerminal
                }
            }
            other => other,
        }
    }

    pub fn on_wake(self) -> Self {
        match self {
            RetryState::Sleeping { attempt, .. } => RetryState::Attempting {
                attempt: attempt + 1,
            },
            other => other,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RetryState::Succeeded | RetryState::FailedTerminal)
    }
}

/// Scheduler-agnostic delay primitive
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

/// [`Sleeper`] backed by `tokio::time::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(duration))
    }
}
