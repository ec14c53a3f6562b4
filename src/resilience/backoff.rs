//! Backoff policies with optional jitter.

use rand::Rng;
use std::time::Duration;

use crate::config::schema::{BackoffStrategy, RetryConfig};

/// Delay schedule between transient failures.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffPolicy {
    /// Same delay after every failure.
    Fixed { delay: Duration },
    /// `base * multiplier^retry`, capped at `max`. `retry` is zero-based.
    Exponential {
        base: Duration,
        multiplier: f64,
        max: Duration,
    },
}

impl BackoffPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self::Fixed { delay }
    }

    pub fn exponential(base: Duration, multiplier: f64, max: Duration) -> Self {
        Self::Exponential { base, multiplier, max }
    }

    /// Delay before the retry that follows failure number `retry + 1`.
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Self::Fixed { delay } => *delay,
            Self::Exponential { base, multiplier, max } => {
                let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
                let scaled_ms = base.as_millis() as f64 * multiplier.powi(exponent);
                if !scaled_ms.is_finite() || scaled_ms >= max.as_millis() as f64 {
                    *max
                } else {
                    Duration::from_millis(scaled_ms.max(0.0).round() as u64)
                }
            }
        }
    }

    /// Upper bound on any delay, jitter included.
    pub fn ceiling(&self) -> Option<Duration> {
        match self {
            Self::Fixed { .. } => None,
            Self::Exponential { max, .. } => Some(*max),
        }
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(2))
    }
}

/// A policy plus a jitter ratio (0.0 disables jitter).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Backoff {
    pub policy: BackoffPolicy,
    pub jitter_ratio: f64,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            jitter_ratio: 0.0,
        }
    }

    pub fn with_jitter(mut self, ratio: f64) -> Self {
        self.jitter_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        let policy = match config.backoff {
            BackoffStrategy::Fixed => BackoffPolicy::fixed(Duration::from_millis(config.base_delay_ms)),
            BackoffStrategy::Exponential => BackoffPolicy::exponential(
                Duration::from_millis(config.base_delay_ms),
                config.multiplier,
                Duration::from_millis(config.max_delay_ms),
            ),
        };
        Self::new(policy).with_jitter(config.jitter_ratio)
    }

    /// Delay for the given zero-based retry, with jitter applied. Never
    /// exceeds the policy's ceiling.
    pub fn delay(&self, retry: u32) -> Duration {
        let delay = self.policy.delay(retry);
        let jitter_range = (delay.as_millis() as f64 * self.jitter_ratio) as u64;
        if jitter_range == 0 {
            return delay;
        }
        let jitter = rand::thread_rng().gen_range(0..=jitter_range);
        let jittered = delay + Duration::from_millis(jitter);
        match self.policy.ceiling() {
            Some(max) => jittered.min(max),
            None => jittered,
        }
    }
}
