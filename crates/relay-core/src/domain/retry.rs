//! Retry policy: decides whether to try again and how long to wait.

use std::time::Duration;

use super::attempt::AttemptState;
use super::errors::RelayError;

pub const DEFAULT_MAXIMUM_ATTEMPTS: u32 = 3;

/// Retry policy for the activity.
///
/// Backoff is exponential with a ceiling:
/// `delay(n) = min(initial_interval * backoff_coefficient^(n - 1), maximum_interval)`
///
/// Example with the defaults (1s, 2.0, 100s):
/// - after attempt 1: 1s
/// - after attempt 2: 2s
/// - after attempt 3: 4s
/// - ...
/// - after attempt 8 and later: 100s
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. Always >= 1.
    pub maximum_attempts: u32,

    /// Delay after the first failed attempt.
    pub initial_interval: Duration,

    /// Multiplier per attempt. Always >= 1.0 so the curve never decreases.
    pub backoff_coefficient: f64,

    /// Upper bound for any single delay.
    pub maximum_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            maximum_attempts: DEFAULT_MAXIMUM_ATTEMPTS,
            initial_interval: Duration::from_secs(1),
            backoff_coefficient: 2.0,
            maximum_interval: Duration::from_secs(100),
        }
    }
}

impl RetryPolicy {
    pub fn new(maximum_attempts: u32) -> Result<Self, RelayError> {
        Self {
            maximum_attempts,
            ..Self::default()
        }
        .validated()
    }

    /// Single attempt, never retry.
    pub fn no_retry() -> Self {
        Self {
            maximum_attempts: 1,
            ..Self::default()
        }
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_backoff_coefficient(mut self, coefficient: f64) -> Self {
        self.backoff_coefficient = coefficient;
        self
    }

    pub fn with_maximum_interval(mut self, interval: Duration) -> Self {
        self.maximum_interval = interval;
        self
    }

    pub fn with_maximum_attempts(mut self, attempts: u32) -> Self {
        self.maximum_attempts = attempts;
        self
    }

    /// Check the invariants the executor relies on.
    pub fn validated(self) -> Result<Self, RelayError> {
        if self.maximum_attempts == 0 {
            return Err(RelayError::InvalidPolicy(
                "maximum_attempts must be at least 1".to_string(),
            ));
        }
        if !self.backoff_coefficient.is_finite() || self.backoff_coefficient < 1.0 {
            return Err(RelayError::InvalidPolicy(format!(
                "backoff_coefficient must be a finite number >= 1.0, got {}",
                self.backoff_coefficient
            )));
        }
        if self.initial_interval > self.maximum_interval {
            return Err(RelayError::InvalidPolicy(format!(
                "initial_interval {:?} exceeds maximum_interval {:?}",
                self.initial_interval, self.maximum_interval
            )));
        }
        Ok(self)
    }

    /// Retry iff attempts remain and the last outcome was a failure.
    pub fn should_retry(&self, state: &AttemptState) -> bool {
        let failed = state
            .last_outcome
            .as_ref()
            .is_some_and(|outcome| outcome.is_retryable());
        failed && state.attempt_number < self.maximum_attempts
    }

    /// Delay to wait after attempt `attempt_number` (1-indexed) failed.
    pub fn backoff_for(&self, attempt_number: u32) -> Duration {
        let exponent = attempt_number.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.initial_interval.as_secs_f64() * self.backoff_coefficient.powi(exponent);

        // from_secs_f64 panics on overflow, so clamp in f64 first.
        if !secs.is_finite() || secs >= self.maximum_interval.as_secs_f64() {
            self.maximum_interval
        } else {
            Duration::from_secs_f64(secs.max(0.0))
        }
    }
}
