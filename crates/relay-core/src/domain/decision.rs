//! Decision model: what to do after a failed attempt.
//!
//! The Decider is a pure function of the attempt state. Waiting, deadline
//! capping and counting are the executor's job.

use std::time::Duration;

use super::attempt::AttemptState;
use super::retry::RetryPolicy;

/// The next action after an attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Try again after `delay`.
    Retry { delay: Duration, reason: String },

    /// Give up; the run ends as retries-exhausted.
    Stop { reason: String },
}

/// Trait for deciding the next action from the current attempt state.
///
/// Deciders have no side effects.
pub trait Decider: Send + Sync {
    fn decide(&self, state: &AttemptState) -> Decision;
}

/// Attempt-count based decider over a [`RetryPolicy`].
#[derive(Debug, Clone)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }
}

impl Decider for DefaultDecider {
    fn decide(&self, state: &AttemptState) -> Decision {
        if self.retry_policy.should_retry(state) {
            let delay = self.retry_policy.backoff_for(state.attempt_number);
            Decision::Retry {
                delay,
                reason: format!(
                    "retry attempt {}/{} after {:?}",
                    state.attempt_number + 1,
                    self.retry_policy.maximum_attempts,
                    delay
                ),
            }
        } else {
            Decision::Stop {
                reason: format!(
                    "max attempts reached: {}/{}",
                    state.attempt_number, self.retry_policy.maximum_attempts
                ),
            }
        }
    }
}
