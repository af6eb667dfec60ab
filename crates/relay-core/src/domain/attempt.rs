//! Attempt state and per-attempt history.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ids::AttemptId;
use super::outcome::{InvocationOutcome, OutcomeKind};

/// Mutable progress of one run.
///
/// Owned by the executor for the lifetime of a single run and never shared.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptState {
    /// 1-indexed number of the attempt in flight (or just finished).
    pub attempt_number: u32,

    /// Wall-clock time since the run started.
    pub elapsed: Duration,

    pub last_outcome: Option<InvocationOutcome>,
}

impl AttemptState {
    pub fn new() -> Self {
        Self {
            attempt_number: 1,
            elapsed: Duration::ZERO,
            last_outcome: None,
        }
    }

    /// Store the outcome of the current attempt.
    pub fn record(&mut self, outcome: InvocationOutcome, elapsed: Duration) {
        self.last_outcome = Some(outcome);
        self.elapsed = elapsed;
    }

    /// Move on to the next attempt.
    pub fn advance(&mut self) {
        self.attempt_number += 1;
    }
}

impl Default for AttemptState {
    fn default() -> Self {
        Self::new()
    }
}

/// What happened on one attempt, kept for the run report.
///
/// Records:
/// - which attempt it was
/// - how it was classified (and the status, when there was a response)
/// - how long the call took
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt_id: AttemptId,
    pub attempt_number: u32,
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    pub summary: String,
    pub duration_ms: u64,
}

impl AttemptRecord {
    pub fn new(
        attempt_id: AttemptId,
        attempt_number: u32,
        outcome: &InvocationOutcome,
        duration: Duration,
    ) -> Self {
        Self {
            attempt_id,
            attempt_number,
            kind: outcome.kind(),
            status: outcome.status(),
            summary: outcome.summary(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}
