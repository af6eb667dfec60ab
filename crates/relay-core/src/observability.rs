use serde::{Deserialize, Serialize};

use crate::domain::errors::ErrorKind;
use crate::domain::result::RunResult;

/// Number of finished runs per terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub completed: usize,
    pub timed_out: usize,
    pub retries_exhausted: usize,
    pub fatal: usize,
    pub cancelled: usize,
}

impl RunCounts {
    pub fn record(&mut self, result: &RunResult) {
        match result.error_kind() {
            None => self.completed += 1,
            Some(ErrorKind::Timeout) => self.timed_out += 1,
            Some(ErrorKind::RetriesExhausted) => self.retries_exhausted += 1,
            Some(ErrorKind::Fatal) => self.fatal += 1,
            Some(ErrorKind::Cancelled) => self.cancelled += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.failed()
    }

    pub fn failed(&self) -> usize {
        self.timed_out + self.retries_exhausted + self.fatal + self.cancelled
    }
}
