//! Outcome model: the classified result of one downstream call.
//!
//! A failed HTTP status is data here, not an error. The executor makes its
//! retry and timeout decisions by matching on [`InvocationOutcome`].

use serde::{Deserialize, Serialize};

/// Coarse classification of an outcome, used in attempt records and logs.
///
/// Serialized as SCREAMING_SNAKE_CASE: SUCCESS / HTTP_FAILURE / TRANSPORT_FAILURE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    HttpFailure,
    TransportFailure,
}

/// Result of exactly one round trip to the downstream service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvocationOutcome {
    /// Response status < 400.
    Success { status: u16, body: Vec<u8> },

    /// Response status >= 400. Retryable.
    HttpFailure { status: u16, body: Vec<u8> },

    /// Connection refused, DNS failure, I/O error while sending or reading.
    /// Retryable.
    TransportFailure { cause: String },
}

impl InvocationOutcome {
    /// Classify a completed HTTP exchange by its status code.
    pub fn from_status(status: u16, body: Vec<u8>) -> Self {
        if status < 400 {
            InvocationOutcome::Success { status, body }
        } else {
            InvocationOutcome::HttpFailure { status, body }
        }
    }

    pub fn transport(cause: impl Into<String>) -> Self {
        InvocationOutcome::TransportFailure {
            cause: cause.into(),
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            InvocationOutcome::Success { .. } => OutcomeKind::Success,
            InvocationOutcome::HttpFailure { .. } => OutcomeKind::HttpFailure,
            InvocationOutcome::TransportFailure { .. } => OutcomeKind::TransportFailure,
        }
    }

    /// Both failure classes are retried alike.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, InvocationOutcome::Success { .. })
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            InvocationOutcome::Success { status, .. }
            | InvocationOutcome::HttpFailure { status, .. } => Some(*status),
            InvocationOutcome::TransportFailure { .. } => None,
        }
    }

    /// One-line description used as failure detail.
    ///
    /// - `HttpFailure` -> `"<status>: <body>"`
    /// - `TransportFailure` -> `"transport: <cause>"`
    /// - `Success` -> `"<status>"`
    pub fn summary(&self) -> String {
        match self {
            InvocationOutcome::Success { status, .. } => status.to_string(),
            InvocationOutcome::HttpFailure { status, body } => {
                format!("{status}: {}", String::from_utf8_lossy(body))
            }
            InvocationOutcome::TransportFailure { cause } => format!("transport: {cause}"),
        }
    }
}
