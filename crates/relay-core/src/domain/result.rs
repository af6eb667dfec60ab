use serde::{Deserialize, Serialize};

use super::errors::ErrorKind;

/// Terminal result of a run. Produced exactly once per run.
///
/// Serialized with a `status` tag:
/// `{"status":"completed","value":"ok"}` /
/// `{"status":"failed","reason":"RETRIES_EXHAUSTED","detail":"500: boom"}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    Completed { value: String },
    Failed { reason: ErrorKind, detail: String },
}

impl RunResult {
    pub fn completed(value: impl Into<String>) -> Self {
        RunResult::Completed {
            value: value.into(),
        }
    }

    pub fn failed(reason: ErrorKind, detail: impl Into<String>) -> Self {
        RunResult::Failed {
            reason,
            detail: detail.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, RunResult::Completed { .. })
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            RunResult::Completed { .. } => None,
            RunResult::Failed { reason, .. } => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_result_is_tagged() {
        let v = serde_json::to_value(RunResult::completed("ok")).unwrap();
        assert_eq!(v, serde_json::json!({"status": "completed", "value": "ok"}));

        let v = serde_json::to_value(RunResult::failed(ErrorKind::Fatal, "malformed payload")).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"status": "failed", "reason": "FATAL", "detail": "malformed payload"})
        );
    }

    #[test]
    fn error_kind_accessor() {
        assert_eq!(RunResult::completed("ok").error_kind(), None);
        assert_eq!(
            RunResult::failed(ErrorKind::Timeout, "late").error_kind(),
            Some(ErrorKind::Timeout)
        );
    }
}
