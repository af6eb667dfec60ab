//! RunReport - run 1 件分の実行記録
//!
//! 最終結果 (`RunResult`) に加えて、各 attempt の記録と開始・終了時刻を持ちます。
//! sink に渡され、ログ出力や集計に使われます。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::attempt::AttemptRecord;
use super::ids::RunId;
use super::result::RunResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: RunId,

    /// Envelope `type`; `None` when the payload could not be decoded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    pub result: RunResult,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<AttemptRecord>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Number of downstream calls that completed (abandoned calls not counted).
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }
}
