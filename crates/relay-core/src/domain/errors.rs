//! Errors - エラー型と分類
//!
//! 実行結果の分類 (`ErrorKind`) と、コア内部で `?` で伝播するエラー
//! (`RelayError`) を定義します。
//!
//! HTTP の失敗やネットワーク障害はここには現れません。それらは
//! `InvocationOutcome` の variant として扱い、リトライ判定の材料にします。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ErrorKind は失敗した run の終端分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// start-to-close の期限切れ
    Timeout,
    /// 最大試行回数に到達（最後の失敗内容を detail に持つ）
    RetriesExhausted,
    /// 分類できない内部エラー。リトライしない
    Fatal,
    /// dispatcher 側からのキャンセル
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RetriesExhausted => "retries exhausted",
            ErrorKind::Fatal => "fatal",
            ErrorKind::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// RelayError はリトライ対象にならないエラー
///
/// executor に届いた時点で `ErrorKind::Fatal` に写像されます。
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid retry policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}
