//! ResultSink port - run 結果の報告先
//!
//! 実装:
//! - `TracingSink`: tracing にログを出す
//! - `InMemorySink`: 保持して集計する（テスト・CLI 用）

use async_trait::async_trait;

use crate::domain::report::RunReport;

/// Receives every finished run exactly once.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn report(&self, report: &RunReport);
}
