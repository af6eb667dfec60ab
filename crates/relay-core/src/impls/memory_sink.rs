//! InMemorySink - 開発・テスト用の結果置き場
//!
//! 受け取った RunReport をそのまま保持し、終端状態ごとの件数を数えます。

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ids::RunId;
use crate::domain::report::RunReport;
use crate::observability::RunCounts;
use crate::ports::ResultSink;

#[derive(Debug, Default)]
pub struct InMemorySink {
    reports: Mutex<Vec<RunReport>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn reports(&self) -> Vec<RunReport> {
        self.reports.lock().await.clone()
    }

    pub async fn get(&self, run_id: RunId) -> Option<RunReport> {
        self.reports
            .lock()
            .await
            .iter()
            .find(|r| r.run_id == run_id)
            .cloned()
    }

    pub async fn counts(&self) -> RunCounts {
        let mut counts = RunCounts::default();
        for report in self.reports.lock().await.iter() {
            counts.record(&report.result);
        }
        counts
    }
}

#[async_trait]
impl ResultSink for InMemorySink {
    async fn report(&self, report: &RunReport) {
        self.reports.lock().await.push(report.clone());
    }
}
