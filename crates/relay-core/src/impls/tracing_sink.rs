use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::report::RunReport;
use crate::domain::result::RunResult;
use crate::ports::ResultSink;

/// Logs each finished run as a single event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

#[async_trait]
impl ResultSink for TracingSink {
    async fn report(&self, report: &RunReport) {
        let attempts = report.attempt_count();
        match &report.result {
            RunResult::Completed { value } => {
                info!(run_id = %report.run_id, attempts, external_response = %value, "run reported");
            }
            RunResult::Failed { reason, detail } => {
                warn!(run_id = %report.run_id, attempts, %reason, %detail, "run reported");
            }
        }
    }
}
