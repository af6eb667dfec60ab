//! ActivityRunner - activity を 1 回だけ実行する
//!
//! envelope の data を取り出して link proxy へ POST し、結果をそのまま返します。
//! リトライはしません（回数の管理は executor に集約）。

use std::sync::Arc;

use tracing::debug;

use crate::domain::envelope::Envelope;
use crate::domain::errors::RelayError;
use crate::domain::outcome::InvocationOutcome;
use crate::domain::request::{InvocationRequest, link_target};
use crate::ports::DownstreamInvoker;

#[derive(Clone)]
pub struct ActivityRunner {
    invoker: Arc<dyn DownstreamInvoker>,
    target_url: String,
}

impl ActivityRunner {
    /// Runner posting to `<link_addr>/link/echo`.
    pub fn new(invoker: Arc<dyn DownstreamInvoker>, link_addr: &str) -> Self {
        Self {
            invoker,
            target_url: link_target(link_addr),
        }
    }

    pub fn target_url(&self) -> &str {
        &self.target_url
    }

    pub fn build_request(&self, envelope: &Envelope) -> InvocationRequest {
        InvocationRequest::json(self.target_url.clone(), envelope.extract_data())
    }

    /// One call to the downstream service; the outcome is passed through unchanged.
    pub async fn run_once(&self, envelope: &Envelope) -> Result<InvocationOutcome, RelayError> {
        let request = self.build_request(envelope);
        debug!(
            target_url = %request.target_url,
            data = %String::from_utf8_lossy(&request.body),
            "calling link proxy"
        );
        self.invoker.invoke(request).await
    }
}
