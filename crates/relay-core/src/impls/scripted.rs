//! ScriptedInvoker - 開発・テスト用の下流呼び出し
//!
//! ネットワークを使わず、登録した順に結果を返します。台本を使い切った後は
//! fallback の結果を返し続けます。`route` で登録した body の呼び出しには、
//! 台本より優先して毎回同じ結果を返します。各呼び出しに擬似的な遅延も設定できます
//! （tokio の paused clock と組み合わせると 30 秒の期限も一瞬で検証できる）。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::errors::RelayError;
use crate::domain::outcome::InvocationOutcome;
use crate::domain::request::InvocationRequest;
use crate::ports::DownstreamInvoker;

/// What one scripted call does.
#[derive(Debug, Clone)]
pub struct Step {
    result: Result<InvocationOutcome, String>,
    latency: Duration,
}

impl Step {
    pub fn outcome(outcome: InvocationOutcome) -> Self {
        Self {
            result: Ok(outcome),
            latency: Duration::ZERO,
        }
    }

    /// A non-network error (ends up as `Fatal`).
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
            latency: Duration::ZERO,
        }
    }

    pub fn after(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

pub struct ScriptedInvoker {
    routes: Vec<(Vec<u8>, Step)>,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicU32,
    requests: Mutex<Vec<InvocationRequest>>,
}

impl ScriptedInvoker {
    /// Returns `fallback` for every call not covered by [`then`](Self::then).
    pub fn new(fallback: Step) -> Self {
        Self {
            routes: Vec::new(),
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicU32::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn always(outcome: InvocationOutcome) -> Self {
        Self::new(Step::outcome(outcome))
    }

    pub fn failing_with(message: impl Into<String>) -> Self {
        Self::new(Step::error(message))
    }

    /// Queue a step ahead of the fallback.
    pub fn then(self, step: Step) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
        self
    }

    /// Answer every call whose body equals `body` with `step`.
    pub fn route(mut self, body: impl Into<Vec<u8>>, step: Step) -> Self {
        self.routes.push((body.into(), step));
        self
    }

    /// Number of calls started (including ones abandoned mid-latency).
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<InvocationRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl DownstreamInvoker for ScriptedInvoker {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationOutcome, RelayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let routed = self
            .routes
            .iter()
            .find(|(body, _)| *body == request.body)
            .map(|(_, step)| step.clone());
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request);

        // ロックは await の前に手放す
        let step = match routed {
            Some(step) => step,
            None => self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .unwrap_or_else(|| self.fallback.clone()),
        };

        if !step.latency.is_zero() {
            tokio::time::sleep(step.latency).await;
        }
        step.result.map_err(RelayError::Internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn script_then_fallback() {
        let invoker = ScriptedInvoker::always(InvocationOutcome::from_status(200, b"ok".to_vec()))
            .then(Step::outcome(InvocationOutcome::transport("refused")));

        let req = InvocationRequest::json("http://localhost:3500/link/echo", b"{}".to_vec());
        let first = invoker.invoke(req.clone()).await.unwrap();
        let second = invoker.invoke(req).await.unwrap();

        assert_eq!(first, InvocationOutcome::transport("refused"));
        assert_eq!(second, InvocationOutcome::from_status(200, b"ok".to_vec()));
        assert_eq!(invoker.calls(), 2);
        assert_eq!(invoker.requests().len(), 2);
    }

    #[tokio::test]
    async fn routes_take_precedence_over_the_script() {
        let invoker = ScriptedInvoker::always(InvocationOutcome::from_status(200, b"ok".to_vec()))
            .then(Step::outcome(InvocationOutcome::transport("refused")))
            .route(
                b"{\"k\":1}".to_vec(),
                Step::outcome(InvocationOutcome::from_status(500, b"boom".to_vec())),
            );

        let routed = InvocationRequest::json("http://localhost:3500/link/echo", b"{\"k\":1}".to_vec());
        let other = InvocationRequest::json("http://localhost:3500/link/echo", b"{}".to_vec());

        assert_eq!(
            invoker.invoke(routed.clone()).await.unwrap(),
            InvocationOutcome::from_status(500, b"boom".to_vec())
        );
        assert_eq!(
            invoker.invoke(other).await.unwrap(),
            InvocationOutcome::transport("refused")
        );
        assert_eq!(
            invoker.invoke(routed).await.unwrap(),
            InvocationOutcome::from_status(500, b"boom".to_vec())
        );
    }
}
