//! WorkflowExecutor - 期限とリトライの下で activity を完了まで走らせる
//!
//! # 状態遷移
//! ```text
//! Running ──success──────────────▶ Completed
//!    │ ──failure, policy stops──▶ RetriesExhausted
//!    │ ──deadline (any point)───▶ TimedOut
//!    │ ──non-network error──────▶ Fatal
//!    └ ──token cancelled────────▶ Cancelled
//! ```
//!
//! 期限の判定は attempt の前と backoff の前に同期的に行います。さらに呼び出しと
//! sleep 自体も `RunContext` で期限に対して競合させるので、期限を過ぎてから
//! 眠り続けたり呼び出しを待ち続けたりすることはありません。
//!
//! # Delivery
//! A call abandoned at the deadline may still have reached the downstream
//! service, and a retried call may repeat one that did. Delivery is
//! at-least-once; downstream handlers must tolerate duplicates.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, error, info, info_span, warn};

use super::context::{Interrupt, RunContext};
use super::runner::ActivityRunner;
use crate::domain::attempt::{AttemptRecord, AttemptState};
use crate::domain::decision::{Decider, Decision, DefaultDecider};
use crate::domain::envelope::{self, Envelope};
use crate::domain::errors::{ErrorKind, RelayError};
use crate::domain::ids::RunId;
use crate::domain::outcome::InvocationOutcome;
use crate::domain::report::RunReport;
use crate::domain::result::RunResult;
use crate::domain::retry::RetryPolicy;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};

pub const DEFAULT_START_TO_CLOSE_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout and retry settings for the activity.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityOptions {
    pub start_to_close_timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            start_to_close_timeout: DEFAULT_START_TO_CLOSE_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ActivityOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }
}

/// Terminal state of the run loop, before mapping to [`RunResult`].
#[derive(Debug)]
enum Terminal {
    Completed(String),
    TimedOut(String),
    RetriesExhausted(String),
    Fatal(String),
    Cancelled,
}

impl Terminal {
    fn into_result(self) -> RunResult {
        match self {
            Terminal::Completed(value) => RunResult::completed(value),
            Terminal::TimedOut(detail) => RunResult::failed(ErrorKind::Timeout, detail),
            Terminal::RetriesExhausted(detail) => {
                RunResult::failed(ErrorKind::RetriesExhausted, detail)
            }
            Terminal::Fatal(detail) => RunResult::failed(ErrorKind::Fatal, detail),
            Terminal::Cancelled => RunResult::failed(ErrorKind::Cancelled, "run cancelled"),
        }
    }
}

/// Runs the activity under the start-to-close deadline and the retry policy.
///
/// Holds no per-run state, so one executor can serve many concurrent runs.
pub struct WorkflowExecutor {
    runner: ActivityRunner,
    decider: Arc<dyn Decider>,
    start_to_close_timeout: Duration,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl WorkflowExecutor {
    pub fn new(runner: ActivityRunner, options: ActivityOptions) -> Result<Self, RelayError> {
        let policy = options.retry_policy.validated()?;
        Ok(Self {
            runner,
            decider: Arc::new(DefaultDecider::new(policy)),
            start_to_close_timeout: options.start_to_close_timeout,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UlidGenerator::new(SystemClock)),
        })
    }

    /// Replace the retry decider.
    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    /// Clock used for report timestamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn start_to_close_timeout(&self) -> Duration {
        self.start_to_close_timeout
    }

    pub fn id_generator(&self) -> Arc<dyn IdGenerator> {
        Arc::clone(&self.ids)
    }

    /// Run one payload to its terminal result.
    pub async fn run(&self, raw: &[u8]) -> RunResult {
        let run_id = self.ids.generate_run_id();
        self.execute(run_id, raw, CancellationToken::new())
            .await
            .result
    }

    /// Run one payload and return the full report.
    ///
    /// Cancelling `cancel` ends the run as `Cancelled` at its next
    /// suspension point.
    pub async fn execute(&self, run_id: RunId, raw: &[u8], cancel: CancellationToken) -> RunReport {
        let span = info_span!("run", %run_id);
        self.execute_inner(run_id, raw, cancel).instrument(span).await
    }

    async fn execute_inner(&self, run_id: RunId, raw: &[u8], cancel: CancellationToken) -> RunReport {
        let started_at = self.clock.now();
        let ctx = RunContext::start(self.start_to_close_timeout, cancel);
        let mut attempts = Vec::new();

        let (event_type, terminal) = match envelope::decode(raw) {
            Ok(envelope) => {
                info!(
                    event_type = envelope.event_type(),
                    event_id = envelope.id().unwrap_or(""),
                    "run started"
                );
                let terminal = self.drive(&envelope, &ctx, &mut attempts).await;
                (Some(envelope.event_type().to_string()), terminal)
            }
            Err(err) => {
                warn!(error = %err, "rejecting payload");
                (None, Terminal::Fatal(err.to_string()))
            }
        };

        let result = terminal.into_result();
        match &result {
            RunResult::Completed { .. } => {
                info!(attempts = attempts.len(), "run completed");
            }
            RunResult::Failed { reason, detail } => {
                warn!(%reason, %detail, attempts = attempts.len(), "run failed");
            }
        }

        RunReport {
            run_id,
            event_type,
            result,
            attempts,
            started_at,
            finished_at: self.clock.now(),
        }
    }

    /// The attempt loop.
    async fn drive(
        &self,
        envelope: &Envelope,
        ctx: &RunContext,
        attempts: &mut Vec<AttemptRecord>,
    ) -> Terminal {
        let mut state = AttemptState::new();

        loop {
            if ctx.is_cancelled() {
                return Terminal::Cancelled;
            }
            if ctx.is_expired() {
                return self.timed_out(&state, state.attempt_number - 1);
            }

            let call_started = Instant::now();
            let outcome = match ctx.guard(self.runner.run_once(envelope)).await {
                Ok(Ok(outcome)) => outcome,
                Ok(Err(err)) => {
                    error!(attempt = state.attempt_number, error = %err, "activity failed with a non-retryable error");
                    return Terminal::Fatal(err.to_string());
                }
                Err(Interrupt::Cancelled) => return Terminal::Cancelled,
                Err(Interrupt::DeadlineReached) => {
                    // 呼び出しは放棄済み。下流に届いたかどうかは分からない
                    warn!(
                        attempt = state.attempt_number,
                        "deadline reached during downstream call, call abandoned"
                    );
                    return self.timed_out(&state, state.attempt_number);
                }
            };

            attempts.push(AttemptRecord::new(
                self.ids.generate_attempt_id(),
                state.attempt_number,
                &outcome,
                call_started.elapsed(),
            ));

            if let InvocationOutcome::Success { body, .. } = &outcome {
                let value = String::from_utf8_lossy(body).into_owned();
                info!(attempt = state.attempt_number, external_response = %value, "WORKFLOW_COMPLETE");
                return Terminal::Completed(value);
            }

            warn!(
                attempt = state.attempt_number,
                outcome = %outcome.summary(),
                "attempt failed"
            );
            state.record(outcome, ctx.elapsed());

            match self.decider.decide(&state) {
                Decision::Stop { reason } => {
                    info!(%reason, "not retrying");
                    return Terminal::RetriesExhausted(last_summary(&state));
                }
                Decision::Retry { delay, reason } => {
                    if delay >= ctx.remaining() {
                        info!(?delay, remaining = ?ctx.remaining(), "backoff would cross the deadline");
                        return self.timed_out(&state, state.attempt_number);
                    }
                    info!(%reason, "backing off");
                    match ctx.sleep(delay).await {
                        Ok(()) => {}
                        Err(Interrupt::Cancelled) => return Terminal::Cancelled,
                        Err(Interrupt::DeadlineReached) => {
                            return self.timed_out(&state, state.attempt_number);
                        }
                    }
                    state.advance();
                }
            }
        }
    }

    fn timed_out(&self, state: &AttemptState, attempts_started: u32) -> Terminal {
        let mut detail = format!(
            "start-to-close timeout of {:?} exceeded after {} attempt(s)",
            self.start_to_close_timeout, attempts_started
        );
        if state.last_outcome.is_some() {
            detail.push_str("; last failure: ");
            detail.push_str(&last_summary(state));
        }
        Terminal::TimedOut(detail)
    }
}

fn last_summary(state: &AttemptState) -> String {
    state
        .last_outcome
        .as_ref()
        .map(InvocationOutcome::summary)
        .unwrap_or_default()
}
