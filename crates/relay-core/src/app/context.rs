//! RunContext - run の期限とキャンセルを待機点に届ける
//!
//! run 内で await するのは「下流呼び出し」と「backoff の sleep」の 2 か所だけです。
//! どちらも `RunContext` 経由で待つことで、期限到達かキャンセルの瞬間に
//! future を drop して抜けられます。

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;

/// Stand-in deadline for budgets too large to add to `Instant` (about 30 years).
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Why a guarded wait ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    DeadlineReached,
    Cancelled,
}

/// Deadline plus cancellation token for one run.
#[derive(Debug, Clone)]
pub struct RunContext {
    started_at: Instant,
    deadline: Instant,
    cancel: CancellationToken,
}

impl RunContext {
    /// Start the clock now with a start-to-close budget of `timeout`.
    ///
    /// A budget past what `Instant` can represent is clamped to a far-future
    /// deadline.
    pub fn start(timeout: Duration, cancel: CancellationToken) -> Self {
        let started_at = Instant::now();
        let deadline = started_at
            .checked_add(timeout)
            .or_else(|| started_at.checked_add(FAR_FUTURE))
            .unwrap_or(started_at);
        Self {
            started_at,
            deadline,
            cancel,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Time left before the deadline; zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.deadline
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Drive `fut` until it finishes, the deadline passes or the token fires.
    ///
    /// On interrupt `fut` is dropped, which abandons whatever it was doing.
    /// Cancellation wins over the deadline when both are ready.
    pub async fn guard<F>(&self, fut: F) -> Result<F::Output, Interrupt>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Interrupt::Cancelled),
            _ = sleep_until(self.deadline) => Err(Interrupt::DeadlineReached),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `duration` unless interrupted first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Interrupt> {
        self.guard(tokio::time::sleep(duration)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn guard_returns_output_when_fast_enough() {
        let ctx = RunContext::start(Duration::from_secs(30), CancellationToken::new());
        let out = ctx
            .guard(async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                7
            })
            .await;
        assert_eq!(out, Ok(7));
        assert_eq!(ctx.remaining(), Duration::from_secs(25));
    }

    #[tokio::test(start_paused = true)]
    async fn guard_abandons_work_at_deadline() {
        let ctx = RunContext::start(Duration::from_secs(30), CancellationToken::new());
        let out = ctx.sleep(Duration::from_secs(60)).await;

        assert_eq!(out, Err(Interrupt::DeadlineReached));
        assert_eq!(ctx.elapsed(), Duration::from_secs(30));
        assert!(ctx.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_interrupts_sleep() {
        let token = CancellationToken::new();
        let ctx = RunContext::start(Duration::from_secs(30), token.clone());

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            token.cancel();
        });

        assert_eq!(ctx.sleep(Duration::from_secs(10)).await, Err(Interrupt::Cancelled));
        assert_eq!(ctx.elapsed(), Duration::from_secs(2));
        canceller.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn expired_context_interrupts_immediately() {
        let ctx = RunContext::start(Duration::ZERO, CancellationToken::new());
        assert_eq!(ctx.guard(async { 1 }).await, Err(Interrupt::DeadlineReached));
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_budget_is_clamped_to_a_far_deadline() {
        let ctx = RunContext::start(Duration::MAX, CancellationToken::new());

        assert!(!ctx.is_expired());
        assert!(ctx.remaining() >= Duration::from_secs(86_400 * 365));
        assert_eq!(ctx.guard(async { 1 }).await, Ok(1));
    }
}
