//! WorkerGroup - 複数の run を並行に実行する
//!
//! `n` 本のワーカーが共有の inbox から payload を取り出し、それぞれ独立に
//! executor で実行して、結果を sink に渡します。run 同士は状態を共有しません。
//!
//! 受け付けた payload は必ず 1 件のレポートになります。shutdown 時に inbox に
//! 残っていたものは実行せず `Cancelled` として報告します。

use std::sync::Arc;

use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::app::WorkflowExecutor;
use crate::domain::errors::RelayError;
use crate::domain::ids::RunId;
use crate::ports::{IdGenerator, ResultSink};

/// Most workers one group will spawn.
pub const MAX_WORKERS: usize = 1024;

/// One payload waiting to be run.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub run_id: RunId,
    pub payload: Vec<u8>,
}

/// Submits payloads to a [`WorkerGroup`].
///
/// Workers stop on their own once every `Dispatcher` clone is dropped and the
/// inbox is drained.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<Dispatch>,
    ids: Arc<dyn IdGenerator>,
}

impl Dispatcher {
    /// Queue a payload; waits while the inbox is full.
    pub async fn submit(&self, payload: Vec<u8>) -> Result<RunId, RelayError> {
        let run_id = self.ids.generate_run_id();
        self.tx
            .send(Dispatch { run_id, payload })
            .await
            .map_err(|_| RelayError::Internal("worker group is shut down".to_string()))?;
        Ok(run_id)
    }
}

/// Worker group handle.
/// - `request_shutdown()` で新しい run の取り出しを止める
/// - `cancel_in_flight()` で実行中の run をキャンセルする
/// - `join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    cancel: CancellationToken,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `n` workers, clamped to `1..=MAX_WORKERS`.
    pub fn spawn(
        n: usize,
        executor: Arc<WorkflowExecutor>,
        sink: Arc<dyn ResultSink>,
    ) -> (Self, Dispatcher) {
        let n = n.clamp(1, MAX_WORKERS);
        let (tx, rx) = mpsc::channel(n.saturating_mul(4));
        let inbox = Arc::new(Mutex::new(rx));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let cancel = CancellationToken::new();

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let inbox = Arc::clone(&inbox);
            let executor = Arc::clone(&executor);
            let sink = Arc::clone(&sink);
            let mut rx = shutdown_rx.clone();
            let cancel = cancel.clone();

            let join = tokio::spawn(async move {
                worker_loop(worker_id, inbox, executor, sink, &mut rx, cancel).await;
            });
            joins.push(join);
        }

        let dispatcher = Dispatcher {
            tx,
            ids: executor.id_generator(),
        };
        (
            Self {
                shutdown_tx,
                cancel,
                joins,
            },
            dispatcher,
        )
    }

    /// Stop taking new payloads. Runs already in progress continue; payloads
    /// still queued are reported as `Cancelled` and later submits fail.
    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    /// Cancel every run currently executing; they finish as `Cancelled`.
    /// Runs started afterwards are cancelled immediately as well.
    pub fn cancel_in_flight(&self) {
        self.cancel.cancel();
    }

    /// Token behind [`cancel_in_flight`](Self::cancel_in_flight), for signal handlers.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Wait for all workers to exit.
    pub async fn join(self) {
        let Self {
            shutdown_tx: _shutdown_tx,
            joins,
            ..
        } = self;
        for j in joins {
            let _ = j.await;
        }
    }

    /// Shutdown and wait for all workers.
    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        self.join().await;
    }
}

async fn worker_loop(
    worker_id: usize,
    inbox: Arc<Mutex<mpsc::Receiver<Dispatch>>>,
    executor: Arc<WorkflowExecutor>,
    sink: Arc<dyn ResultSink>,
    shutdown_rx: &mut watch::Receiver<bool>,
    cancel: CancellationToken,
) {
    loop {
        // shutdown が来ていたら抜ける
        if *shutdown_rx.borrow() {
            break;
        }

        // inbox は「待つ」可能性があるので select で shutdown と競合させる
        let next = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    // group handle が drop された
                    break;
                }
                continue;
            }
            next = async { inbox.lock().await.recv().await } => next,
        };

        let Some(dispatch) = next else {
            debug!(worker_id, "inbox closed");
            break;
        };

        let report = executor
            .execute(dispatch.run_id, &dispatch.payload, cancel.child_token())
            .await;
        sink.report(&report).await;
    }

    drain_inbox(worker_id, &inbox, &executor, sink.as_ref()).await;
    info!(worker_id, "worker stopped");
}

/// Close the inbox and report whatever is still queued as cancelled.
async fn drain_inbox(
    worker_id: usize,
    inbox: &Mutex<mpsc::Receiver<Dispatch>>,
    executor: &WorkflowExecutor,
    sink: &dyn ResultSink,
) {
    let mut rx = inbox.lock().await;
    rx.close();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    while let Ok(dispatch) = rx.try_recv() {
        debug!(worker_id, run_id = %dispatch.run_id, "cancelling queued run");
        let report = executor
            .execute(dispatch.run_id, &dispatch.payload, cancelled.clone())
            .await;
        sink.report(&report).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::app::{ActivityOptions, ActivityRunner};
    use crate::domain::errors::ErrorKind;
    use crate::domain::outcome::InvocationOutcome;
    use crate::domain::result::RunResult;
    use crate::impls::{InMemorySink, ScriptedInvoker, Step};

    fn group(
        n: usize,
        invoker: Arc<ScriptedInvoker>,
    ) -> (WorkerGroup, Dispatcher, Arc<InMemorySink>) {
        let runner = ActivityRunner::new(invoker, "http://localhost:3500");
        let executor = Arc::new(WorkflowExecutor::new(runner, ActivityOptions::default()).unwrap());
        let sink = Arc::new(InMemorySink::new());
        let (group, dispatcher) = WorkerGroup::spawn(n, executor, sink.clone());
        (group, dispatcher, sink)
    }

    #[tokio::test(start_paused = true)]
    async fn every_submitted_payload_is_reported_once() {
        let invoker = Arc::new(ScriptedInvoker::always(InvocationOutcome::from_status(
            200,
            b"ok".to_vec(),
        )));
        let (group, dispatcher, sink) = group(3, invoker.clone());

        let mut ids = Vec::new();
        for i in 0..4 {
            let payload = format!(r#"{{"type":"x","data":{{"i":{i}}}}}"#);
            ids.push(dispatcher.submit(payload.into_bytes()).await.unwrap());
        }
        let bad = dispatcher.submit(b"garbage".to_vec()).await.unwrap();
        drop(dispatcher);
        group.join().await;

        let counts = sink.counts().await;
        assert_eq!(counts.completed, 4);
        assert_eq!(counts.fatal, 1);
        assert_eq!(invoker.calls(), 4);

        for id in ids {
            assert_eq!(
                sink.get(id).await.map(|r| r.result),
                Some(RunResult::completed("ok"))
            );
        }
        let bad_report = sink.get(bad).await.unwrap();
        assert_eq!(bad_report.result.error_kind(), Some(ErrorKind::Fatal));
        assert!(bad_report.event_type.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn runs_execute_concurrently() {
        let invoker = Arc::new(ScriptedInvoker::new(
            Step::outcome(InvocationOutcome::from_status(200, b"ok".to_vec()))
                .after(Duration::from_secs(10)),
        ));
        let (group, dispatcher, sink) = group(4, invoker);

        let start = tokio::time::Instant::now();
        for _ in 0..4 {
            dispatcher
                .submit(br#"{"type":"x","data":{}}"#.to_vec())
                .await
                .unwrap();
        }
        drop(dispatcher);
        group.join().await;

        assert_eq!(sink.counts().await.completed, 4);
        // 4 runs of 10s each on 4 workers
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_in_flight_ends_runs_as_cancelled() {
        let invoker = Arc::new(ScriptedInvoker::new(
            Step::outcome(InvocationOutcome::from_status(200, b"ok".to_vec()))
                .after(Duration::from_secs(20)),
        ));
        let (group, dispatcher, sink) = group(2, invoker);

        for _ in 0..2 {
            dispatcher
                .submit(br#"{"type":"x","data":{}}"#.to_vec())
                .await
                .unwrap();
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        group.cancel_in_flight();
        group.shutdown_and_join().await;

        let counts = sink.counts().await;
        assert_eq!(counts.cancelled, 2);
        assert_eq!(counts.completed, 0);

        assert!(dispatcher.submit(b"{}".to_vec()).await.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reports_queued_payloads_as_cancelled() {
        let invoker = Arc::new(ScriptedInvoker::new(
            Step::outcome(InvocationOutcome::from_status(200, b"ok".to_vec()))
                .after(Duration::from_secs(5)),
        ));
        let (group, dispatcher, sink) = group(1, invoker.clone());

        let mut accepted = Vec::new();
        for _ in 0..3 {
            accepted.push(
                dispatcher
                    .submit(br#"{"type":"x","data":{}}"#.to_vec())
                    .await
                    .unwrap(),
            );
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
        group.shutdown_and_join().await;

        let counts = sink.counts().await;
        assert_eq!(counts.total(), accepted.len());
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.cancelled, 2);
        assert_eq!(invoker.calls(), 1);
        for id in accepted {
            assert!(sink.get(id).await.is_some());
        }

        assert!(dispatcher.submit(b"{}".to_vec()).await.is_err());
    }
}
