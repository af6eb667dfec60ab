use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use clap::Parser;
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use relay_core::impls::{HttpInvoker, InMemorySink, TracingSink};
use relay_core::ports::ResultSink;
use relay_core::worker::MAX_WORKERS;
use relay_core::{
    ActivityRunner, Dispatcher, RunReport, WorkerConfig, WorkerGroup, WorkflowExecutor,
};

/// Run event payloads through the link proxy under the start-to-close
/// timeout and retry policy. Prints one JSON run report per line.
#[derive(Debug, Parser)]
#[command(name = "relay", version)]
struct Args {
    /// Payload files, one event per file. Reads a single payload from stdin when none are given.
    payloads: Vec<PathBuf>,

    /// Concurrent runs (overrides WORKER_CONCURRENCY).
    #[arg(long)]
    concurrency: Option<usize>,

    /// Log each report instead of printing it as JSON.
    #[arg(long)]
    quiet: bool,
}

/// sink：レポートを stdout に 1 行ずつ出しつつ、集計用に保持する
struct StdoutSink {
    quiet: bool,
    inner: InMemorySink,
}

#[async_trait]
impl ResultSink for StdoutSink {
    async fn report(&self, report: &RunReport) {
        if self.quiet {
            TracingSink.report(report).await;
        } else {
            match serde_json::to_string(report) {
                Ok(line) => println!("{line}"),
                Err(e) => warn!(run_id = %report.run_id, error = %e, "failed to encode run report"),
            }
        }
        self.inner.report(report).await;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    // (A) 設定を読む
    let mut config = WorkerConfig::from_env().context("load configuration")?;
    if let Some(n) = args.concurrency {
        config.concurrency = n.clamp(1, MAX_WORKERS);
    }
    info!(
        temporal_host = %config.temporal_host,
        namespace = %config.namespace,
        task_queue = %config.task_queue,
        link_addr = %config.link_addr,
        "worker configured"
    );

    // (B) executor を組み立てる
    let invoker = Arc::new(HttpInvoker::new().context("build http invoker")?);
    let runner = ActivityRunner::new(invoker, &config.link_addr);
    let options = config.activity_options().context("build activity options")?;
    let executor = Arc::new(WorkflowExecutor::new(runner, options).context("build executor")?);

    // (C) worker を起動
    let sink = Arc::new(StdoutSink {
        quiet: args.quiet,
        inner: InMemorySink::new(),
    });
    let (group, dispatcher) = WorkerGroup::spawn(config.concurrency, executor, sink.clone());

    let cancel = group.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, cancelling runs");
            cancel.cancel();
        }
    });

    // (D) payload を投入。失敗しても受け付け済みの run は最後まで待つ
    let submitted = submit_payloads(&args.payloads, &dispatcher).await;

    // (E) 全 run の完了を待つ
    drop(dispatcher);
    group.join().await;
    submitted?;

    let counts = sink.inner.counts().await;
    info!(
        completed = counts.completed,
        failed = counts.failed(),
        "all runs finished"
    );
    if counts.failed() > 0 {
        bail!("{} of {} runs failed", counts.failed(), counts.total());
    }
    Ok(())
}

async fn submit_payloads(paths: &[PathBuf], dispatcher: &Dispatcher) -> Result<()> {
    if paths.is_empty() {
        let mut raw = Vec::new();
        tokio::io::stdin()
            .read_to_end(&mut raw)
            .await
            .context("read payload from stdin")?;
        dispatcher.submit(raw).await?;
        return Ok(());
    }

    for path in paths {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("read payload {}", path.display()))?;
        let run_id = dispatcher.submit(raw).await?;
        info!(%run_id, path = %path.display(), "payload submitted");
    }
    Ok(())
}

fn init_tracing() {
    // stdout はレポート用なので、ログは stderr へ
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
