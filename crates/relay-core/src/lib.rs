//! relay-core
//!
//! Single-activity workflow executor: decode an event envelope, forward its
//! `data` to the link proxy, and retry under a start-to-close deadline until
//! the run reaches a terminal [`RunResult`](domain::RunResult).
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（envelope, outcome, attempt, retry, decision, result, errors）
//! - **ports**: 抽象化レイヤー（DownstreamInvoker, ResultSink, Clock, IdGenerator）
//! - **app**: 実行ロジック（ActivityRunner, RunContext, WorkflowExecutor）
//! - **impls**: ports の実装（HttpInvoker, ScriptedInvoker, sinks）
//! - **worker**: 複数 run の並行実行
//! - **config**: 環境変数からの設定読み込み
//! - **observability**: 終端状態ごとの集計

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod worker;

pub use app::{ActivityOptions, ActivityRunner, WorkflowExecutor};
pub use config::WorkerConfig;
pub use domain::{ErrorKind, RelayError, RunReport, RunResult};
pub use worker::{Dispatcher, WorkerGroup};
