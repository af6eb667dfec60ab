//! App - アプリケーション層
//!
//! domain と ports を組み合わせて 1 件の run を実行します。
//!
//! # 主要コンポーネント
//! - **ActivityRunner**: 下流呼び出しを 1 回だけ行う
//! - **RunContext**: 期限とキャンセルを待機点に届ける
//! - **WorkflowExecutor**: 期限 + リトライの状態遷移を回して RunResult を出す

pub mod context;
pub mod executor;
pub mod runner;

pub use self::context::{Interrupt, RunContext};
pub use self::executor::{ActivityOptions, DEFAULT_START_TO_CLOSE_TIMEOUT, WorkflowExecutor};
pub use self::runner::ActivityRunner;
