//! Impls - ports の実装
//!
//! - **HttpInvoker**: reqwest による本番用の下流呼び出し
//! - **ScriptedInvoker**: ネットワークなしの開発・テスト用
//! - **TracingSink** / **InMemorySink**: 結果の報告先

pub mod http_invoker;
pub mod memory_sink;
pub mod scripted;
pub mod tracing_sink;

pub use self::http_invoker::HttpInvoker;
pub use self::memory_sink::InMemorySink;
pub use self::scripted::{ScriptedInvoker, Step};
pub use self::tracing_sink::TracingSink;
