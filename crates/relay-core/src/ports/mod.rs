//! Ports - 抽象化レイヤー
//!
//! 外部とつながる部分（下流 HTTP、結果の報告先、時刻、ID 採番）を trait に
//! しておき、コアはネットワークなしでテストできるようにしています。

pub mod clock;
pub mod id_generator;
pub mod invoker;
pub mod sink;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::invoker::DownstreamInvoker;
pub use self::sink::ResultSink;
