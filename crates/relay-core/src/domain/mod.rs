//! Domain model (envelope, request/outcome, attempts, retry policy, results).
//!
//! ここにあるのは純粋なデータと判定ロジックだけです。I/O や時間待ちは
//! app 層が担当します。

pub mod attempt;
pub mod decision;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod report;
pub mod request;
pub mod result;
pub mod retry;

pub use attempt::{AttemptRecord, AttemptState};
pub use decision::{Decider, Decision, DefaultDecider};
pub use envelope::{Envelope, decode};
pub use errors::{ErrorKind, RelayError};
pub use ids::{AttemptId, RunId};
pub use outcome::{InvocationOutcome, OutcomeKind};
pub use report::RunReport;
pub use request::{InvocationRequest, LINK_PATH, link_target};
pub use result::RunResult;
pub use retry::RetryPolicy;
