//! DownstreamInvoker port - 下流サービス呼び出しの抽象化
//!
//! 本番は reqwest 実装 (`impls::http_invoker`)、テストは台本どおりに
//! 結果を返す実装 (`impls::scripted`) を使います。

use async_trait::async_trait;

use crate::domain::errors::RelayError;
use crate::domain::outcome::InvocationOutcome;
use crate::domain::request::InvocationRequest;

/// Performs exactly one network round trip per call.
///
/// - status < 400 -> `Ok(Success)`
/// - status >= 400 -> `Ok(HttpFailure)`
/// - connection / DNS / I/O errors -> `Ok(TransportFailure)`
/// - anything that is not a network error (bad URL, bad header) -> `Err`
///
/// Implementations have no timeout of their own. The caller may drop the
/// returned future at any point once the run deadline is reached, so they
/// must not hold state that breaks when abandoned mid-call.
#[async_trait]
pub trait DownstreamInvoker: Send + Sync {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationOutcome, RelayError>;
}
