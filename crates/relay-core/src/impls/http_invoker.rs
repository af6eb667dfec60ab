//! HttpInvoker - reqwest による下流呼び出し
//!
//! `reqwest::Client` はコネクションプールを内部に持ち、clone しても共有されます。
//! 複数の run から同時に使って問題ありません。

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::{Client, ClientBuilder, Url};
use tracing::debug;

use crate::domain::errors::RelayError;
use crate::domain::outcome::InvocationOutcome;
use crate::domain::request::InvocationRequest;
use crate::ports::DownstreamInvoker;

#[derive(Debug, Clone)]
pub struct HttpInvoker {
    http: Client,
}

impl HttpInvoker {
    /// Client without a request timeout; the executor owns the deadline.
    pub fn new() -> Result<Self, RelayError> {
        let http = Self::client_builder()
            .build()
            .map_err(|e| RelayError::Internal(format!("build http client: {e}")))?;
        Ok(Self { http })
    }

    /// Builder with the settings `new` uses. Redirects are never followed:
    /// one `invoke` is one round trip, and a 3xx is reported as it arrived.
    pub fn client_builder() -> ClientBuilder {
        Client::builder()
            .user_agent(concat!("relay/", env!("CARGO_PKG_VERSION")))
            .redirect(Policy::none())
    }

    /// Use a prepared client. Start from [`client_builder`](Self::client_builder)
    /// so redirects stay disabled.
    pub fn with_client(http: Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl DownstreamInvoker for HttpInvoker {
    async fn invoke(&self, request: InvocationRequest) -> Result<InvocationOutcome, RelayError> {
        let url = Url::parse(&request.target_url)
            .map_err(|e| RelayError::Config(format!("invalid target url '{}': {e}", request.target_url)))?;

        let mut builder = self.http.post(url).body(request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match builder.send().await {
            Ok(response) => response,
            // 組み立て時のエラー（不正なヘッダなど）はネットワーク障害ではない
            Err(e) if e.is_builder() => {
                return Err(RelayError::Internal(format!("build request: {e}")));
            }
            Err(e) => return Ok(InvocationOutcome::transport(e.to_string())),
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => return Ok(InvocationOutcome::transport(format!("read body: {e}"))),
        };
        debug!(status, body = %String::from_utf8_lossy(&body), "link proxy responded");

        Ok(InvocationOutcome::from_status(status, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::OutcomeKind;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn response(status_line: &str, extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {status_line}\r\n{extra_headers}Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if request_complete(&raw) {
                break;
            }
        }
        String::from_utf8_lossy(&raw).into_owned()
    }

    /// Serve a single canned HTTP/1.1 response and hand back the raw request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            socket
                .write_all(response(status_line, "", body).as_bytes())
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
            raw
        });

        (format!("http://{addr}"), handle)
    }

    /// Serve `responses` in order, one per connection, counting connections.
    async fn serve_sequence(responses: Vec<String>) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&hits);
        tokio::spawn(async move {
            for canned in responses {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut socket).await;
                let _ = socket.write_all(canned.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{addr}"), hits)
    }

    /// Ignore HTTP(S)_PROXY from the environment for loopback tests.
    fn local_invoker() -> HttpInvoker {
        HttpInvoker::with_client(HttpInvoker::client_builder().no_proxy().build().unwrap())
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..header_end]
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= header_end + 4 + content_length
    }

    #[tokio::test]
    async fn success_status_returns_body() {
        let (base, server) = serve_once("200 OK", "ok").await;
        let invoker = local_invoker();

        let outcome = invoker
            .invoke(InvocationRequest::json(format!("{base}/link/echo"), br#"{"a":1}"#.to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome, InvocationOutcome::from_status(200, b"ok".to_vec()));

        let raw_request = server.await.unwrap();
        assert!(raw_request.starts_with("POST /link/echo HTTP/1.1"));
        assert!(raw_request.to_ascii_lowercase().contains("content-type: application/json"));
        assert!(raw_request.ends_with(r#"{"a":1}"#));
    }

    #[tokio::test]
    async fn error_status_is_http_failure() {
        let (base, server) = serve_once("500 Internal Server Error", "boom").await;
        let invoker = local_invoker();

        let outcome = invoker
            .invoke(InvocationRequest::json(format!("{base}/link/echo"), b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), OutcomeKind::HttpFailure);
        assert_eq!(outcome.summary(), "500: boom");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn redirect_is_returned_as_is_without_a_second_request() {
        let (base, hits) = serve_sequence(vec![
            response("302 Found", "Location: /elsewhere\r\n", "moved"),
            response("500 Internal Server Error", "", "boom"),
        ])
        .await;
        let invoker = local_invoker();

        let outcome = invoker
            .invoke(InvocationRequest::json(format!("{base}/link/echo"), b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome, InvocationOutcome::from_status(302, b"moved".to_vec()));
        assert_eq!(outcome.kind(), OutcomeKind::Success);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_transport_failure() {
        // bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let invoker = local_invoker();
        let outcome = invoker
            .invoke(InvocationRequest::json(format!("http://{addr}/link/echo"), b"{}".to_vec()))
            .await
            .unwrap();

        assert_eq!(outcome.kind(), OutcomeKind::TransportFailure);
    }

    #[tokio::test]
    async fn invalid_url_is_not_a_transport_failure() {
        let invoker = local_invoker();
        let err = invoker
            .invoke(InvocationRequest::json("not a url", b"{}".to_vec()))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::Config(_)));
    }
}
