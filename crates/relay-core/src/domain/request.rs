use std::collections::BTreeMap;

/// Path on the link proxy that every activity call is posted to.
pub const LINK_PATH: &str = "/link/echo";

pub const CONTENT_TYPE_JSON: &str = "application/json";

/// One outbound call: POST `body` to `target_url` with `headers`.
///
/// Built fresh for every attempt from the envelope's data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationRequest {
    pub target_url: String,
    pub body: Vec<u8>,
    pub headers: BTreeMap<String, String>,
}

impl InvocationRequest {
    /// A JSON POST (`Content-Type: application/json`).
    pub fn json(target_url: impl Into<String>, body: Vec<u8>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), CONTENT_TYPE_JSON.to_string());
        Self {
            target_url: target_url.into(),
            body,
            headers,
        }
    }
}

/// `<base>/link/echo`, tolerating a trailing slash on the base address.
pub fn link_target(base: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), LINK_PATH)
}
