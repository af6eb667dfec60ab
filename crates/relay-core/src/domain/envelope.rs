//! Envelope - イベントペイロードの封筒
//!
//! 上流から届く payload は CloudEvents 風の JSON object です:
//!
//! ```json
//! {"type": "order.created", "id": "...", "source": "...", "data": {"order_id": "42"}}
//! ```
//!
//! executor は `data` だけを取り出して下流へ転送します。

use serde_json::{Map, Value};

use super::errors::RelayError;

/// Decoded event envelope.
///
/// Immutable once decoded. `data` is an empty object when the payload has no
/// `data` key.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    event_type: String,
    id: Option<String>,
    source: Option<String>,
    data: Value,
}

impl Envelope {
    pub fn new(event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_type: event_type.into(),
            id: None,
            source: None,
            data,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Canonical bytes of `data` for forwarding.
    ///
    /// Compact JSON with object keys sorted at every depth, whatever order
    /// `serde_json::Map` keeps internally.
    pub fn extract_data(&self) -> Vec<u8> {
        sorted_keys(&self.data).to_string().into_bytes()
    }
}

fn sorted_keys(value: &Value) -> Value {
    match value {
        Value::Object(fields) => {
            let mut entries: Vec<_> = fields.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), sorted_keys(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted_keys).collect()),
        other => other.clone(),
    }
}

/// Parse raw bytes into an [`Envelope`].
///
/// Fails with [`RelayError::MalformedPayload`] when the bytes are not JSON,
/// the top level is not an object, or `type`/`id`/`source` are present but
/// not strings. A missing `type` decodes as the empty string.
pub fn decode(raw: &[u8]) -> Result<Envelope, RelayError> {
    let value: Value =
        serde_json::from_slice(raw).map_err(|e| RelayError::MalformedPayload(e.to_string()))?;

    let Value::Object(mut fields) = value else {
        return Err(RelayError::MalformedPayload(
            "top-level value is not an object".to_string(),
        ));
    };

    let event_type = string_field(&mut fields, "type")?.unwrap_or_default();
    let id = string_field(&mut fields, "id")?;
    let source = string_field(&mut fields, "source")?;
    let data = fields
        .remove("data")
        .unwrap_or_else(|| Value::Object(Map::new()));

    Ok(Envelope {
        event_type,
        id,
        source,
        data,
    })
}

fn string_field(fields: &mut Map<String, Value>, key: &str) -> Result<Option<String>, RelayError> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(RelayError::MalformedPayload(format!(
            "`{key}` must be a string, got {other}"
        ))),
    }
}
