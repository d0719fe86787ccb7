//! JSON-RPC envelopes exchanged between the child and WebSocket clients
//!
//! The gateway does not validate envelopes against the JSON-RPC schema. The
//! only field it looks at is `id`, and only to correlate log lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Why a text record could not be turned into an [`Envelope`]
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("empty message")]
    Empty,

    #[error("malformed JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("expected a JSON object or batch array, got {0}")]
    NotAMessage(&'static str),
}

/// One JSON-RPC message, kept as an opaque JSON value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(Value);

impl Envelope {
    /// Parse one framed line or WebSocket frame
    ///
    /// Only a JSON object (a message) or array (a batch) is accepted. Valid
    /// JSON scalars such as `42`, `"text"` or `null` are rejected with
    /// [`EnvelopeError::NotAMessage`] and dropped by the caller instead of
    /// being forwarded.
    pub fn parse(text: &str) -> Result<Self, EnvelopeError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EnvelopeError::Empty);
        }

        let value: Value = serde_json::from_str(trimmed)?;
        match value {
            Value::Object(_) | Value::Array(_) => Ok(Self(value)),
            Value::Null => Err(EnvelopeError::NotAMessage("null")),
            Value::Bool(_) => Err(EnvelopeError::NotAMessage("boolean")),
            Value::Number(_) => Err(EnvelopeError::NotAMessage("number")),
            Value::String(_) => Err(EnvelopeError::NotAMessage("string")),
        }
    }

    /// The `id` member, if this is a single message that carries one
    pub fn id(&self) -> Option<&Value> {
        self.0.get("id").filter(|id| !id.is_null())
    }

    /// Log-friendly rendering of the id
    pub fn id_label(&self) -> String {
        match self.id() {
            Some(Value::String(id)) => id.clone(),
            Some(id) => id.to_string(),
            None => "-".to_string(),
        }
    }

    /// Compact single-line serialization, without the trailing newline
    pub fn to_line(&self) -> String {
        self.0.to_string()
    }
}

impl From<Value> for Envelope {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_request_and_exposes_id() {
        let env = Envelope::parse(r#"{"jsonrpc":"2.0","id":7,"method":"ping"}"#).unwrap();
        assert_eq!(env.id(), Some(&json!(7)));
        assert_eq!(env.id_label(), "7");
    }

    #[test]
    fn notification_has_no_id() {
        let env = Envelope::parse(r#"{"jsonrpc":"2.0","method":"initialized"}"#).unwrap();
        assert!(env.id().is_none());
        assert_eq!(env.id_label(), "-");
    }

    #[test]
    fn string_ids_are_labelled_verbatim() {
        let env = Envelope::parse(r#"{"jsonrpc":"2.0","id":"abc","result":{}}"#).unwrap();
        assert_eq!(env.id_label(), "abc");
    }

    #[test]
    fn serialized_line_is_semantically_identical() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"result":{"content":[{"type":"text","text":"hi\nthere"}]}}"#;
        let env = Envelope::parse(raw).unwrap();
        let line = env.to_line();
        assert!(!line.contains('\n'));

        let original: Value = serde_json::from_str(raw).unwrap();
        let reparsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn accepts_batches() {
        let env = Envelope::parse(r#"[{"jsonrpc":"2.0","id":1,"method":"a"}]"#).unwrap();
        assert!(env.id().is_none());
    }

    #[test]
    fn rejects_non_json_and_scalars() {
        assert!(matches!(
            Envelope::parse("starting server..."),
            Err(EnvelopeError::MalformedJson(_))
        ));
        assert!(matches!(Envelope::parse("   "), Err(EnvelopeError::Empty)));
        assert!(matches!(
            Envelope::parse("42"),
            Err(EnvelopeError::NotAMessage("number"))
        ));
        assert!(matches!(
            Envelope::parse(r#""text""#),
            Err(EnvelopeError::NotAMessage("string"))
        ));
        assert!(matches!(
            Envelope::parse("null"),
            Err(EnvelopeError::NotAMessage("null"))
        ));
    }
}
