//! Command envelope carried inside decoded frame bodies.

use serde_json::Value;

/// A parsed JSON command envelope.
///
/// Envelopes key on a `cmd` string; depending on the command the payload
/// lives under `data` (object) or `info` (positional array). The raw text
/// is kept alongside the parsed value so interception hooks and generic
/// messages can see exactly what arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    raw: String,
    value: Value,
}

impl CommandEnvelope {
    /// Parses an envelope from the decoded frame body.
    pub fn parse(json: &str) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_str(json)?;
        Ok(Self {
            raw: json.to_string(),
            value,
        })
    }

    /// The `cmd` discriminator, if present.
    pub fn cmd(&self) -> Option<&str> {
        self.value.get("cmd").and_then(Value::as_str)
    }

    /// The `data` payload object, if present.
    pub fn data(&self) -> Option<&Value> {
        self.value.get("data")
    }

    /// The positional `info` payload, if present.
    pub fn info(&self) -> Option<&Value> {
        self.value.get("info")
    }

    /// The full parsed envelope.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// The envelope exactly as it arrived on the wire.
    pub fn raw(&self) -> &str {
        &self.raw
    }
}
