//! Lenient view over Feishu event callback bodies.
//!
//! Callbacks are treated as opaque JSON: every field is optional and each one
//! is read on its own, so a field with an unexpected shape reads as absent
//! without hiding its neighbours. The raw value is kept so it can be audited
//! verbatim.

use serde_json::{Map, Value};

/// Event type emitted when users join a group chat.
pub const MEMBER_ADDED_EVENT: &str = "im.chat.member.user.added_v1";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InboundEvent {
    pub raw: Value,
}

impl InboundEvent {
    /// Wraps a decoded body. Never fails: anything that is not a JSON object
    /// yields an event with every field absent.
    pub fn from_value(raw: Value) -> Self {
        Self { raw }
    }

    /// Decodes a request body; bytes that are not JSON read as `{}`.
    pub fn from_slice(body: &[u8]) -> Self {
        let raw = serde_json::from_slice(body).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "callback body is not json; treating as empty");
            Value::Object(Map::new())
        });
        Self::from_value(raw)
    }

    /// True when the callback carries an encrypted body.
    pub fn is_encrypted(&self) -> bool {
        self.raw.get("encrypt").is_some_and(is_truthy)
    }

    /// Verification handshake value to echo back, if any.
    pub fn challenge(&self) -> Option<&Value> {
        self.raw.get("challenge").filter(|v| is_truthy(v))
    }

    pub fn event_id(&self) -> Option<&str> {
        non_empty_str(&self.raw, "/header/event_id")
    }

    pub fn event_type(&self) -> Option<&str> {
        self.raw.pointer("/header/event_type").and_then(Value::as_str)
    }

    pub fn is_member_added(&self) -> bool {
        self.event_type() == Some(MEMBER_ADDED_EVENT)
    }

    pub fn chat_id(&self) -> Option<&str> {
        non_empty_str(&self.raw, "/event/chat_id")
    }

    /// Open ids of the members listed in the event, in payload order.
    /// Members without a usable open id are skipped.
    pub fn open_ids(&self) -> Vec<&str> {
        self.raw
            .pointer("/event/users")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|member| non_empty_str(member, "/user_id/open_id"))
            .collect()
    }
}

fn non_empty_str<'a>(value: &'a Value, pointer: &str) -> Option<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
