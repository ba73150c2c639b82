//! Inbound messages and outbound invocations.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::arguments::{EventPayload, normalize_arguments};

// ============================================================================
// InboundMessage
// ============================================================================

/// A hub event after payload normalization.
///
/// # Format
///
/// ```json
/// { "eventName": "chatMessage", "arguments": ["alice", "hi"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    /// Name of the hub event.
    pub event_name: String,

    /// Normalized arguments, in payload order.
    pub arguments: Vec<String>,
}

impl InboundMessage {
    /// Creates a message with already normalized arguments.
    #[inline]
    #[must_use]
    pub fn new(event_name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            event_name: event_name.into(),
            arguments,
        }
    }

    /// Normalizes `payload` into a message for `event_name`.
    #[must_use]
    pub fn from_payload(event_name: impl Into<String>, payload: &EventPayload) -> Self {
        Self::new(event_name, normalize_arguments(payload))
    }
}

// ============================================================================
// InvokeRequest
// ============================================================================

/// A hub method call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeRequest {
    /// Hub method name.
    pub method_name: String,

    /// String arguments, in call order.
    pub arguments: Vec<String>,
}

impl InvokeRequest {
    /// Creates an invocation request.
    #[inline]
    #[must_use]
    pub fn new(method_name: impl Into<String>, arguments: Vec<String>) -> Self {
        Self {
            method_name: method_name.into(),
            arguments,
        }
    }

    /// Returns the arguments as JSON values for the wire.
    #[must_use]
    pub fn wire_arguments(&self) -> Vec<Value> {
        self.arguments.iter().cloned().map(Value::String).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_payload() {
        let message = InboundMessage::from_payload("chatMessage", &json!(["alice", "hi"]).into());
        assert_eq!(message.event_name, "chatMessage");
        assert_eq!(message.arguments, vec!["alice", "hi"]);
    }

    #[test]
    fn test_message_serialization() {
        let message = InboundMessage::new("ping", Vec::new());
        let value = serde_json::to_value(&message).expect("serialize");
        assert_eq!(value, json!({"eventName": "ping", "arguments": []}));
    }

    #[test]
    fn test_wire_arguments() {
        let request = InvokeRequest::new("send", vec!["hello".into(), "42".into()]);
        assert_eq!(request.wire_arguments(), vec![json!("hello"), json!("42")]);
    }
}
