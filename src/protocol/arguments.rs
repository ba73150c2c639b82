//! Payload normalization.
//!
//! Hub events arrive with payloads of any shape. Before delivery they are
//! flattened into an ordered list of strings:
//!
//! | Payload | Arguments |
//! |---------|-----------|
//! | absent / `null` | `[]` |
//! | `["alice", 2, null]` | `["alice", "2", ""]` |
//! | `"hi"` | `["hi"]` |
//! | `42` / `true` | `["42"]` / `["true"]` |
//! | `{"a": 1}` | `["{\"a\":1}"]` |
//! | unparseable raw text | `[raw text]` |
//!
//! Normalization is total: it never fails for any input.

// ============================================================================
// Imports
// ============================================================================

use serde_json::Value;

// ============================================================================
// EventPayload
// ============================================================================

/// Payload of an inbound hub event as handed over by the transport.
#[derive(Debug, Clone, PartialEq)]
pub enum EventPayload {
    /// The event carried no payload.
    Absent,
    /// A decoded JSON payload.
    Json(Value),
    /// Raw payload text not yet decoded.
    Text(String),
}

impl From<Value> for EventPayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl From<Option<Value>> for EventPayload {
    fn from(value: Option<Value>) -> Self {
        value.map_or(Self::Absent, Self::Json)
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Flattens a payload into an ordered argument list.
#[must_use]
pub fn normalize_arguments(payload: &EventPayload) -> Vec<String> {
    match payload {
        EventPayload::Absent => Vec::new(),
        EventPayload::Json(value) => normalize_value(value),
        EventPayload::Text(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => normalize_value(&value),
            Err(_) => vec![raw.clone()],
        },
    }
}

/// Flattens a decoded JSON value into an ordered argument list.
#[must_use]
pub fn normalize_value(value: &Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.iter().map(argument_text).collect(),
        Value::Bool(_) | Value::Number(_) | Value::String(_) => vec![argument_text(value)],
        Value::Object(_) => vec![value.to_string()],
    }
}

/// Converts a single element to its argument text.
///
/// Strings pass through unescaped, `null` becomes the empty string, and
/// everything else uses its JSON text.
#[must_use]
pub fn argument_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Converts an invocation return value to the string handed to the caller.
///
/// No payload (or `null`) yields the empty string.
#[must_use]
pub fn result_text(value: Option<&Value>) -> String {
    value.map(argument_text).unwrap_or_default()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_absent_and_null_are_empty() {
        assert!(normalize_arguments(&EventPayload::Absent).is_empty());
        assert!(normalize_arguments(&EventPayload::Json(Value::Null)).is_empty());
        assert!(normalize_arguments(&EventPayload::Text("null".into())).is_empty());
    }

    #[test]
    fn test_array_of_strings() {
        let args = normalize_arguments(&json!(["alice", "hi"]).into());
        assert_eq!(args, vec!["alice", "hi"]);
    }

    #[test]
    fn test_array_of_mixed() {
        let args = normalize_arguments(&json!(["a", 1, 2.5, true, null, {"k": "v"}, [1]]).into());
        assert_eq!(args, vec!["a", "1", "2.5", "true", "", r#"{"k":"v"}"#, "[1]"]);
    }

    #[test]
    fn test_strings_are_not_escaped() {
        let args = normalize_arguments(&json!("say \"hi\"").into());
        assert_eq!(args, vec!["say \"hi\""]);
    }

    #[test]
    fn test_scalars() {
        assert_eq!(normalize_arguments(&json!(42).into()), vec!["42"]);
        assert_eq!(normalize_arguments(&json!(false).into()), vec!["false"]);
        assert_eq!(normalize_arguments(&json!("solo").into()), vec!["solo"]);
    }

    #[test]
    fn test_object_is_single_json_text() {
        let args = normalize_arguments(&json!({"user": "bob"}).into());
        assert_eq!(args, vec![r#"{"user":"bob"}"#]);
    }

    #[test]
    fn test_raw_text_parses_when_valid() {
        let args = normalize_arguments(&EventPayload::Text(r#"["x", 1]"#.into()));
        assert_eq!(args, vec!["x", "1"]);
    }

    #[test]
    fn test_raw_text_falls_back_when_invalid() {
        let args = normalize_arguments(&EventPayload::Text("{broken".into()));
        assert_eq!(args, vec!["{broken"]);
    }

    #[test]
    fn test_result_text() {
        assert_eq!(result_text(None), "");
        assert_eq!(result_text(Some(&Value::Null)), "");
        assert_eq!(result_text(Some(&json!("ok"))), "ok");
        assert_eq!(result_text(Some(&json!({"id": 7}))), r#"{"id":7}"#);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            any::<f64>().prop_map(|f| json!(f)),
            ".*".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::hash_map("[a-z]{1,4}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_normalization_is_total(value in arb_json()) {
            let args = normalize_arguments(&EventPayload::Json(value.clone()));
            match &value {
                Value::Null => prop_assert!(args.is_empty()),
                Value::Array(items) => prop_assert_eq!(args.len(), items.len()),
                _ => prop_assert_eq!(args.len(), 1),
            }
        }

        #[test]
        fn prop_raw_text_never_fails(raw in ".*") {
            let args = normalize_arguments(&EventPayload::Text(raw.clone()));
            if serde_json::from_str::<Value>(&raw).is_err() {
                prop_assert_eq!(args, vec![raw]);
            }
        }
    }
}
