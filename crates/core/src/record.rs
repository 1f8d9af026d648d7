//! Records are schema-less JSON values. `serde_json::Value` is already the
//! recursive {scalar, sequence, mapping} union, so the helpers here only pin
//! down what "empty" and "textual form" mean for admission checks.

use serde_json::Value;

pub type Record = Value;

/// A value counts as absent when it is `null`, `false`, numerically zero, the
/// string `""` or `"0"`, or an empty sequence or mapping.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n == 0.0),
        Value::String(text) => text.is_empty() || text == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}

/// Textual form used for pattern matching. Containers have none.
pub fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Items of a fetch result: elements of a sequence, or the values of a
/// top-level mapping. Scalars carry no records.
pub fn result_items(raw: &Value) -> Vec<&Value> {
    match raw {
        Value::Array(items) => items.iter().collect(),
        Value::Object(fields) => fields.values().collect(),
        _ => Vec::new(),
    }
}
