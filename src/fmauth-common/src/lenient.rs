//! Tolerant decoding for legacy-API fields.
//!
//! FileMaker fields may arrive as a number, a numeric string, an empty string,
//! or the `"?"` placeholder it emits for unrepresentable values. These helpers
//! never fail: anything unusable collapses to the type's default (zero or
//! empty), so one odd field never sinks a whole record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Placeholder FileMaker writes for values it cannot render.
pub const PLACEHOLDER: &str = "?";

/// Read a value as text. Numbers and booleans are rendered, null is empty.
pub fn string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Read a value as an integer, defaulting to zero.
pub fn int(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => parse_int(s),
        _ => 0,
    }
}

/// Read a value as a float, defaulting to zero.
pub fn float(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => parse_float(s),
        _ => 0.0,
    }
}

/// Look up `field` in a record's field data and read it as text.
pub fn field_string(fields: &Value, field: &str) -> String {
    fields.get(field).map(string).unwrap_or_default()
}

fn parse_int(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == PLACEHOLDER {
        return 0;
    }
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}

fn parse_float(raw: &str) -> f64 {
    let raw = raw.trim();
    if raw.is_empty() || raw == PLACEHOLDER {
        return 0.0;
    }
    raw.parse::<f64>().unwrap_or(0.0)
}

/// `deserialize_with` adapter for text fields.
pub fn deserialize_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(string).unwrap_or_default())
}

/// `deserialize_with` adapter for integer fields.
pub fn deserialize_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(int).unwrap_or_default())
}

/// `deserialize_with` adapter for decimal fields.
pub fn deserialize_float<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().map(float).unwrap_or_default())
}
