//! Lenient field access on raw device values.
//!
//! Firmwares disagree on casing (`external_port` vs `ExternalPort`) and on
//! whether numbers are sent as JSON numbers or strings.

use serde_json::{Map, Value};

/// First present, non-null value among `names`.
pub(crate) fn field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .find(|v| !v.is_null())
}

/// Field rendered as a label value. Empty strings count as absent.
pub(crate) fn text(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    match field(obj, names)? {
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_owned()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Field as a number, accepting numeric strings.
pub(crate) fn number(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    match field(obj, names)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Field as a flag, accepting `true`/`1`/`"true"`/`"1"`/`"enabled"`.
pub(crate) fn flag(obj: &Map<String, Value>, names: &[&str]) -> Option<bool> {
    match field(obj, names)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|v| v != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "enabled" | "yes" => Some(true),
            "false" | "0" | "disabled" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Entries of a list value. `null` and `[]` both yield no entries.
pub(crate) fn entries(value: &Value) -> Option<Vec<&Map<String, Value>>> {
    match value {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => Some(items.iter().filter_map(Value::as_object).collect()),
        _ => None,
    }
}
