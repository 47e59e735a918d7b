//! Plain value types shared by options and records.
//!
//! The storage boundary speaks JSON: attribute values are
//! [`serde_json::Value`], a row of plain data is a [`Record`], and a compiled
//! filter is a [`WhereMap`].

pub use serde_json::{Map, Value};

/// A plain object: attribute key to value.
pub type Record = Map<String, Value>;

/// A compiled filter: left-projection key to a literal or an operator map.
pub type WhereMap = Map<String, Value>;

/// Check whether a value is absent or JSON null.
pub fn is_nullish(value: Option<&Value>) -> bool {
    matches!(value, None | Some(Value::Null))
}

/// Check whether a filter value is an operator map (`{"$op": ...}`).
///
/// Literal objects (JSON columns compared by equality) have at least one key
/// that does not start with `$`.
pub fn is_operator_map(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}
