//! One poll's worth of external data for an entity.
//!
//! The payload is kept as raw JSON and read through JSON pointers so a
//! missing field can be told apart from a zero value. Snapshots are never
//! persisted.

use serde_json::{Map, Value};

/// Freshly fetched external data for one entity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot(Value);

impl Snapshot {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn raw(&self) -> &Value {
        &self.0
    }

    /// Look up a value by JSON pointer (e.g. `/energy/fulltime`).
    pub fn get(&self, pointer: &str) -> Option<&Value> {
        self.0.pointer(pointer)
    }

    pub fn i64_at(&self, pointer: &str) -> Option<i64> {
        self.get(pointer).and_then(as_i64)
    }

    pub fn str_at(&self, pointer: &str) -> Option<&str> {
        self.get(pointer).and_then(Value::as_str)
    }

    pub fn truthy_at(&self, pointer: &str) -> Option<bool> {
        self.get(pointer).map(is_truthy)
    }

    pub fn object_at(&self, pointer: &str) -> Option<&Map<String, Value>> {
        self.get(pointer).and_then(Value::as_object)
    }
}

impl From<Value> for Snapshot {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

/// Integer view of a JSON value; numeric strings and floats are accepted.
pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Loose truthiness as the remote API uses it (`0`/`1`, `""`, booleans).
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn reads_nested_integers() {
        let snap = Snapshot::new(json!({"energy": {"fulltime": 30, "current": "150"}}));
        assert_eq!(snap.i64_at("/energy/fulltime"), Some(30));
        assert_eq!(snap.i64_at("/energy/current"), Some(150));
        assert_eq!(snap.i64_at("/energy/maximum"), None);
    }

    #[test]
    fn truthiness_matches_remote_conventions() {
        assert!(!is_truthy(&json!(0)));
        assert!(is_truthy(&json!(1)));
        assert!(!is_truthy(&json!("")));
        assert!(is_truthy(&json!(true)));
        assert!(!is_truthy(&json!(null)));
    }
}
