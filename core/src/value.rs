//! Parameter and row-cell value types
//!
//! SQLite stores five value classes (integer, real, text, blob, null).
//! [`ParamValue`] covers the bind side with the widening rules clients rely
//! on (booleans bind as 0/1, every integer width widens to i64, an empty
//! blob binds as NULL), and [`Cell`] covers the extract side.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rusqlite::types::ValueRef;
use serde::{Serialize, Serializer};

use crate::error::EngineError;

/// One bound parameter. An empty or absent name means positional binding
/// (1-based); a present name is resolved by probing the `:`, `@`, `$`, `?`
/// prefixes against the prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub value: ParamValue,
}

impl Param {
    /// A positional parameter.
    pub fn positional(value: ParamValue) -> Self { Self { name: None, value } }

    /// A named parameter.
    pub fn named(name: impl Into<String>, value: ParamValue) -> Self { Self { name: Some(name.into()), value } }

    /// Decode a parameter from its JSON wire shape: either a bare scalar
    /// (positional) or a `{name?, value}` object.
    ///
    /// Decoding never fails; JSON kinds with no SQLite mapping become
    /// [`ParamValue::Unsupported`] and error at bind time, so one bad
    /// parameter fails its own statement instead of the whole batch.
    pub fn from_json(raw: &serde_json::Value) -> Param {
        if let serde_json::Value::Object(map) = raw {
            if map.contains_key("value") || map.contains_key("name") {
                let name = map.get("name").and_then(serde_json::Value::as_str).filter(|n| !n.is_empty()).map(str::to_string);
                let value = ParamValue::from_json(map.get("value").unwrap_or(&serde_json::Value::Null));
                return Param { name, value };
            }
        }
        Param { name: None, value: ParamValue::from_json(raw) }
    }
}

/// A value to bind into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// A kind with no SQLite mapping; binding it fails with
    /// `bind-unsupported-type`. Carries a short description of the offender.
    Unsupported(String),
}

impl ParamValue {
    /// Map a JSON value onto a bindable kind.
    pub fn from_json(raw: &serde_json::Value) -> ParamValue {
        match raw {
            serde_json::Value::Null => ParamValue::Null,
            serde_json::Value::Bool(b) => ParamValue::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    ParamValue::Integer(i)
                } else if n.as_u64().is_some() {
                    ParamValue::Unsupported("unsigned integer out of i64 range".to_string())
                } else if let Some(f) = n.as_f64() {
                    ParamValue::Real(f)
                } else {
                    ParamValue::Unsupported("number".to_string())
                }
            }
            serde_json::Value::String(s) => ParamValue::Text(s.clone()),
            serde_json::Value::Array(_) => ParamValue::Unsupported("array".to_string()),
            serde_json::Value::Object(_) => ParamValue::Unsupported("object".to_string()),
        }
    }

    /// Convert to a rusqlite value, applying the widening rules.
    pub fn to_sql(&self) -> Result<rusqlite::types::Value, EngineError> {
        Ok(match self {
            ParamValue::Null => rusqlite::types::Value::Null,
            ParamValue::Bool(b) => rusqlite::types::Value::Integer(if *b { 1 } else { 0 }),
            ParamValue::Integer(i) => rusqlite::types::Value::Integer(*i),
            ParamValue::Real(f) => rusqlite::types::Value::Real(*f),
            ParamValue::Text(s) => rusqlite::types::Value::Text(s.clone()),
            // An empty blob binds as NULL.
            ParamValue::Blob(b) if b.is_empty() => rusqlite::types::Value::Null,
            ParamValue::Blob(b) => rusqlite::types::Value::Blob(b.clone()),
            ParamValue::Unsupported(kind) => return Err(EngineError::BindUnsupportedType(kind.clone())),
        })
    }
}

/// One cell of a materialized row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    /// The SQLite datatype name used when a column has no declared type and
    /// the type must be inferred from the first row.
    pub fn type_name(&self) -> &'static str {
        match self {
            Cell::Null => "",
            Cell::Integer(_) => "integer",
            Cell::Real(_) => "real",
            Cell::Text(_) => "text",
            Cell::Blob(_) => "blob",
        }
    }
}

impl From<ValueRef<'_>> for Cell {
    fn from(value: ValueRef<'_>) -> Self {
        match value {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

/// Cells serialize to the JSON wire shapes: null, number, string, and blobs
/// as base64 strings.
impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => serializer.serialize_none(),
            Cell::Integer(i) => serializer.serialize_i64(*i),
            Cell::Real(f) => serializer.serialize_f64(*f),
            Cell::Text(s) => serializer.serialize_str(s),
            Cell::Blob(b) => serializer.serialize_str(&BASE64.encode(b)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn param_from_bare_scalar_is_positional() {
        let param = Param::from_json(&json!("hello"));
        assert_eq!(param, Param::positional(ParamValue::Text("hello".to_string())));

        let param = Param::from_json(&json!(42));
        assert_eq!(param.value, ParamValue::Integer(42));

        let param = Param::from_json(&json!(1.5));
        assert_eq!(param.value, ParamValue::Real(1.5));

        let param = Param::from_json(&json!(null));
        assert_eq!(param.value, ParamValue::Null);
    }

    #[test]
    fn param_from_object_carries_name() {
        let param = Param::from_json(&json!({"name": "id", "value": 7}));
        assert_eq!(param, Param::named("id", ParamValue::Integer(7)));

        // Empty name degrades to positional.
        let param = Param::from_json(&json!({"name": "", "value": true}));
        assert_eq!(param, Param::positional(ParamValue::Bool(true)));
    }

    #[test]
    fn unsupported_json_kinds_fail_at_bind_time() {
        let param = Param::from_json(&json!([1, 2, 3]));
        let err = param.value.to_sql().unwrap_err();
        assert!(err.to_string().contains("bind-unsupported-type"), "{err}");

        let param = Param::from_json(&json!(u64::MAX));
        assert!(param.value.to_sql().is_err());
    }

    #[test]
    fn widening_rules() {
        assert_eq!(ParamValue::Bool(true).to_sql().unwrap(), rusqlite::types::Value::Integer(1));
        assert_eq!(ParamValue::Bool(false).to_sql().unwrap(), rusqlite::types::Value::Integer(0));
        assert_eq!(ParamValue::Blob(Vec::new()).to_sql().unwrap(), rusqlite::types::Value::Null);
        assert_eq!(ParamValue::Blob(vec![1]).to_sql().unwrap(), rusqlite::types::Value::Blob(vec![1]));
    }

    #[test]
    fn cell_serialization() {
        let row = vec![Cell::Integer(1), Cell::Text("a".to_string()), Cell::Null, Cell::Real(2.5), Cell::Blob(vec![0xde, 0xad])];
        let encoded = serde_json::to_string(&row).unwrap();
        assert_eq!(encoded, r#"[1,"a",null,2.5,"3q0="]"#);
    }
}
