//! Runtime values and storage-class coercion.
//!
//! Filter and parameter values are coerced into a column's storage class
//! before they are embedded in the correlation payload; the mapping is a
//! fixed table and never a silent fallback.

use serde::{Deserialize, Serialize};
use serde_json::{Number, Value as JsonValue};
use std::fmt;

///
/// Value
///
/// Tagged runtime value as supplied per call by the execution engine and as
/// decoded from store rows. Collections are deliberately absent; a fetch
/// correlates on scalar column values only.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

impl Value {
    /// True when this value is the null marker.
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Stable label used in diagnostics.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Uint(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
        }
    }

    /// Coerce this value into a storage-class shaped JSON value for the
    /// correlation payload. `Null` passes through as JSON null (parameter
    /// slots may legitimately be null; null *filter* inputs never reach
    /// this point because their call contributes no tuple).
    pub fn to_storage_json(&self, class: StorageClass) -> Result<JsonValue, CoerceError> {
        let coerced = match (class, self) {
            (_, Self::Null) => Some(JsonValue::Null),
            (StorageClass::Integer, Self::Int(v)) => Some(JsonValue::Number(Number::from(*v))),
            (StorageClass::Integer, Self::Uint(v)) => Some(JsonValue::Number(Number::from(*v))),
            (StorageClass::Real, Self::Float(v)) => Number::from_f64(*v).map(JsonValue::Number),
            (StorageClass::Real, Self::Int(v)) => {
                Number::from_f64(*v as f64).map(JsonValue::Number)
            }
            (StorageClass::Real, Self::Uint(v)) => {
                Number::from_f64(*v as f64).map(JsonValue::Number)
            }
            (StorageClass::Text, Self::Text(v)) => Some(JsonValue::String(v.clone())),
            (StorageClass::Boolean, Self::Bool(v)) => Some(JsonValue::Bool(*v)),
            _ => None,
        };

        coerced.ok_or_else(|| CoerceError {
            class,
            value: self.clone(),
        })
    }

    /// Decode a JSON value back into a runtime value (store-side expansion
    /// of the correlation payload, and JSON-shaped row cells).
    #[must_use]
    pub fn from_json(json: &JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(v) => Self::Bool(*v),
            JsonValue::Number(n) => {
                if let Some(v) = n.as_i64() {
                    Self::Int(v)
                } else if let Some(v) = n.as_u64() {
                    Self::Uint(v)
                } else {
                    Self::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(v) => Self::Text(v.clone()),
            JsonValue::Array(_) | JsonValue::Object(_) => Self::Null,
        }
    }

    /// Plain JSON projection, independent of any storage class. Used for
    /// opaque cursor payloads.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(v) => JsonValue::Bool(*v),
            Self::Int(v) => JsonValue::Number(Number::from(*v)),
            Self::Uint(v) => JsonValue::Number(Number::from(*v)),
            Self::Float(v) => Number::from_f64(*v).map_or(JsonValue::Null, JsonValue::Number),
            Self::Text(v) => JsonValue::String(v.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

/// Canonical equality across numeric representations.
///
/// Null never equals anything, including null; a null filter input can
/// therefore never match a stored row.
#[must_use]
pub fn canonical_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Null, _) | (_, Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Uint(a), Value::Uint(b)) => a == b,
        (Value::Int(a), Value::Uint(b)) => u64::try_from(*a).is_ok_and(|a| a == *b),
        (Value::Uint(a), Value::Int(b)) => u64::try_from(*b).is_ok_and(|b| b == *a),
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Text(a), Value::Text(b)) => a == b,
        _ => false,
    }
}

///
/// StorageClass
///
/// The SQL-side type a column's values take inside the correlation payload
/// and the expanded batch table.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StorageClass {
    Integer,
    Real,
    Text,
    Boolean,
}

impl StorageClass {
    /// SQL type name used when declaring correlation-table columns.
    #[must_use]
    pub const fn sql_type(&self) -> &'static str {
        match self {
            Self::Integer => "bigint",
            Self::Real => "double precision",
            Self::Text => "text",
            Self::Boolean => "boolean",
        }
    }
}

impl fmt::Display for StorageClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_type())
    }
}

///
/// CoerceError
/// A per-call value did not fit its column's storage class.
///

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[error("cannot coerce {} value {value} into storage class {class}", value.tag())]
pub struct CoerceError {
    pub class: StorageClass,
    pub value: Value,
}

///
/// TESTS
///
