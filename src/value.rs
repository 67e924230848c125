// ABOUTME: Argument/return value representation shared by every serializer
// ABOUTME: Small JSON-shaped data model so handlers don't commit to one wire format

use std::collections::BTreeMap;

/// A single RPC argument or return value.
///
/// This is deliberately JSON-shaped: every [`crate::serializer::Serializer`]
/// implementation can represent it, even the ones (like `LengthPrefixedStrings`)
/// that only understand byte strings, which simply reject the variants they
/// cannot carry (see [`crate::error::SerializerError::UnsupportedValue`]).
/// The derived `Serialize`/`Deserialize` here are externally tagged (the
/// default), which is what [`crate::serializer::StructuredBinarySerializer`]
/// relies on: BARE unions are encoded by discriminant, so tagging carries no
/// ambiguity. `JsonArraySerializer` does not use this derive at all, since
/// `Bytes` and `Array` would be indistinguishable under JSON's untagged duck
/// typing, so it converts to/from `serde_json::Value` by hand instead.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Bytes(_) => "bytes",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

pub(crate) fn unsupported(value: &Value) -> &'static str {
    value.kind()
}
