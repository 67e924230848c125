// ABOUTME: Pluggable argument/return encoding used identically by both endpoints
// ABOUTME: Three standard implementations: length-prefixed strings, JSON array, BARE structured binary

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::SerializerError;
use crate::value::{self, Value};

/// Encodes and decodes the argument/return tuple carried inside a frame's payload.
///
/// Implementations are pure: encoding and decoding never touch the socket or
/// any engine state. A failure here is always fatal for the connection (see
/// the error handling design notes), and there is no partial-payload recovery.
pub trait Serializer: Send + Sync {
    fn encode(&self, values: &[Value]) -> Result<Bytes, SerializerError>;
    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, SerializerError>;
}

/// Concatenation of `u32`-length-prefixed byte strings.
///
/// Only [`Value::Str`] and [`Value::Bytes`] are representable; this mirrors the
/// source's simplest serializer, which is 8-bit-clean but otherwise untyped.
#[derive(Debug, Default, Clone, Copy)]
pub struct LengthPrefixedStringsSerializer;

impl Serializer for LengthPrefixedStringsSerializer {
    fn encode(&self, values: &[Value]) -> Result<Bytes, SerializerError> {
        let mut buf = BytesMut::new();
        for value in values {
            let bytes: &[u8] = match value {
                Value::Str(s) => s.as_bytes(),
                Value::Bytes(b) => b.as_slice(),
                other => return Err(SerializerError::UnsupportedValue(value::unsupported(other))),
            };
            buf.put_u32(bytes.len() as u32);
            buf.put_slice(bytes);
        }
        Ok(buf.freeze())
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, SerializerError> {
        let mut cursor = bytes;
        let mut out = Vec::new();
        while cursor.has_remaining() {
            if cursor.remaining() < 4 {
                return Err(SerializerError::Truncated);
            }
            let len = cursor.get_u32() as usize;
            if cursor.remaining() < len {
                return Err(SerializerError::Truncated);
            }
            let chunk = &cursor[..len];
            cursor.advance(len);
            out.push(match std::str::from_utf8(chunk) {
                Ok(s) => Value::Str(s.to_string()),
                Err(_) => Value::Bytes(chunk.to_vec()),
            });
        }
        Ok(out)
    }
}

/// Payload is a UTF-8 JSON array whose elements are the argument values.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonArraySerializer;

impl JsonArraySerializer {
    fn to_json(value: &Value) -> serde_json::Value {
        match value {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Bytes(b) => {
                serde_json::Value::Array(b.iter().map(|byte| serde_json::Value::from(*byte)).collect())
            }
            Value::Array(items) => serde_json::Value::Array(items.iter().map(Self::to_json).collect()),
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::to_json(v)))
                    .collect(),
            ),
        }
    }

    fn from_json(value: serde_json::Value) -> Value {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .or_else(|| n.as_f64().map(Value::Float))
                .unwrap_or(Value::Null),
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Self::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.into_iter()
                    .map(|(k, v)| (k, Self::from_json(v)))
                    .collect(),
            ),
        }
    }
}

impl Serializer for JsonArraySerializer {
    fn encode(&self, values: &[Value]) -> Result<Bytes, SerializerError> {
        let array = serde_json::Value::Array(values.iter().map(Self::to_json).collect());
        Ok(Bytes::from(serde_json::to_vec(&array)?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, SerializerError> {
        let array: serde_json::Value = serde_json::from_slice(bytes)?;
        match array {
            serde_json::Value::Array(items) => Ok(items.into_iter().map(Self::from_json).collect()),
            other => Ok(vec![Self::from_json(other)]),
        }
    }
}

/// Portable binary form, capable of nested structures.
///
/// Grounded on the BARE (Binary Application Record Encoding) framing used by
/// the `serde_bare` crate; the source's "native" variant, which can represent
/// cyclic object graphs via host-specific references, has no safe equivalent
/// here and is intentionally not implemented (see the design notes' open
/// questions, only the portable, acyclic form is provided).
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredBinarySerializer;

impl Serializer for StructuredBinarySerializer {
    fn encode(&self, values: &[Value]) -> Result<Bytes, SerializerError> {
        Ok(Bytes::from(serde_bare::to_vec(&values.to_vec())?))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<Value>, SerializerError> {
        Ok(serde_bare::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_prefixed_round_trips_strings_and_bytes() {
        let ser = LengthPrefixedStringsSerializer;
        let values = vec![Value::Str("hello".into()), Value::Bytes(vec![0xff, 0x00, 0x10])];
        let encoded = ser.encode(&values).unwrap();
        let decoded = ser.decode(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn length_prefixed_rejects_unrepresentable_values() {
        let ser = LengthPrefixedStringsSerializer;
        let err = ser.encode(&[Value::Int(3)]).unwrap_err();
        assert!(matches!(err, SerializerError::UnsupportedValue("int")));
    }

    #[test]
    fn json_array_round_trips_nested_values() {
        let ser = JsonArraySerializer;
        let mut map = std::collections::BTreeMap::new();
        map.insert("k".to_string(), Value::Bool(true));
        let values = vec![Value::Int(42), Value::Array(vec![Value::Str("x".into())]), Value::Map(map)];
        let encoded = ser.encode(&values).unwrap();
        let decoded = ser.decode(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn structured_binary_round_trips_nested_values() {
        let ser = StructuredBinarySerializer;
        let values = vec![
            Value::Str("a".into()),
            Value::Array(vec![Value::Int(1), Value::Int(2)]),
            Value::Null,
        ];
        let encoded = ser.encode(&values).unwrap();
        let decoded = ser.decode(&encoded).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn empty_argument_list_round_trips_on_every_serializer() {
        for ser in [
            &LengthPrefixedStringsSerializer as &dyn Serializer,
            &JsonArraySerializer,
            &StructuredBinarySerializer,
        ] {
            let encoded = ser.encode(&[]).unwrap();
            assert_eq!(ser.decode(&encoded).unwrap(), Vec::<Value>::new());
        }
    }
}
