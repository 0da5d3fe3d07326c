//! Canonical CBOR encoding for the edit wire format.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - Floats always as 64-bit
//!
//! An edit encodes as a map with integer keys `0: version`,
//! `1: other_version`, `2: delta`. The delta key is omitted for
//! acknowledgments. The same encoder is used to fingerprint JSON
//! documents, so two equal values always produce identical bytes.

use ciborium::value::{Integer, Value};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::edit::Edit;
use crate::error::CodecError;

/// Edit field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const OTHER_VERSION: u64 = 1;
    pub const DELTA: u64 = 2;
}

/// Encode an edit to canonical CBOR bytes.
pub fn encode_edit<D: Serialize>(edit: &Edit<D>) -> Result<Vec<u8>, CodecError> {
    let value = edit_to_cbor(edit)?;
    encode_canonical(&value)
}

/// Decode an edit from CBOR bytes.
pub fn decode_edit<D: DeserializeOwned>(bytes: &[u8]) -> Result<Edit<D>, CodecError> {
    let value: Value =
        ciborium::de::from_reader(bytes).map_err(|e| CodecError::Decoding(e.to_string()))?;
    edit_from_cbor(&value)
}

/// Encode a JSON value to canonical CBOR bytes.
pub fn canonical_value_bytes(value: &serde_json::Value) -> Result<Vec<u8>, CodecError> {
    encode_canonical(&json_to_cbor(value))
}

/// Convert an edit to a CBOR value (map with integer keys).
pub fn edit_to_cbor<D: Serialize>(edit: &Edit<D>) -> Result<Value, CodecError> {
    let mut entries = Vec::with_capacity(3);

    // 0: version
    entries.push((
        Value::Integer(keys::VERSION.into()),
        Value::Integer(edit.version.into()),
    ));

    // 1: other_version
    entries.push((
        Value::Integer(keys::OTHER_VERSION.into()),
        Value::Integer(edit.other_version.into()),
    ));

    // 2: delta (absent for acknowledgments)
    if let Some(delta) = &edit.delta {
        let delta_value =
            Value::serialized(delta).map_err(|e| CodecError::Encoding(e.to_string()))?;
        entries.push((Value::Integer(keys::DELTA.into()), delta_value));
    }

    Ok(Value::Map(entries))
}

/// Convert a CBOR value (map) back to an edit.
pub fn edit_from_cbor<D: DeserializeOwned>(value: &Value) -> Result<Edit<D>, CodecError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CodecError::MalformedEdit("expected map".into())),
    };

    let mut version = None;
    let mut other_version = None;
    let mut delta = None;

    for (key, field) in map {
        let key = match key {
            Value::Integer(i) => i128::from(*i),
            _ => return Err(CodecError::MalformedEdit("non-integer key".into())),
        };

        match u64::try_from(key) {
            Ok(keys::VERSION) if version.is_none() => {
                version = Some(cbor_to_u64(field, "version")?);
            }
            Ok(keys::OTHER_VERSION) if other_version.is_none() => {
                other_version = Some(cbor_to_u64(field, "other_version")?);
            }
            Ok(keys::DELTA) if delta.is_none() => {
                let parsed: D = field
                    .deserialized()
                    .map_err(|e| CodecError::Decoding(e.to_string()))?;
                delta = Some(parsed);
            }
            Ok(k @ (keys::VERSION | keys::OTHER_VERSION | keys::DELTA)) => {
                return Err(CodecError::MalformedEdit(format!("duplicate key {}", k)));
            }
            _ => return Err(CodecError::MalformedEdit(format!("unknown key {}", key))),
        }
    }

    Ok(Edit {
        version: version.ok_or_else(|| CodecError::MalformedEdit("missing version".into()))?,
        other_version: other_version
            .ok_or_else(|| CodecError::MalformedEdit("missing other_version".into()))?,
        delta,
    })
}

/// Read a CBOR integer as an unsigned version number.
pub fn cbor_to_u64(value: &Value, field: &str) -> Result<u64, CodecError> {
    match value {
        Value::Integer(i) => u64::try_from(i128::from(*i))
            .map_err(|_| CodecError::MalformedEdit(format!("{} out of range", field))),
        _ => Err(CodecError::MalformedEdit(format!("{} is not an integer", field))),
    }
}

/// Convert a JSON value into the equivalent CBOR value.
fn json_to_cbor(value: &serde_json::Value) -> Value {
    use serde_json::Value as Json;

    match value {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => {
            if let Some(u) = n.as_u64() {
                Value::Integer(u.into())
            } else if let Some(i) = n.as_i64() {
                Value::Integer(i.into())
            } else {
                match n.as_f64() {
                    Some(f) => Value::Float(f),
                    None => Value::Null,
                }
            }
        }
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::Array(items.iter().map(json_to_cbor).collect()),
        Json::Object(map) => Value::Map(
            map.iter()
                .map(|(k, v)| (Value::Text(k.clone()), json_to_cbor(v)))
                .collect(),
        ),
    }
}

/// Encode a CBOR Value to canonical bytes.
///
/// This function ensures:
/// - Map keys are sorted by encoded byte comparison
/// - Integers use smallest encoding
/// - Definite lengths only
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => encode_array(buf, arr)?,
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(f) => {
            buf.push(0xfb);
            buf.extend_from_slice(&f.to_be_bytes());
        }
        Value::Tag(..) => return Err(CodecError::Unsupported("tag")),
        _ => return Err(CodecError::Unsupported("unknown value type")),
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        // Major type 0: unsigned integer
        encode_uint(buf, 0, n as u64);
    } else {
        // Major type 1: negative integer
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffffffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a byte string (major type 2).
fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

/// Encode a text string (major type 3).
fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode an array (major type 4).
fn encode_array(buf: &mut Vec<u8>, arr: &[Value]) -> Result<(), CodecError> {
    encode_uint(buf, 4, arr.len() as u64);
    for item in arr {
        encode_value_to(buf, item)?;
    }
    Ok(())
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CodecError> {
    let mut key_value_pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        key_value_pairs.push((key_buf, v));
    }

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
