//! Plain JSON
//!
//! Decoding produces string maps at every level and turns every number into
//! a float, as JSON itself does not distinguish them. Encoding is lossy for
//! the types JSON lacks: map keys are stringified, bytes become base64 text
//! and timestamps become RFC 3339 text. Use [`crate::codec::xjson`] when
//! those distinctions matter.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::IgnoredAny;
use serde::ser::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};

use crate::codec::Format;
use crate::core::key::format_timestamp;
use crate::core::{List, Path, StringMap, Value};
use crate::error::{ArdError, ArdResult};

/// Decode a JSON document
///
/// # Errors
///
/// Returns a decode error with line and column when the input is not JSON.
pub fn decode(bytes: &[u8]) -> ArdResult<Value> {
    let json: serde_json::Value = serde_json::from_slice(bytes).map_err(decode_error)?;
    Ok(from_json(json))
}

/// Decode a JSON document from text
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_str(text: &str) -> ArdResult<Value> {
    decode(text.as_bytes())
}

/// Encode compactly
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode(value: &Value) -> ArdResult<Vec<u8>> {
    encode_with(value, None)
}

/// Encode, pretty-printed when `indent` is set
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode_with(value: &Value, indent: Option<usize>) -> ArdResult<Vec<u8>> {
    let json = to_json(value, &Path::new())?;
    write_json(&json, indent)
}

/// Encode as a string
///
/// # Errors
///
/// Same as [`encode_with`].
pub fn encode_string(value: &Value, indent: Option<usize>) -> ArdResult<String> {
    let bytes = encode_with(value, indent)?;
    String::from_utf8(bytes).map_err(|e| ArdError::encode(Format::Json, e.to_string()))
}

/// Check syntax without building a tree
///
/// A stream of concatenated JSON values is accepted.
///
/// # Errors
///
/// Returns a decode error for the first malformed value.
pub fn validate(bytes: &[u8]) -> ArdResult<()> {
    for item in serde_json::Deserializer::from_slice(bytes).into_iter::<IgnoredAny>() {
        item.map_err(decode_error)?;
    }
    Ok(())
}

// ==================== Conversion ====================

pub(crate) fn from_json(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(b),
        serde_json::Value::Number(n) => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(from_json).collect::<List>())
        }
        serde_json::Value::Object(object) => Value::StringMap(
            object
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<StringMap>(),
        ),
    }
}

pub(crate) fn to_json(value: &Value, path: &Path) -> ArdResult<serde_json::Value> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => serde_json::Value::Bool(*b),
        Value::Integer(i) => serde_json::Value::from(*i),
        Value::UnsignedInteger(u) => serde_json::Value::from(*u),
        Value::Float(f) => match serde_json::Number::from_f64(*f) {
            Some(n) => serde_json::Value::Number(n),
            None => serde_json::Value::String(non_finite(*f).to_owned()),
        },
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::String(STANDARD.encode(b)),
        Value::Timestamp(t) => serde_json::Value::String(format_timestamp(t)),
        Value::List(list) => serde_json::Value::Array(
            list.iter()
                .enumerate()
                .map(|(i, v)| to_json(v, &path.append_list(i)))
                .collect::<ArdResult<_>>()?,
        ),
        Value::Map(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                let key = k.key_string();
                let child = to_json(v, &path.append_map(key.as_ref()))?;
                object.insert(key.into_owned(), child);
            }
            serde_json::Value::Object(object)
        }
        Value::StringMap(map) => {
            let mut object = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                object.insert(k.clone(), to_json(v, &path.append_map(k.as_str()))?);
            }
            serde_json::Value::Object(object)
        }
        Value::Host(host) => return Err(ArdError::unsupported_type(path, host.type_name())),
    })
}

fn non_finite(f: f64) -> &'static str {
    if f.is_nan() {
        "NaN"
    } else if f > 0.0 {
        "+Infinity"
    } else {
        "-Infinity"
    }
}

pub(crate) fn write_json(json: &serde_json::Value, indent: Option<usize>) -> ArdResult<Vec<u8>> {
    let mut out = Vec::new();
    let result = match indent {
        Some(width) => {
            let indent = " ".repeat(width);
            let mut serializer =
                Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(indent.as_bytes()));
            json.serialize(&mut serializer)
        }
        None => json.serialize(&mut Serializer::new(&mut out)),
    };
    result.map_err(|e| ArdError::encode(Format::Json, e.to_string()))?;
    Ok(out)
}

fn decode_error(e: serde_json::Error) -> ArdError {
    ArdError::decode(Format::Json, e.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::core::Map;

    #[test]
    fn test_decode_uses_string_maps_and_floats() {
        let value = decode(br#"{"a": {"b": [1, -2, 3.5]}}"#).unwrap();

        let Value::StringMap(outer) = &value else {
            panic!("expected string map");
        };
        let inner = &outer["a"];
        assert!(matches!(inner, Value::StringMap(_)));
        assert_eq!(
            inner.get_key("b"),
            Some(&Value::List(vec![
                Value::Float(1.0),
                Value::Float(-2.0),
                Value::Float(3.5),
            ]))
        );
    }

    #[test]
    fn test_decode_error_has_position() {
        let error = decode(b"{\n  \"a\": tru,\n}").unwrap_err();
        let message = error.to_string();
        assert!(message.starts_with("malformed json:"), "{message}");
        assert!(message.contains("line 2"), "{message}");
    }

    #[test]
    fn test_encode_lossy_types() {
        let mut map = Map::new();
        map.insert(Value::Integer(1), Value::Bytes(vec![0xde, 0xad]));
        map.insert(
            Value::string("t"),
            Value::Timestamp(DateTime::parse_from_rfc3339("2020-02-03T04:05:06+01:00").unwrap()),
        );

        let text = encode_string(&Value::Map(map), None).unwrap();
        assert_eq!(text, r#"{"1":"3q0=","t":"2020-02-03T04:05:06+01:00"}"#);
    }

    #[rstest]
    #[case(f64::NAN, "\"NaN\"")]
    #[case(f64::INFINITY, "\"+Infinity\"")]
    #[case(f64::NEG_INFINITY, "\"-Infinity\"")]
    #[case(1.5, "1.5")]
    fn test_encode_floats(#[case] f: f64, #[case] expected: &str) {
        assert_eq!(encode_string(&Value::Float(f), None).unwrap(), expected);
    }

    #[test]
    fn test_encode_indent() {
        let value = Value::List(vec![Value::Boolean(true)]);
        assert_eq!(encode_string(&value, Some(4)).unwrap(), "[\n    true\n]");
    }

    #[test]
    fn test_encode_rejects_host() {
        let error = encode(&Value::List(vec![Value::host(1u8)])).unwrap_err();
        assert!(matches!(error, ArdError::UnsupportedType { .. }));
    }

    #[test]
    fn test_validate_accepts_streams() {
        assert!(validate(b"{} [1] \"x\"").is_ok());
        assert!(validate(b"{} [1").is_err());
    }
}
