//! Extended JSON
//!
//! JSON with annotations for the types plain JSON loses:
//!
//! | ARD value              | extended JSON                                  |
//! |------------------------|------------------------------------------------|
//! | `Integer(-5)`          | `{"$ard.integer": "-5"}`                       |
//! | `UnsignedInteger(5)`   | `{"$ard.uinteger": "5"}`                       |
//! | `Bytes`                | `{"$ard.bytes": "<base64>"}`                   |
//! | map with non-string keys | `{"$ard.map": [{"key": K, "value": V}, ...]}` |
//!
//! A user map whose only key is one of those codes (or already starts with
//! `$$`) gets one more leading `$`, so every map survives the trip.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::trace;

use crate::codec::json;
use crate::core::key::format_timestamp;
use crate::core::{List, Map, StringMap, Value};
use crate::error::ArdResult;
use crate::ops::stringify_keys;

/// Annotation for signed integers
pub const INTEGER_CODE: &str = "$ard.integer";
/// Annotation for unsigned integers
pub const UINTEGER_CODE: &str = "$ard.uinteger";
/// Annotation for bytes
pub const BYTES_CODE: &str = "$ard.bytes";
/// Annotation for maps with non-string keys
pub const MAP_CODE: &str = "$ard.map";

const CODES: [&str; 4] = [INTEGER_CODE, UINTEGER_CODE, BYTES_CODE, MAP_CODE];

/// Decode extended JSON into ARD using [`Value::Map`]
///
/// # Errors
///
/// Returns a decode error when the input is not JSON. Malformed annotations
/// are not errors; they decode as ordinary maps.
pub fn decode(bytes: &[u8]) -> ArdResult<Value> {
    Ok(unpack(json::decode(bytes)?, false))
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
    json::encode_with(&pack(value), indent)
}

// ==================== Pack ====================

/// Annotate a tree so that it survives plain JSON
///
/// The result contains only string maps, lists and JSON-native scalars.
/// Timestamps become RFC 3339 strings.
#[must_use]
pub fn pack(value: &Value) -> Value {
    match value {
        Value::Integer(i) => annotation(INTEGER_CODE, Value::String(i.to_string())),
        Value::UnsignedInteger(u) => annotation(UINTEGER_CODE, Value::String(u.to_string())),
        Value::Bytes(b) => annotation(BYTES_CODE, Value::String(STANDARD.encode(b))),
        Value::Timestamp(t) => Value::String(format_timestamp(t)),
        Value::List(list) => Value::List(list.iter().map(pack).collect()),
        Value::StringMap(map) => {
            if map.len() == 1
                && let Some((key, element)) = map.first()
                && let Some(escaped) = escape(key)
            {
                return annotation(&escaped, pack(element));
            }
            Value::StringMap(map.iter().map(|(k, v)| (k.clone(), pack(v))).collect())
        }
        Value::Map(map) => {
            if !map.keys().all(Value::is_string) {
                let entries = map
                    .iter()
                    .map(|(k, v)| {
                        let mut entry = StringMap::with_capacity(2);
                        entry.insert("key".to_owned(), pack(k));
                        entry.insert("value".to_owned(), pack(v));
                        Value::StringMap(entry)
                    })
                    .collect::<List>();
                return annotation(MAP_CODE, Value::List(entries));
            }

            if map.len() == 1
                && let Some((Value::String(key), element)) = map.first()
                && let Some(escaped) = escape(key)
            {
                return annotation(&escaped, pack(element));
            }
            Value::StringMap(
                map.iter()
                    .map(|(k, v)| (k.key_string().into_owned(), pack(v)))
                    .collect(),
            )
        }
        other => other.clone(),
    }
}

/// Escaped form of a single map key, if it needs one
fn escape(key: &str) -> Option<String> {
    (CODES.contains(&key) || key.starts_with("$$")).then(|| format!("${key}"))
}

fn annotation(code: &str, payload: Value) -> Value {
    let mut map = StringMap::with_capacity(1);
    map.insert(code.to_owned(), payload);
    Value::StringMap(map)
}

// ==================== Unpack ====================

/// Reverse [`pack`]
///
/// Maps come out as [`Value::Map`] unless `use_string_maps` is set, in
/// which case `$ard.map` keys are stringified.
#[must_use]
pub fn unpack(value: Value, use_string_maps: bool) -> Value {
    match value {
        Value::List(list) => Value::List(
            list.into_iter()
                .map(|v| unpack(v, use_string_maps))
                .collect(),
        ),
        Value::Map(map) => unpack_map(stringify_keys(map), use_string_maps),
        Value::StringMap(map) => unpack_map(map, use_string_maps),
        other => other,
    }
}

fn unpack_map(map: StringMap, use_string_maps: bool) -> Value {
    if map.len() == 1 {
        if let Some(decoded) = unpack_annotation(&map, use_string_maps) {
            return decoded;
        }

        if let Some((key, element)) = map.first()
            && key.starts_with("$$")
        {
            let entries = [(key[1..].to_owned(), unpack(element.clone(), use_string_maps))];
            return build_map(entries, use_string_maps);
        }
    }

    build_map(
        map.into_iter()
            .map(|(k, v)| (k, unpack(v, use_string_maps))),
        use_string_maps,
    )
}

fn build_map<I>(entries: I, use_string_maps: bool) -> Value
where
    I: IntoIterator<Item = (String, Value)>,
{
    if use_string_maps {
        Value::StringMap(entries.into_iter().collect())
    } else {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (Value::String(k), v))
                .collect(),
        )
    }
}

/// Decode a single-key annotation, testing integer, uinteger, bytes, map
fn unpack_annotation(map: &StringMap, use_string_maps: bool) -> Option<Value> {
    if let Some(payload) = map.get(INTEGER_CODE) {
        let parsed = payload.as_str().and_then(|s| s.parse::<i64>().ok());
        return degrade(INTEGER_CODE, parsed.map(Value::Integer));
    }

    if let Some(payload) = map.get(UINTEGER_CODE) {
        let parsed = payload.as_str().and_then(|s| s.parse::<u64>().ok());
        return degrade(UINTEGER_CODE, parsed.map(Value::UnsignedInteger));
    }

    if let Some(payload) = map.get(BYTES_CODE) {
        let parsed = payload.as_str().and_then(|s| STANDARD.decode(s).ok());
        return degrade(BYTES_CODE, parsed.map(Value::Bytes));
    }

    if let Some(payload) = map.get(MAP_CODE) {
        let parsed = payload
            .as_list()
            .and_then(|entries| unpack_entries(entries, use_string_maps));
        return degrade(MAP_CODE, parsed);
    }

    None
}

fn unpack_entries(entries: &[Value], use_string_maps: bool) -> Option<Value> {
    let mut map = Map::with_capacity(entries.len());
    for entry in entries {
        let (key, value) = match entry {
            Value::StringMap(entry) => (entry.get("key")?, entry.get("value")?),
            Value::Map(entry) => (
                entry.get(&Value::string("key"))?,
                entry.get(&Value::string("value"))?,
            ),
            _ => return None,
        };
        map.insert(
            unpack(key.clone(), use_string_maps),
            unpack(value.clone(), use_string_maps),
        );
    }

    Some(if use_string_maps {
        Value::StringMap(stringify_keys(map))
    } else {
        Value::Map(map)
    })
}

fn degrade(code: &str, parsed: Option<Value>) -> Option<Value> {
    if parsed.is_none() {
        trace!(code, "malformed extended JSON annotation; treating as an ordinary map");
    }
    parsed
}
