//! YAML
//!
//! Decoding composes a position-annotated node tree from the yaml-rust2
//! event stream and converts it to ARD:
//!
//! - plain scalars resolve with the YAML 1.2 core schema (null, bool, int,
//!   float, otherwise string); quoted scalars are always strings
//! - explicit core tags (`!!str`, `!!int`, `!!float`, `!!bool`, `!!null`,
//!   `!!binary`, `!!timestamp`) override resolution; other tags are ignored
//! - anchors, aliases and the merge key `<<` are supported
//! - duplicate keys in one mapping are an error
//! - every mapping becomes a [`Value::Map`], so complex keys survive
//!
//! ```rust
//! use ard::Value;
//! use ard::codec::yaml;
//!
//! let value = yaml::decode_str("defaults: &d {retries: 3}\njob:\n  <<: *d\n  name: sync\n").unwrap();
//! let job = value.get_key("job").unwrap();
//! assert_eq!(job.get_key("retries"), Some(&Value::Integer(3)));
//! ```

mod compose;
mod emit;
mod locator;

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use tracing::trace;

use crate::codec::{EncodeOptions, Format, MAX_DEPTH, utf8};
use crate::core::{List, Map, Timestamp, Value};
use crate::error::{ArdError, ArdResult};

use compose::{NodeKind, NodeTag, YamlNode};

pub use locator::YamlLocator;

/// Most nodes a single document may expand to through aliases
const MAX_EXPANDED_NODES: usize = 1 << 20;

/// Decode the first document; an empty stream is null
///
/// # Errors
///
/// Returns a decode error with line and column for malformed input,
/// duplicate keys, invalid tagged scalars and bad merge keys.
pub fn decode(bytes: &[u8]) -> ArdResult<Value> {
    decode_str(utf8(bytes, Format::Yaml)?)
}

/// Decode the first document from text
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_str(text: &str) -> ArdResult<Value> {
    match compose::compose(text)?.first() {
        Some(root) => Converter::default().value(root),
        None => Ok(Value::Null),
    }
}

/// Decode every document into a list
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_all(bytes: &[u8]) -> ArdResult<Value> {
    let text = utf8(bytes, Format::Yaml)?;
    let documents = compose::compose(text)?
        .iter()
        .map(|root| Converter::default().value(root))
        .collect::<ArdResult<List>>()?;
    Ok(Value::List(documents))
}

/// Decode the first document and keep its source positions
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_with_locator(bytes: &[u8]) -> ArdResult<(Value, YamlLocator)> {
    let text = utf8(bytes, Format::Yaml)?;
    let root = compose::compose(text)?.into_iter().next();
    let value = match &root {
        Some(root) => Converter::default().value(root)?,
        None => Value::Null,
    };
    Ok((value, YamlLocator::new(root)))
}

/// Encode with default options
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode(value: &Value) -> ArdResult<String> {
    encode_with(value, &EncodeOptions::default())
}

/// Encode in block style; `options.verbose` writes a tag on every node
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode_with(value: &Value, options: &EncodeOptions) -> ArdResult<String> {
    emit::emit(value, options.verbose)
}

/// Check syntax by running the parser without composing
///
/// # Errors
///
/// Returns a decode error with line and column for the first problem.
pub fn validate(bytes: &[u8]) -> ArdResult<()> {
    compose::scan(utf8(bytes, Format::Yaml)?)
}

// ==================== Conversion ====================

/// Node tree to value, bounding depth and alias expansion
#[derive(Default)]
struct Converter {
    expanded: usize,
    depth: usize,
}

fn error_at(node: &YamlNode, message: impl std::fmt::Display) -> ArdError {
    ArdError::decode(Format::Yaml, format!("{message} at {}", node.location))
}

impl Converter {
    fn value(&mut self, node: &Arc<YamlNode>) -> ArdResult<Value> {
        self.expanded += 1;
        if self.expanded > MAX_EXPANDED_NODES {
            return Err(error_at(node, "document expands to too many nodes"));
        }
        if self.depth >= MAX_DEPTH {
            return Err(error_at(node, "nesting too deep"));
        }

        self.depth += 1;
        let result = match &node.kind {
            NodeKind::Scalar { text, plain } => scalar(node, text, *plain),
            NodeKind::Sequence(items) => items
                .iter()
                .map(|item| self.value(item))
                .collect::<ArdResult<List>>()
                .map(Value::List),
            NodeKind::Mapping(entries) => self.mapping(entries),
        };
        self.depth -= 1;
        result
    }

    fn mapping(&mut self, entries: &[(Arc<YamlNode>, Arc<YamlNode>)]) -> ArdResult<Value> {
        let mut map = Map::with_capacity(entries.len());
        let mut merges = Vec::new();

        for (key_node, value_node) in entries {
            if key_node.is_merge_key() {
                merges.push(value_node);
                continue;
            }

            let key = self.value(key_node)?;
            if map.contains_key(&key) {
                return Err(error_at(key_node, format!("duplicate mapping key {key}")));
            }
            let value = self.value(value_node)?;
            map.insert(key, value);
        }

        // explicit keys win over merged ones, earlier merge sources over later
        for source in merges {
            match self.value(source)? {
                Value::Map(merged) => merge_missing(&mut map, merged),
                Value::List(list) => {
                    for item in list {
                        match item {
                            Value::Map(merged) => merge_missing(&mut map, merged),
                            _ => {
                                return Err(error_at(
                                    source,
                                    "merge key list must contain only mappings",
                                ));
                            }
                        }
                    }
                }
                _ => {
                    return Err(error_at(
                        source,
                        "merge key value must be a mapping or a list of mappings",
                    ));
                }
            }
        }

        Ok(Value::Map(map))
    }
}

fn merge_missing(map: &mut Map, merged: Map) {
    for (key, value) in merged {
        map.entry(key).or_insert(value);
    }
}

fn scalar(node: &YamlNode, text: &str, plain: bool) -> ArdResult<Value> {
    match &node.tag {
        Some(NodeTag::Core(suffix)) => match suffix.as_str() {
            "str" => Ok(Value::String(text.to_owned())),
            "null" => Ok(Value::Null),
            "bool" => resolve_bool(text)
                .map(Value::Boolean)
                .ok_or_else(|| error_at(node, format!("invalid !!bool {text:?}"))),
            "int" => resolve_int(text.trim())
                .ok_or_else(|| error_at(node, format!("invalid !!int {text:?}"))),
            "float" => resolve_float(text.trim())
                .or_else(|| resolve_int(text.trim()).and_then(|v| to_float(&v)))
                .ok_or_else(|| error_at(node, format!("invalid !!float {text:?}"))),
            "binary" => {
                let compact = text.split_whitespace().collect::<String>();
                STANDARD
                    .decode(compact)
                    .map(Value::Bytes)
                    .map_err(|e| error_at(node, format!("invalid !!binary: {e}")))
            }
            "timestamp" => parse_timestamp(text.trim())
                .map(Value::Timestamp)
                .ok_or_else(|| error_at(node, format!("invalid !!timestamp {text:?}"))),
            other => {
                trace!(tag = other, location = %node.location, "ignoring unsupported core tag");
                Ok(untagged(text, plain))
            }
        },
        Some(NodeTag::Other(tag)) => {
            trace!(tag = %tag, location = %node.location, "ignoring YAML tag");
            Ok(untagged(text, plain))
        }
        None => Ok(untagged(text, plain)),
    }
}

fn untagged(text: &str, plain: bool) -> Value {
    if plain {
        resolve_plain(text)
    } else {
        Value::String(text.to_owned())
    }
}

fn to_float(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Float(*i as f64)),
        Value::UnsignedInteger(u) => Some(Value::Float(*u as f64)),
        _ => None,
    }
}

// ==================== Core schema ====================

/// Resolve a plain scalar with the YAML 1.2 core schema
pub(crate) fn resolve_plain(text: &str) -> Value {
    if matches!(text, "" | "~" | "null" | "Null" | "NULL") {
        return Value::Null;
    }
    if let Some(b) = resolve_bool(text) {
        return Value::Boolean(b);
    }
    if let Some(n) = resolve_int(text) {
        return n;
    }
    if let Some(f) = resolve_float(text) {
        return f;
    }
    Value::String(text.to_owned())
}

fn resolve_bool(text: &str) -> Option<bool> {
    match text {
        "true" | "True" | "TRUE" => Some(true),
        "false" | "False" | "FALSE" => Some(false),
        _ => None,
    }
}

fn resolve_int(text: &str) -> Option<Value> {
    let radix = |digits: &str, radix: u32| {
        u64::from_str_radix(digits, radix)
            .ok()
            .map(|u| i64::try_from(u).map_or(Value::UnsignedInteger(u), Value::Integer))
    };

    if let Some(hex) = text.strip_prefix("0x") {
        return (!hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()))
            .then(|| radix(hex, 16))
            .flatten();
    }
    if let Some(octal) = text.strip_prefix("0o") {
        return (!octal.is_empty() && octal.bytes().all(|b| (b'0'..=b'7').contains(&b)))
            .then(|| radix(octal, 8))
            .flatten();
    }
    if let Some(binary) = text.strip_prefix("0b") {
        return (!binary.is_empty() && binary.bytes().all(|b| b == b'0' || b == b'1'))
            .then(|| radix(binary, 2))
            .flatten();
    }

    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    if let Ok(i) = text.parse::<i64>() {
        return Some(Value::Integer(i));
    }
    if !text.starts_with('-')
        && let Ok(u) = digits.parse::<u64>()
    {
        return Some(Value::UnsignedInteger(u));
    }
    // out of range for every integer type
    text.parse::<f64>().ok().map(Value::Float)
}

fn resolve_float(text: &str) -> Option<Value> {
    match text {
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return Some(Value::Float(f64::INFINITY));
        }
        "-.inf" | "-.Inf" | "-.INF" => return Some(Value::Float(f64::NEG_INFINITY)),
        ".nan" | ".NaN" | ".NAN" => return Some(Value::Float(f64::NAN)),
        _ => {}
    }

    let unsigned = text.strip_prefix(['-', '+']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };

    let (whole, fraction) = match mantissa.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (mantissa, None),
    };
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    let mantissa_ok = match fraction {
        Some(fraction) => {
            all_digits(whole) && all_digits(fraction) && !(whole.is_empty() && fraction.is_empty())
        }
        None => !whole.is_empty() && all_digits(whole),
    };
    let exponent_ok = exponent.is_none_or(|e| {
        let digits = e.strip_prefix(['-', '+']).unwrap_or(e);
        !digits.is_empty() && all_digits(digits)
    });

    if mantissa_ok && exponent_ok {
        text.parse::<f64>().ok().map(Value::Float)
    } else {
        None
    }
}

/// RFC 3339, the YAML space-separated form, or a bare date at midnight UTC
fn parse_timestamp(text: &str) -> Option<Timestamp> {
    if let Ok(t) = DateTime::parse_from_rfc3339(text) {
        return Some(t);
    }

    let normalized = text.replacen(' ', "T", 1).replace(' ', "");
    if let Ok(t) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(t);
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc().fixed_offset());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc().fixed_offset())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    fn map(entries: Vec<(Value, Value)>) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    #[rstest]
    #[case("~", Value::Null)]
    #[case("", Value::Null)]
    #[case("NULL", Value::Null)]
    #[case("True", Value::Boolean(true))]
    #[case("FALSE", Value::Boolean(false))]
    #[case("yes", Value::string("yes"))]
    #[case("-42", Value::Integer(-42))]
    #[case("+7", Value::Integer(7))]
    #[case("0x1F", Value::Integer(31))]
    #[case("0o17", Value::Integer(15))]
    #[case("0b101", Value::Integer(5))]
    #[case("18446744073709551615", Value::UnsignedInteger(u64::MAX))]
    #[case("0xFFFFFFFFFFFFFFFF", Value::UnsignedInteger(u64::MAX))]
    #[case("1.5", Value::Float(1.5))]
    #[case(".5", Value::Float(0.5))]
    #[case("1e3", Value::Float(1000.0))]
    #[case("-.inf", Value::Float(f64::NEG_INFINITY))]
    #[case(".NaN", Value::Float(f64::NAN))]
    #[case("1.2.3", Value::string("1.2.3"))]
    #[case("0x", Value::string("0x"))]
    #[case("e5", Value::string("e5"))]
    #[case(".", Value::string("."))]
    fn test_core_schema(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(resolve_plain(text), expected);
    }

    #[test]
    fn test_quoted_scalars_are_strings() {
        let value = decode_str("a: \"1\"\nb: 'true'\nc: 1\n").unwrap();
        assert_eq!(
            value,
            map(vec![
                (Value::string("a"), Value::string("1")),
                (Value::string("b"), Value::string("true")),
                (Value::string("c"), Value::Integer(1)),
            ])
        );
    }

    #[rstest]
    #[case("!!str 5", Value::string("5"))]
    #[case("!!int \"5\"", Value::Integer(5))]
    #[case("!!float 5", Value::Float(5.0))]
    #[case("!!bool \"true\"", Value::Boolean(true))]
    #[case("!!null \"\"", Value::Null)]
    #[case("!!binary \"AQID\"", Value::Bytes(vec![1, 2, 3]))]
    #[case("!custom 5", Value::Integer(5))]
    fn test_tags(#[case] text: &str, #[case] expected: Value) {
        assert_eq!(decode_str(text).unwrap(), expected);
    }

    #[rstest]
    #[case("2001-12-14t21:59:43.10-05:00", "2001-12-14T21:59:43.10-05:00")]
    #[case("2001-12-14 21:59:43.10 -05:00", "2001-12-14T21:59:43.10-05:00")]
    #[case("2001-12-15 2:59:43.10", "2001-12-15T02:59:43.10Z")]
    #[case("2002-12-14", "2002-12-14T00:00:00Z")]
    fn test_timestamps(#[case] text: &str, #[case] expected: &str) {
        let value = decode_str(&format!("!!timestamp {text}")).unwrap();
        let expected = DateTime::parse_from_rfc3339(expected).unwrap();
        assert_eq!(value, Value::Timestamp(expected));
    }

    #[test]
    fn test_invalid_tagged_scalar() {
        let error = decode_str("a: !!int abc\n").unwrap_err();
        assert!(error.to_string().contains("invalid !!int"), "{error}");
        assert!(error.to_string().contains(" at 1:"), "{error}");
    }

    #[test]
    fn test_merge_keys() {
        let text = "\
base: &base
  a: 1
  b: 2
more: &more
  c: 3
derived:
  <<: [*base, *more]
  b: 20
";
        let value = decode_str(text).unwrap();
        assert_eq!(
            value.get_key("derived"),
            Some(&map(vec![
                (Value::string("b"), Value::Integer(20)),
                (Value::string("a"), Value::Integer(1)),
                (Value::string("c"), Value::Integer(3)),
            ]))
        );
    }

    #[test]
    fn test_bad_merge_value() {
        let error = decode_str("a:\n  <<: 5\n").unwrap_err();
        assert!(error.to_string().contains("merge key"), "{error}");
    }

    #[test]
    fn test_duplicate_keys() {
        let error = decode_str("a: 1\nb: 2\na: 3\n").unwrap_err();
        assert!(error.is_decode());
        assert!(error.to_string().contains("duplicate mapping key a"), "{error}");
    }

    #[test]
    fn test_complex_keys() {
        let value = decode_str("? [1, 2]\n: pair\n? {x: 1}\n: map\n").unwrap();
        let key = Value::List(vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(value.get(&key), Some(&Value::string("pair")));
        let key = map(vec![(Value::string("x"), Value::Integer(1))]);
        assert_eq!(value.get(&key), Some(&Value::string("map")));
    }

    #[test]
    fn test_documents() {
        assert_eq!(decode(b"").unwrap(), Value::Null);
        assert_eq!(decode(b"--- 1\n--- 2\n").unwrap(), Value::Integer(1));
        assert_eq!(
            decode_all(b"--- 1\n--- [a]\n").unwrap(),
            Value::List(vec![Value::Integer(1), Value::List(vec![Value::string("a")])])
        );
    }

    #[test]
    fn test_alias_expansion_is_bounded() {
        let mut text = String::from("a0: &a0 [x, x, x, x, x, x, x, x]\n");
        for i in 1..10 {
            let prev = i - 1;
            text.push_str(&format!(
                "a{i}: &a{i} [*a{prev}, *a{prev}, *a{prev}, *a{prev}, *a{prev}, *a{prev}, *a{prev}, *a{prev}]\n"
            ));
        }
        let error = decode_str(&text).unwrap_err();
        assert!(error.to_string().contains("too many nodes"), "{error}");
    }

    #[test]
    fn test_malformed_input_has_position() {
        let error = decode(b"a: [1, 2\nb: 3\n").unwrap_err();
        assert!(error.is_decode());
        assert!(error.to_string().contains("line"), "{error}");
    }
}
