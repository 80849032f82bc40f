//! Integration test: end-to-end scenarios
//!
//! Each test is one small story through the public API.

use ard::codec::{self, Format, json, xjson};
use ard::ops::merge;
use ard::{Map, StringMap, Value};
use pretty_assertions::assert_eq;

fn string_map<const N: usize>(entries: [(&str, Value); N]) -> Value {
    Value::StringMap(
        entries
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect(),
    )
}

fn map<const N: usize>(entries: [(Value, Value); N]) -> Value {
    Value::Map(entries.into_iter().collect::<Map>())
}

#[test]
fn test_json_numbers_decode_as_floats() {
    let value = json::decode(br#"{"a": 1, "b": [1,2,3]}"#).unwrap();

    assert_eq!(
        value,
        string_map([
            ("a", Value::Float(1.0)),
            (
                "b",
                Value::List(vec![Value::Float(1.0), Value::Float(2.0), Value::Float(3.0)])
            ),
        ])
    );
}

#[test]
fn test_unsigned_integer_through_extended_json() {
    let encoded = xjson::encode(&Value::UnsignedInteger(120)).unwrap();
    assert_eq!(String::from_utf8(encoded.clone()).unwrap(), r#"{"$ard.uinteger":"120"}"#);

    assert_eq!(xjson::decode(&encoded).unwrap(), Value::UnsignedInteger(120));
}

#[test]
fn test_integer_keys_through_extended_json() {
    let original = map([
        (Value::Integer(1), Value::string("one")),
        (Value::Integer(2), Value::string("two")),
    ]);

    let packed = xjson::pack(&original);
    let Value::StringMap(wrapper) = &packed else {
        panic!("expected a string map, got {packed:?}");
    };
    assert_eq!(wrapper.keys().collect::<Vec<_>>(), ["$ard.map"]);
    assert_eq!(wrapper["$ard.map"].len(), Some(2));

    let text = xjson::encode(&original).unwrap();
    assert_eq!(xjson::decode(&text).unwrap(), original);
}

#[test]
fn test_merge_prefers_source_scalars() {
    let target = map([
        (Value::string("x"), Value::Integer(1)),
        (Value::string("y"), Value::Integer(2)),
    ]);
    let source = map([
        (Value::string("y"), Value::Integer(3)),
        (Value::string("z"), Value::Integer(4)),
    ]);

    assert_eq!(
        merge(target, &source, false),
        map([
            (Value::string("x"), Value::Integer(1)),
            (Value::string("y"), Value::Integer(3)),
            (Value::string("z"), Value::Integer(4)),
        ])
    );
}

#[test]
fn test_node_traversal() {
    let decoded = codec::decode(br#"{"first": {"property1": "Hello"}}"#, Format::Json, false).unwrap();
    let node = decoded.value.node();

    assert_eq!(node.get(["first", "property1"]).string().as_deref(), Some("Hello"));
    assert_eq!(node.get(["first", "missing"]).string(), None);
    assert_eq!(
        node.get(["first", "missing"]).nil_means_zero().string(),
        None,
        "a miss is not a null"
    );
}

#[test]
fn test_malformed_annotation_is_an_ordinary_map() {
    let mut annotated = StringMap::new();
    annotated.insert("$ard.integer".to_owned(), Value::string("not-a-number"));

    let unpacked = xjson::unpack(Value::StringMap(annotated), false);

    assert_eq!(
        unpacked,
        map([(Value::string("$ard.integer"), Value::string("not-a-number"))])
    );
}
