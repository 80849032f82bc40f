//! Integration test: one document across every format

use ard::codec::{self, EncodeOptions, Format, json};
use ard::ops::normalize_maps;
use ard::{ArdError, Location, Locator, Path, Reflector, Value};
use pretty_assertions::{assert_eq, assert_ne};
use rstest::rstest;
use serde::Serialize;

const CONFIG: &str = "\
name: gateway
port: 8080
ratio: 0.75
enabled: true
tags: [edge, public]
created: !!timestamp 2024-05-01T12:00:00Z
limits:
  burst: 20
  window: null
";

fn config() -> Value {
    codec::decode(CONFIG.as_bytes(), Format::Yaml, false)
        .unwrap()
        .value
}

#[test]
fn test_yaml_resolves_core_types() {
    let value = config();
    let node = value.node();

    assert_eq!(node.get(["port"]).integer(), Some(8080));
    assert_eq!(node.get(["ratio"]).float(), Some(0.75));
    assert_eq!(node.get(["enabled"]).boolean(), Some(true));
    assert!(node.get(["created"]).timestamp().is_some());
    assert!(node.get(["limits", "window"]).is_null());
    assert_eq!(
        node.get(["tags"]).string_list(),
        Some(vec!["edge".to_owned(), "public".to_owned()])
    );
}

#[rstest]
#[case(Format::Yaml)]
#[case(Format::Xml)]
#[case(Format::Cbor)]
#[case(Format::MessagePack)]
fn test_lossless_formats_round_trip(#[case] format: Format) {
    let value = config();
    let back = codec::roundtrip(&value, format, &Reflector::default()).unwrap();
    assert_eq!(back, value, "{format}");
}

#[test]
fn test_extended_json_keeps_numbers_but_not_timestamps() {
    let value = config();
    let back = codec::roundtrip(&value, Format::XJson, &Reflector::default()).unwrap();
    let node = back.node();

    assert_eq!(node.get(["port"]).value(), Some(&Value::Integer(8080)));
    assert_eq!(node.get(["limits", "burst"]).integer(), Some(20));
    assert_eq!(
        node.get(["created"]).string().as_deref(),
        Some("2024-05-01T12:00:00Z")
    );
}

#[test]
fn test_plain_json_is_lossy() {
    let value = config();
    let back = codec::roundtrip(&value, Format::Json, &Reflector::default()).unwrap();

    assert_eq!(back.node().get(["port"]).value(), Some(&Value::Float(8080.0)));
    assert_eq!(back.node().get(["port"]).convert_similar().integer(), Some(8080));
}

#[test]
fn test_binary_formats_travel_as_base64_text() {
    let value = config();
    let reflector = Reflector::default();

    for format in [Format::Cbor, Format::MessagePack] {
        let text = codec::encode_text(&value, format, &reflector, &EncodeOptions::default()).unwrap();
        assert!(text.is_ascii(), "{format}");
        assert_eq!(codec::decode_text(&text, format, false).unwrap().value, value);
    }
}

#[test]
fn test_yaml_locator_through_the_facade() {
    let decoded = codec::decode(CONFIG.as_bytes(), Format::Yaml, true).unwrap();
    let locator = decoded.locator.unwrap();

    let path: Path = "limits.burst".parse().unwrap();
    assert_eq!(locator.locate(path.elements()), Some(Location { line: 8, column: 3 }));

    let path: Path = "tags[1]".parse().unwrap();
    assert_eq!(locator.locate(path.elements()).map(|l| l.line), Some(5));

    let json = codec::decode(b"{}", Format::Json, true).unwrap();
    assert!(json.locator.is_none());
}

#[test]
fn test_map_variants_are_not_equal() {
    let string_map = json::decode(br#"{"a": "b"}"#).unwrap();
    let map = codec::decode(br#"{"a": "b"}"#, Format::Json, false).unwrap().value;

    assert!(matches!(string_map, Value::StringMap(_)));
    assert!(matches!(map, Value::Map(_)));
    assert_ne!(string_map, map);

    let (normalized, changed) = normalize_maps(string_map);
    assert!(changed);
    assert_eq!(normalized, map);
}

#[test]
fn test_host_values_are_reflected_before_encoding() {
    #[derive(Serialize)]
    struct Upstream {
        host: &'static str,
        weight: u8,
    }

    let mut value = config();
    let Value::Map(map) = &mut value else {
        panic!("expected a map");
    };
    map.insert(
        Value::string("upstream"),
        Value::host(Upstream {
            host: "10.0.0.1",
            weight: 3,
        }),
    );

    let back = codec::roundtrip(&value, Format::Cbor, &Reflector::default()).unwrap();
    let upstream = back.node().get(["upstream"]);
    assert_eq!(upstream.get(["host"]).string().as_deref(), Some("10.0.0.1"));
    assert_eq!(upstream.get(["weight"]).unsigned_integer(), Some(3));
}

#[rstest]
#[case(Format::Yaml, "a: [1, 2")]
#[case(Format::Json, "{")]
#[case(Format::XJson, "[1,")]
#[case(Format::Xml, "<list><int>1</int>")]
fn test_malformed_input(#[case] format: Format, #[case] input: &str) {
    let error = codec::decode(input.as_bytes(), format, false).unwrap_err();
    assert!(error.is_decode(), "{format}: {error}");
    assert!(codec::validate(input.as_bytes(), format).is_err());
}

#[test]
fn test_format_names() {
    for format in Format::ALL {
        assert_eq!(format.to_string().parse::<Format>().unwrap(), format);
    }
    assert_eq!("messagepack".parse::<Format>().unwrap(), Format::MessagePack);
    assert!(matches!(
        "toml".parse::<Format>(),
        Err(ArdError::UnsupportedFormat { .. })
    ));
}
