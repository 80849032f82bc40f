//! Integration test: host types through the reflector and the codecs

use std::collections::{BTreeMap, HashMap};

use ard::codec::{self, EncodeOptions, Format};
use ard::{ArdError, Reflector, Value};
use chrono::{DateTime, FixedOffset};
use pretty_assertions::assert_eq;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Widths {
    a: i8,
    b: i16,
    c: i32,
    d: i64,
    e: u8,
    f: u16,
    g: u32,
    h: u64,
    ratio: f32,
    scale: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Backend {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    weight: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Service {
    name: String,
    widths: Widths,
    backends: Vec<Backend>,
    labels: HashMap<String, String>,
    codes: BTreeMap<i32, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    aliases: Vec<String>,
    #[serde(with = "ard::reflect::timestamp")]
    deployed: DateTime<FixedOffset>,
}

fn service() -> Service {
    Service {
        name: "checkout".to_owned(),
        widths: Widths {
            a: i8::MIN,
            b: -300,
            c: 70_000,
            d: i64::MAX,
            e: u8::MAX,
            f: 8080,
            g: u32::MAX,
            h: u64::MAX,
            ratio: 0.5,
            scale: -1.25,
        },
        backends: vec![
            Backend {
                name: "a".to_owned(),
                weight: Some(3),
            },
            Backend {
                name: "b".to_owned(),
                weight: None,
            },
        ],
        labels: HashMap::from([("team".to_owned(), "payments".to_owned())]),
        codes: BTreeMap::from([(404, "missing".to_owned()), (500, "broken".to_owned())]),
        aliases: Vec::new(),
        deployed: DateTime::parse_from_rfc3339("2024-05-01T12:00:00+02:00").unwrap(),
    }
}

#[test]
fn test_unpack_then_pack_is_identity() {
    let reflector = Reflector::new();
    let value = reflector.unpack(&service()).unwrap();
    let back: Service = reflector.pack(&value).unwrap();
    assert_eq!(back, service());
}

#[test]
fn test_unpacked_shape() {
    let value = Reflector::new().unpack(&service()).unwrap();
    let node = value.node();

    assert_eq!(node.get(["widths", "a"]).value(), Some(&Value::Integer(-128)));
    assert_eq!(node.get(["widths", "h"]).unsigned_integer(), Some(u64::MAX));
    assert_eq!(node.get(["widths", "ratio"]).float(), Some(0.5));
    assert!(node.get(["deployed"]).timestamp().is_some());
    assert_eq!(node.get(["codes"]).map().unwrap().get(&Value::Integer(404)), Some(&Value::string("missing")));

    let backends = node.get(["backends"]);
    assert_eq!(backends.list_get(0).get(["weight"]).unsigned_integer(), Some(3));
    assert!(backends.list_get(1).get(["weight"]).is_missing(), "omitted when empty");
    assert!(node.get(["aliases"]).is_missing(), "omitted when empty");
}

#[test]
fn test_service_survives_cbor_and_yaml() {
    let reflector = Reflector::new();
    let value = reflector.unpack(&service()).unwrap();

    for format in [Format::Cbor, Format::Yaml, Format::Xml, Format::MessagePack] {
        let bytes = codec::encode(&value, format, &reflector, &EncodeOptions::default()).unwrap();
        let decoded = codec::decode(&bytes, format, false).unwrap().value;
        let back: Service = reflector.pack(&decoded).unwrap();
        assert_eq!(back, service(), "{format}");
    }
}

#[test]
fn test_pack_from_yaml_configuration() {
    #[derive(Debug, PartialEq, Deserialize)]
    struct Limits {
        burst: u16,
        window: Option<String>,
    }

    let yaml = b"burst: 20\nwindow: ~\n";
    let value = codec::decode(yaml, Format::Yaml, false).unwrap().value;
    let limits: Limits = Reflector::new().pack(&value).unwrap();

    assert_eq!(
        limits,
        Limits {
            burst: 20,
            window: None,
        }
    );
}

#[test]
fn test_unknown_fields() {
    #[derive(Debug, Deserialize)]
    struct Strict {
        #[allow(dead_code)]
        name: String,
    }

    let value = codec::decode(b"name: x\nextra: 1\n", Format::Yaml, false)
        .unwrap()
        .value;

    let error = Reflector::new().pack::<Strict>(&value).unwrap_err();
    assert!(matches!(error, ArdError::Reflect { .. }), "{error}");

    let lenient = Reflector::new().ignore_missing_struct_fields(true);
    assert!(lenient.pack::<Strict>(&value).is_ok());
}

#[test]
fn test_out_of_range_numbers_are_errors() {
    let value = codec::decode(b"port: 70000\n", Format::Yaml, false)
        .unwrap()
        .value;

    #[derive(Debug, Deserialize)]
    struct Port {
        #[allow(dead_code)]
        port: u16,
    }

    let error = Reflector::new().pack::<Port>(&value).unwrap_err();
    assert!(error.to_string().starts_with("port"), "{error}");
}
