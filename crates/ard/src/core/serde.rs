//! Serde serialization and deserialization for Value
//!
//! `Value` serializes through any serde format. Timestamps are written as a
//! newtype struct with a private name so the reflector can recognise them;
//! other serializers simply see their RFC 3339 text. Host values are
//! reflected with a default [`Reflector`] on the way out.

use std::fmt;

use chrono::DateTime;
use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::core::key::format_timestamp;
use crate::core::value::{List, Map, Value};
use crate::reflect::{Reflector, TIMESTAMP_TOKEN};

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Boolean(b) => serializer.serialize_bool(*b),
            Value::Integer(i) => serializer.serialize_i64(*i),
            Value::UnsignedInteger(u) => serializer.serialize_u64(*u),
            Value::Float(f) => serializer.serialize_f64(*f),
            Value::String(s) => serializer.serialize_str(s),
            Value::Bytes(b) => serializer.serialize_bytes(b),
            Value::Timestamp(t) => {
                serializer.serialize_newtype_struct(TIMESTAMP_TOKEN, &format_timestamp(t))
            }
            Value::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for element in list {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            Value::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::StringMap(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            Value::Host(host) => host
                .unpack(&Reflector::default(), false)
                .map_err(ser::Error::custom)?
                .serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("any ARD value")
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E> {
        Ok(Value::Boolean(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Value::Integer(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Value::UnsignedInteger(v))
    }

    fn visit_i128<E: de::Error>(self, v: i128) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(Value::Integer)
            .map_err(|_| E::custom(format!("integer {v} does not fit in 64 bits")))
    }

    fn visit_u128<E: de::Error>(self, v: u128) -> Result<Self::Value, E> {
        u64::try_from(v)
            .map(Value::UnsignedInteger)
            .map_err(|_| E::custom(format!("integer {v} does not fit in 64 bits")))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Value::Float(v))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E> {
        Ok(Value::String(v.to_owned()))
    }

    fn visit_string<E>(self, v: String) -> Result<Self::Value, E> {
        Ok(Value::String(v))
    }

    fn visit_bytes<E>(self, v: &[u8]) -> Result<Self::Value, E> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn visit_byte_buf<E>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        Ok(Value::Bytes(v))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_newtype_struct<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Value::deserialize(deserializer)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut list = List::with_capacity(seq.size_hint().unwrap_or(0).min(4096));
        while let Some(element) = seq.next_element()? {
            list.push(element);
        }
        Ok(Value::List(list))
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut map = Map::with_capacity(access.size_hint().unwrap_or(0).min(4096));

        let Some(first) = access.next_key::<Value>()? else {
            return Ok(Value::Map(map));
        };

        if first.as_str() == Some(TIMESTAMP_TOKEN) {
            let text: String = access.next_value()?;
            return DateTime::parse_from_rfc3339(&text)
                .map(Value::Timestamp)
                .map_err(|e| de::Error::custom(format!("invalid timestamp {text:?}: {e}")));
        }

        let value = access.next_value()?;
        map.insert(first, value);
        while let Some((key, value)) = access.next_entry()? {
            map.insert(key, value);
        }
        Ok(Value::Map(map))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::StringMap;

    #[test]
    fn test_serialize_to_json() {
        let mut map = StringMap::new();
        map.insert("name".to_owned(), Value::string("ard"));
        map.insert("count".to_owned(), Value::integer(3));
        map.insert("big".to_owned(), Value::unsigned_integer(u64::MAX));
        map.insert(
            "tags".to_owned(),
            Value::List(vec![Value::boolean(true), Value::Null]),
        );

        let json = serde_json::to_string(&Value::StringMap(map)).unwrap();
        assert_eq!(
            json,
            r#"{"name":"ard","count":3,"big":18446744073709551615,"tags":[true,null]}"#
        );
    }

    #[test]
    fn test_timestamp_serializes_as_text_elsewhere() {
        let t = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z").unwrap();
        let json = serde_json::to_string(&Value::Timestamp(t)).unwrap();
        assert_eq!(json, r#""2024-01-02T03:04:05Z""#);
    }

    #[test]
    fn test_deserialize_from_json() {
        let value: Value = serde_json::from_str(r#"{"a": [1, -2, 1.5, "x", null]}"#).unwrap();

        let list = value.get_key("a").and_then(Value::as_list).unwrap();
        assert_eq!(
            list,
            &vec![
                Value::UnsignedInteger(1),
                Value::Integer(-2),
                Value::Float(1.5),
                Value::string("x"),
                Value::Null,
            ]
        );
    }

    #[test]
    fn test_host_serializes_through_reflection() {
        let json = serde_json::to_string(&Value::host(vec![1u32, 2])).unwrap();
        assert_eq!(json, "[1,2]");
    }
}
