//! Serde adapter that keeps `chrono` timestamps as ARD timestamps
//!
//! Plain `chrono` serialization produces strings. Annotate a field with
//! `#[serde(with = "ard::reflect::timestamp")]` and the reflector will
//! produce [`Value::Timestamp`](crate::Value::Timestamp) instead; other
//! serializers still see RFC 3339 text.

use chrono::{DateTime, FixedOffset, TimeZone};
use serde::{Deserialize, Deserializer, Serializer, de};

use crate::core::key::format_timestamp;
use crate::reflect::TIMESTAMP_TOKEN;

/// Serialize a timestamp
///
/// # Errors
///
/// Only the serializer's own errors.
pub fn serialize<Tz, S>(value: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error>
where
    Tz: TimeZone,
    S: Serializer,
{
    serializer.serialize_newtype_struct(TIMESTAMP_TOKEN, &format_timestamp(&value.fixed_offset()))
}

/// Deserialize a timestamp, keeping its offset
///
/// # Errors
///
/// Fails when the input is not RFC 3339 text.
pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&text)
        .map_err(|e| de::Error::custom(format!("invalid timestamp {text:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::core::Value;
    use crate::reflect::Reflector;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Event {
        #[serde(with = "crate::reflect::timestamp")]
        at: DateTime<FixedOffset>,
    }

    #[test]
    fn test_timestamp_field_becomes_timestamp() {
        let at = DateTime::parse_from_rfc3339("2023-03-04T05:06:07.5-07:00").unwrap();
        let reflector = Reflector::default();

        let value = reflector.unpack(&Event { at }).unwrap();
        assert_eq!(value.get_key("at"), Some(&Value::Timestamp(at)));

        let back: Event = reflector.pack(&value).unwrap();
        assert_eq!(back.at, at);
        assert_eq!(back.at.offset(), at.offset());
    }

    #[test]
    fn test_other_serializers_see_text() {
        let at = DateTime::parse_from_rfc3339("2023-03-04T05:06:07Z").unwrap();
        let json = serde_json::to_string(&Event { at }).unwrap();
        assert_eq!(json, r#"{"at":"2023-03-04T05:06:07Z"}"#);
    }
}
