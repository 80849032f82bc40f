//! Canonical key stringification
//!
//! Turns any value into a deterministic string. It is used when a map is
//! converted to a string map, when struct fields are matched against map
//! keys, and whenever a scalar has to be read as a string.
//!
//! Values that compare equal always produce the same string: timestamps are
//! rendered in UTC and map entries are sorted.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{SecondsFormat, Utc};

use crate::core::value::{Timestamp, Value};

impl Value {
    /// Canonical string form of this value
    ///
    /// Strings are returned as they are; everything else is rendered.
    pub fn key_string(&self) -> Cow<'_, str> {
        match self {
            Self::String(s) => Cow::Borrowed(s),
            other => {
                let mut out = String::new();
                write_canonical(other, &mut out, false);
                Cow::Owned(out)
            }
        }
    }

    /// Owned canonical string form of this value
    pub fn to_canonical_string(&self) -> String {
        self.key_string().into_owned()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_string())
    }
}

/// Shortest round-trip float text, with YAML spellings for special values
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        ".nan".to_owned()
    } else if f.is_infinite() {
        if f > 0.0 { ".inf" } else { "-.inf" }.to_owned()
    } else {
        // Debug keeps a fractional part or exponent, so the text never
        // reads back as an integer
        format!("{f:?}")
    }
}

/// RFC 3339 text of a timestamp, keeping its offset
pub(crate) fn format_timestamp(t: &Timestamp) -> String {
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn write_canonical(value: &Value, out: &mut String, nested: bool) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Boolean(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Integer(i) => out.push_str(&i.to_string()),
        Value::UnsignedInteger(u) => out.push_str(&u.to_string()),
        Value::Float(f) => out.push_str(&format_float(*f)),
        Value::String(s) => {
            if nested {
                out.push_str(&format!("{s:?}"));
            } else {
                out.push_str(s);
            }
        }
        Value::Bytes(b) => out.push_str(&STANDARD.encode(b)),
        Value::Timestamp(t) => out.push_str(
            &t.with_timezone(&Utc)
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        ),
        Value::List(list) => {
            out.push('[');
            for (index, element) in list.iter().enumerate() {
                if index > 0 {
                    out.push_str(", ");
                }
                write_canonical(element, out, true);
            }
            out.push(']');
        }
        Value::Map(map) => write_entries(map.iter().map(|(k, v)| (Cow::Borrowed(k), v)), out),
        Value::StringMap(map) => write_entries(
            map.iter()
                .map(|(k, v)| (Cow::Owned(Value::String(k.clone())), v)),
            out,
        ),
        Value::Host(host) => {
            out.push('<');
            out.push_str(host.type_name());
            out.push('>');
        }
    }
}

fn write_entries<'a, I>(entries: I, out: &mut String)
where
    I: Iterator<Item = (Cow<'a, Value>, &'a Value)>,
{
    let mut rendered: Vec<String> = entries
        .map(|(key, value)| {
            let mut entry = String::new();
            write_canonical(&key, &mut entry, true);
            entry.push_str(": ");
            write_canonical(value, &mut entry, true);
            entry
        })
        .collect();
    rendered.sort();

    out.push('{');
    out.push_str(&rendered.join(", "));
    out.push('}');
}
