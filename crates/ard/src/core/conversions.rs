//! Type conversions for Value
//!
//! `From` implementations widen native numbers to their 64-bit
//! representative; `TryFrom` extracts native types from exactly matching
//! variants.

use chrono::{DateTime, FixedOffset, TimeZone};

use crate::core::value::{List, Map, StringMap, Value};
use crate::error::ArdError;

// ==================== From<T> for Value ====================

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

macro_rules! from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Integer(v as i64)
            }
        })*
    };
}

macro_rules! from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::UnsignedInteger(v as u64)
            }
        })*
    };
}

from_signed!(i8, i16, i32, i64, isize);
from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Bytes(v.to_vec())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Self::Timestamp(v.fixed_offset())
    }
}

impl From<List> for Value {
    fn from(v: List) -> Self {
        Self::List(v)
    }
}

impl From<Map> for Value {
    fn from(v: Map) -> Self {
        Self::Map(v)
    }
}

impl From<StringMap> for Value {
    fn from(v: StringMap) -> Self {
        Self::StringMap(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl FromIterator<Value> for Value {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::List(iter.into_iter().collect())
    }
}

impl FromIterator<(Value, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (Value, Value)>>(iter: I) -> Self {
        Self::Map(iter.into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for Value {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self::StringMap(iter.into_iter().collect())
    }
}

// ==================== TryFrom<&Value> for primitives ====================

fn mismatch(expected: &str, value: &Value) -> ArdError {
    ArdError::reflect(format!(
        "expected {expected}, found {}",
        value.variant_name()
    ))
}

impl TryFrom<&Value> for bool {
    type Error = ArdError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_bool().ok_or_else(|| mismatch("boolean", value))
    }
}

impl TryFrom<&Value> for i64 {
    type Error = ArdError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::Integer(i) => Ok(*i),
            Value::UnsignedInteger(u) => {
                Self::try_from(*u).map_err(|_| ArdError::reflect(format!("{u} overflows i64")))
            }
            _ => Err(mismatch("integer", value)),
        }
    }
}

impl TryFrom<&Value> for u64 {
    type Error = ArdError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        match value {
            Value::UnsignedInteger(u) => Ok(*u),
            Value::Integer(i) => {
                Self::try_from(*i).map_err(|_| ArdError::reflect(format!("{i} is negative")))
            }
            _ => Err(mismatch("unsigned integer", value)),
        }
    }
}

impl TryFrom<&Value> for f64 {
    type Error = ArdError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value.as_f64().ok_or_else(|| mismatch("float", value))
    }
}

impl TryFrom<&Value> for String {
    type Error = ArdError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| mismatch("string", value))
    }
}

impl TryFrom<&Value> for DateTime<FixedOffset> {
    type Error = ArdError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        value
            .as_timestamp()
            .copied()
            .ok_or_else(|| mismatch("timestamp", value))
    }
}

// ==================== Literals ====================

/// Parse a boolean literal
///
/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}
