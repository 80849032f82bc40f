//! Type classification
//!
//! [`TypeName`] is the canonical classification of a [`Value`]. Each name is
//! paired with a predicate in [`TYPE_VALIDATORS`]; classification walks that
//! table, so a new type is added by adding a row rather than touching call
//! sites.
//!
//! ```rust
//! use ard::{TypeName, Value};
//!
//! assert_eq!(Value::from(3u8).type_name(), TypeName::Integer);
//! assert_eq!(TypeName::Integer.to_string(), "ard.integer");
//! assert_eq!(TypeName::List.zero(), Value::list_empty());
//! ```

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::core::value::{Timestamp, Value};
use crate::error::ArdError;

/// Canonical type name of a value
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TypeName {
    Map,
    List,
    String,
    Boolean,
    Integer,
    Float,
    Null,
    Bytes,
    Timestamp,
    /// A host value that has not been reflected; carries the host type name
    Unknown(&'static str),
}

/// Predicate deciding whether a value belongs to a type
pub type TypeValidator = fn(&Value) -> bool;

/// Registry of type predicates, consulted in order
pub static TYPE_VALIDATORS: &[(TypeName, TypeValidator)] = &[
    (TypeName::Map, Value::is_any_map),
    (TypeName::List, Value::is_list),
    (TypeName::String, Value::is_string),
    (TypeName::Boolean, Value::is_boolean),
    (TypeName::Integer, Value::is_integer),
    (TypeName::Float, Value::is_float),
    (TypeName::Null, Value::is_null),
    (TypeName::Bytes, Value::is_bytes),
    (TypeName::Timestamp, Value::is_timestamp),
];

/// Seconds from the Unix epoch to 0001-01-01T00:00:00Z
const ZERO_TIMESTAMP_SECONDS: i64 = -62_135_596_800;

/// The zero timestamp: 0001-01-01T00:00:00Z
pub fn zero_timestamp() -> Timestamp {
    DateTime::<Utc>::from_timestamp(ZERO_TIMESTAMP_SECONDS, 0)
        .unwrap_or_default()
        .fixed_offset()
}

impl TypeName {
    /// All registered (known) type names
    pub fn all() -> impl Iterator<Item = Self> {
        TYPE_VALIDATORS.iter().map(|(name, _)| *name)
    }

    /// Classify a value
    pub fn of(value: &Value) -> Self {
        if let Value::Host(host) = value {
            return Self::Unknown(host.type_name());
        }

        TYPE_VALIDATORS
            .iter()
            .find(|(_, validator)| validator(value))
            .map(|(name, _)| *name)
            .unwrap_or(Self::Unknown("unknown"))
    }

    /// The registered predicate for this type
    ///
    /// `Unknown` has no predicate.
    pub fn validator(self) -> Option<TypeValidator> {
        TYPE_VALIDATORS
            .iter()
            .find(|(name, _)| *name == self)
            .map(|(_, validator)| *validator)
    }

    /// Check whether a value belongs to this type
    pub fn validate(self, value: &Value) -> bool {
        self.validator().is_some_and(|validator| validator(value))
    }

    /// Zero value of this type
    pub fn zero(self) -> Value {
        match self {
            Self::Map => Value::map_empty(),
            Self::List => Value::list_empty(),
            Self::String => Value::string(""),
            Self::Boolean => Value::Boolean(false),
            Self::Integer => Value::Integer(0),
            Self::Float => Value::Float(0.0),
            Self::Bytes => Value::Bytes(Vec::new()),
            Self::Timestamp => Value::Timestamp(zero_timestamp()),
            Self::Null | Self::Unknown(_) => Value::Null,
        }
    }

    /// Canonical name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Map => "ard.map",
            Self::List => "ard.list",
            Self::String => "ard.string",
            Self::Boolean => "ard.boolean",
            Self::Integer => "ard.integer",
            Self::Float => "ard.float",
            Self::Null => "ard.null",
            Self::Bytes => "ard.bytes",
            Self::Timestamp => "ard.timestamp",
            Self::Unknown(name) => name,
        }
    }

    /// Check if this is a known ARD type
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl Display for TypeName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TypeName {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .find(|name| name.name() == s)
            .ok_or_else(|| ArdError::reflect(format!("unknown type name: {s:?}")))
    }
}

impl Value {
    /// Canonical type name of this value
    pub fn type_name(&self) -> TypeName {
        TypeName::of(self)
    }

    /// Check if this value is the zero value of its type
    ///
    /// Containers are zero when empty.
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Boolean(b) => !b,
            Self::Integer(i) => *i == 0,
            Self::UnsignedInteger(u) => *u == 0,
            Self::Float(f) => *f == 0.0,
            Self::String(s) => s.is_empty(),
            Self::Bytes(b) => b.is_empty(),
            Self::Timestamp(t) => *t == zero_timestamp(),
            Self::List(l) => l.is_empty(),
            Self::Map(m) => m.is_empty(),
            Self::StringMap(m) => m.is_empty(),
            Self::Host(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::StringMap;

    #[test]
    fn test_classification() {
        assert_eq!(Value::null().type_name(), TypeName::Null);
        assert_eq!(Value::integer(-1).type_name(), TypeName::Integer);
        assert_eq!(Value::unsigned_integer(1).type_name(), TypeName::Integer);
        assert_eq!(Value::float(1.5).type_name(), TypeName::Float);
        assert_eq!(Value::string("s").type_name(), TypeName::String);
        assert_eq!(Value::bytes(vec![1]).type_name(), TypeName::Bytes);
        assert_eq!(
            Value::Timestamp(zero_timestamp()).type_name(),
            TypeName::Timestamp
        );
        assert_eq!(Value::list_empty().type_name(), TypeName::List);
        assert_eq!(Value::map_empty().type_name(), TypeName::Map);
        assert_eq!(
            Value::StringMap(StringMap::new()).type_name(),
            TypeName::Map
        );
    }

    #[test]
    fn test_host_is_unknown() {
        let name = Value::host(vec![1u16]).type_name();
        assert!(!name.is_known());
        assert!(name.name().contains("Vec"));
    }

    #[test]
    fn test_zero_values_validate() {
        for name in TypeName::all() {
            assert!(name.validate(&name.zero()), "{name} zero");
            assert!(name.zero().is_zero(), "{name} zero is zero");
        }
    }

    #[test]
    fn test_zero_timestamp() {
        assert_eq!(
            zero_timestamp().to_rfc3339(),
            "0001-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_name_round_trip() {
        for name in TypeName::all() {
            assert_eq!(name.to_string().parse::<TypeName>().unwrap(), name);
        }
        assert!("ard.decimal".parse::<TypeName>().is_err());
    }

    #[test]
    fn test_unknown_has_no_validator() {
        assert!(TypeName::Unknown("x").validator().is_none());
        assert!(!TypeName::Unknown("x").validate(&Value::null()));
    }
}
