//! Custom conversion hooks
//!
//! A type that implements [`ToArd`] and [`FromArd`] bypasses the generic
//! serde mapping. Wire it up per field with
//! `#[serde(with = "ard::reflect::hook")]`, or for the whole type with
//! [`impl_ard_serde!`](crate::impl_ard_serde); either way the hook runs
//! wherever the type appears, including nested positions.
//!
//! ```rust
//! use ard::reflect::{FromArd, ToArd};
//! use ard::{ArdError, ArdResult, Reflector, Value};
//!
//! #[derive(Debug, PartialEq)]
//! struct Port(u16);
//!
//! impl ToArd for Port {
//!     fn to_ard(&self) -> ArdResult<Value> {
//!         Ok(Value::string(format!(":{}", self.0)))
//!     }
//! }
//!
//! impl FromArd for Port {
//!     fn from_ard(value: &Value) -> ArdResult<Self> {
//!         value
//!             .as_str()
//!             .and_then(|s| s.strip_prefix(':'))
//!             .and_then(|s| s.parse().ok())
//!             .map(Port)
//!             .ok_or_else(|| ArdError::reflect("expected \":<port>\""))
//!     }
//! }
//!
//! ard::impl_ard_serde!(Port);
//!
//! let reflector = Reflector::default();
//! let value = reflector.unpack(&vec![Port(80)]).unwrap();
//! assert_eq!(value, Value::List(vec![Value::string(":80")]));
//!
//! let back: Vec<Port> = reflector.pack(&value).unwrap();
//! assert_eq!(back, vec![Port(80)]);
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer, de, ser};

use crate::core::Value;
use crate::error::ArdResult;

/// Conversion from a host type into ARD
pub trait ToArd {
    /// Produce the value's ARD form
    fn to_ard(&self) -> ArdResult<Value>;
}

/// Conversion from ARD into a host type
pub trait FromArd: Sized {
    /// Build the host value from its ARD form
    fn from_ard(value: &Value) -> ArdResult<Self>;
}

/// Serialize through [`ToArd`]
///
/// # Errors
///
/// Propagates the hook's error through the serializer.
pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: ToArd + ?Sized,
    S: Serializer,
{
    value
        .to_ard()
        .map_err(ser::Error::custom)?
        .serialize(serializer)
}

/// Deserialize through [`FromArd`]
///
/// # Errors
///
/// Propagates the hook's error through the deserializer.
pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: FromArd,
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    T::from_ard(&value).map_err(de::Error::custom)
}

/// Implement `Serialize` and `Deserialize` for a type from its
/// [`ToArd`]/[`FromArd`] hooks
#[macro_export]
macro_rules! impl_ard_serde {
    ($ty:ty) => {
        impl $crate::__private::serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> ::core::result::Result<S::Ok, S::Error>
            where
                S: $crate::__private::serde::Serializer,
            {
                $crate::reflect::hook::serialize(self, serializer)
            }
        }

        impl<'de> $crate::__private::serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: $crate::__private::serde::Deserializer<'de>,
            {
                $crate::reflect::hook::deserialize(deserializer)
            }
        }
    };
}
