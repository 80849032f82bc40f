//! The ARD Value enum
//!
//! This is the central type of the crate: a closed set of primitive and
//! container types that every codec reads and writes.

use chrono::{DateTime, FixedOffset};
use indexmap::IndexMap;

use crate::reflect::HostValue;

/// Ordered sequence of values
pub type List = Vec<Value>;

/// Map whose keys are themselves values
pub type Map = IndexMap<Value, Value>;

/// Map restricted to string keys
pub type StringMap = IndexMap<String, Value>;

/// Timestamp with its original UTC offset
pub type Timestamp = DateTime<FixedOffset>;

/// Agnostic raw data value
///
/// Narrower integer and float widths are widened to their 64-bit
/// representative on the way in; the model does not remember the original
/// width.
///
/// [`Map`] and [`StringMap`] are distinct variants: a map is never equal to
/// a string map, even when their logical content matches. Conversions
/// between them are explicit, see [`crate::ops`].
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// Null value
    #[default]
    Null,

    /// Boolean value
    Boolean(bool),

    /// Signed 64-bit integer
    Integer(i64),

    /// Unsigned 64-bit integer
    UnsignedInteger(u64),

    /// 64-bit float
    Float(f64),

    /// UTF-8 string
    String(String),

    /// Raw byte sequence
    Bytes(Vec<u8>),

    /// Timestamp
    Timestamp(Timestamp),

    /// List of values
    List(List),

    /// Map with arbitrary keys
    Map(Map),

    /// Map with string keys
    StringMap(StringMap),

    /// Host value that has not been reflected into ARD yet
    ///
    /// Never produced by a decoder. Use [`crate::ops::valid_copy`] to turn
    /// a tree containing host values into pure ARD.
    Host(HostValue),
}

impl Value {
    // ==================== Constructors ====================

    /// Create a null value
    pub const fn null() -> Self {
        Self::Null
    }

    /// Create a boolean value
    pub const fn boolean(v: bool) -> Self {
        Self::Boolean(v)
    }

    /// Create a signed integer value
    pub const fn integer(v: i64) -> Self {
        Self::Integer(v)
    }

    /// Create an unsigned integer value
    pub const fn unsigned_integer(v: u64) -> Self {
        Self::UnsignedInteger(v)
    }

    /// Create a float value
    pub const fn float(v: f64) -> Self {
        Self::Float(v)
    }

    /// Create a string value from String or &str
    pub fn string(v: impl Into<String>) -> Self {
        Self::String(v.into())
    }

    /// Create a bytes value
    pub fn bytes(v: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(v.into())
    }

    /// Create a timestamp value
    pub const fn timestamp(v: Timestamp) -> Self {
        Self::Timestamp(v)
    }

    /// Create an empty list
    pub fn list_empty() -> Self {
        Self::List(List::new())
    }

    /// Create an empty arbitrary-key map
    pub fn map_empty() -> Self {
        Self::Map(Map::new())
    }

    /// Create an empty string-key map
    pub fn string_map_empty() -> Self {
        Self::StringMap(StringMap::new())
    }

    /// Wrap a host value so it can sit inside a tree until it is reflected
    pub fn host<T>(v: T) -> Self
    where
        T: serde::Serialize + Send + Sync + 'static,
    {
        Self::Host(HostValue::new(v))
    }

    // ==================== Type queries ====================

    /// Check if value is null
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Check if value is a boolean
    #[inline]
    #[must_use]
    pub const fn is_boolean(&self) -> bool {
        matches!(self, Self::Boolean(_))
    }

    /// Check if value is a signed or unsigned integer
    #[inline]
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_) | Self::UnsignedInteger(_))
    }

    /// Check if value is a float
    #[inline]
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    /// Check if value is a string
    #[inline]
    #[must_use]
    pub const fn is_string(&self) -> bool {
        matches!(self, Self::String(_))
    }

    /// Check if value is a byte sequence
    #[inline]
    #[must_use]
    pub const fn is_bytes(&self) -> bool {
        matches!(self, Self::Bytes(_))
    }

    /// Check if value is a timestamp
    #[inline]
    #[must_use]
    pub const fn is_timestamp(&self) -> bool {
        matches!(self, Self::Timestamp(_))
    }

    /// Check if value is a list
    #[inline]
    #[must_use]
    pub const fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }

    /// Check if value is either map variant
    #[inline]
    #[must_use]
    pub const fn is_any_map(&self) -> bool {
        matches!(self, Self::Map(_) | Self::StringMap(_))
    }

    /// Check if value is a leaf
    ///
    /// Containers and unreflected host values are not primitive.
    #[inline]
    #[must_use]
    pub const fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Self::List(_) | Self::Map(_) | Self::StringMap(_) | Self::Host(_)
        )
    }

    /// Human-readable variant name, used in error messages
    pub const fn variant_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) => "integer",
            Self::UnsignedInteger(_) => "unsigned integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::StringMap(_) => "string map",
            Self::Host(_) => "host value",
        }
    }

    // ==================== Accessors ====================

    /// Get as bool if this is a Boolean
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Get as i64 if this is an Integer
    #[must_use]
    pub const fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Get as u64 if this is an UnsignedInteger
    #[must_use]
    pub const fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UnsignedInteger(u) => Some(*u),
            _ => None,
        }
    }

    /// Get as f64 if this is a Float
    #[must_use]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Get as &str if this is a String
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as byte slice if this is Bytes
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Get the timestamp if this is a Timestamp
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<&Timestamp> {
        match self {
            Self::Timestamp(t) => Some(t),
            _ => None,
        }
    }

    /// Get as list reference
    #[must_use]
    pub const fn as_list(&self) -> Option<&List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get as mutable list reference
    pub fn as_list_mut(&mut self) -> Option<&mut List> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }

    /// Get as arbitrary-key map reference
    #[must_use]
    pub const fn as_map(&self) -> Option<&Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get as mutable arbitrary-key map reference
    pub fn as_map_mut(&mut self) -> Option<&mut Map> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Get as string-key map reference
    #[must_use]
    pub const fn as_string_map(&self) -> Option<&StringMap> {
        match self {
            Self::StringMap(m) => Some(m),
            _ => None,
        }
    }

    /// Get as mutable string-key map reference
    pub fn as_string_map_mut(&mut self) -> Option<&mut StringMap> {
        match self {
            Self::StringMap(m) => Some(m),
            _ => None,
        }
    }

    // ==================== Map access ====================

    /// Look up a key in either map variant
    ///
    /// String maps only match string keys.
    #[must_use]
    pub fn get(&self, key: &Value) -> Option<&Value> {
        match self {
            Self::Map(m) => m.get(key),
            Self::StringMap(m) => match key {
                Self::String(k) => m.get(k.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Look up a key in either map variant, mutably
    pub fn get_mut(&mut self, key: &Value) -> Option<&mut Value> {
        match self {
            Self::Map(m) => m.get_mut(key),
            Self::StringMap(m) => match key {
                Self::String(k) => m.get_mut(k.as_str()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Look up a string key in either map variant
    #[must_use]
    pub fn get_key(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Map(m) => m.get(&Value::String(key.to_owned())),
            Self::StringMap(m) => m.get(key),
            _ => None,
        }
    }

    /// Number of elements in a container, `None` for scalars
    #[must_use]
    pub fn len(&self) -> Option<usize> {
        match self {
            Self::List(l) => Some(l.len()),
            Self::Map(m) => Some(m.len()),
            Self::StringMap(m) => Some(m.len()),
            _ => None,
        }
    }

    /// Check if this is an empty container
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }
}
