//! Equality and hashing for Value
//!
//! Every value can be a map key, so `Value` implements `Eq` and `Hash`
//! directly:
//!
//! - all NaN values are equal to each other, which keeps equality reflexive
//! - `-0.0` and `+0.0` are equal and hash the same
//! - maps compare and hash independently of insertion order
//! - values of different variants are never equal, even when numerically
//!   equal (`Integer(3) != Float(3.0)`) or logically equal
//!   (`Map != StringMap`)
//! - host values are equal only to themselves

use std::hash::{DefaultHasher, Hash, Hasher};

use crate::core::value::Value;

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::UnsignedInteger(a), Self::UnsignedInteger(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => float_eq(*a, *b),
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,

            // IndexMap equality ignores order
            (Self::Map(a), Self::Map(b)) => a == b,
            (Self::StringMap(a), Self::StringMap(b)) => a == b,

            (Self::Host(a), Self::Host(b)) => a.ptr_eq(b),

            _ => false,
        }
    }
}

impl Eq for Value {}

#[inline]
fn float_eq(a: f64, b: f64) -> bool {
    if a.is_nan() && b.is_nan() { true } else { a == b }
}

#[inline]
fn float_bits(f: f64) -> u64 {
    if f.is_nan() {
        f64::NAN.to_bits()
    } else if f == 0.0 {
        0.0f64.to_bits()
    } else {
        f.to_bits()
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);

        match self {
            Self::Null => {}
            Self::Boolean(b) => b.hash(state),
            Self::Integer(i) => i.hash(state),
            Self::UnsignedInteger(u) => u.hash(state),
            Self::Float(f) => float_bits(*f).hash(state),
            Self::String(s) => s.hash(state),
            Self::Bytes(b) => b.hash(state),
            Self::Timestamp(t) => t.hash(state),
            Self::List(l) => l.hash(state),
            Self::Map(m) => {
                m.len().hash(state);
                unordered_hash(m.iter()).hash(state);
            }
            Self::StringMap(m) => {
                m.len().hash(state);
                unordered_hash(m.iter()).hash(state);
            }
            Self::Host(h) => h.ptr_id().hash(state),
        }
    }
}

/// Order-independent combination of entry hashes
fn unordered_hash<'a, K, I>(entries: I) -> u64
where
    K: Hash + 'a,
    I: Iterator<Item = (&'a K, &'a Value)>,
{
    entries.fold(0u64, |acc, (key, value)| {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        value.hash(&mut hasher);
        acc.wrapping_add(hasher.finish())
    })
}

/// Structural equality
///
/// Same as `a == b`; spelled out as a function for call sites that read
/// better with it.
#[inline]
#[must_use]
pub fn equals(a: &Value, b: &Value) -> bool {
    a == b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::{Map, StringMap};
    use std::collections::HashSet;

    fn hash_of(value: &Value) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_nan_is_reflexive() {
        let nan = Value::float(f64::NAN);
        assert_eq!(nan, nan.clone());
        assert_eq!(hash_of(&nan), hash_of(&Value::float(-f64::NAN)));
    }

    #[test]
    fn test_signed_zero() {
        assert_eq!(Value::float(0.0), Value::float(-0.0));
        assert_eq!(hash_of(&Value::float(0.0)), hash_of(&Value::float(-0.0)));
    }

    #[test]
    fn test_numeric_variants_never_equal() {
        assert_ne!(Value::integer(3), Value::float(3.0));
        assert_ne!(Value::integer(3), Value::unsigned_integer(3));
        assert_ne!(Value::unsigned_integer(3), Value::float(3.0));
    }

    #[test]
    fn test_map_and_string_map_never_equal() {
        let mut map = Map::new();
        map.insert(Value::string("a"), Value::integer(1));
        let mut string_map = StringMap::new();
        string_map.insert("a".to_owned(), Value::integer(1));

        assert_ne!(Value::Map(map), Value::StringMap(string_map));
    }

    #[test]
    fn test_map_order_independent() {
        let mut a = Map::new();
        a.insert(Value::string("x"), Value::integer(1));
        a.insert(Value::string("y"), Value::integer(2));

        let mut b = Map::new();
        b.insert(Value::string("y"), Value::integer(2));
        b.insert(Value::string("x"), Value::integer(1));

        let (a, b) = (Value::Map(a), Value::Map(b));
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_values_as_set_members() {
        let mut set = HashSet::new();
        set.insert(Value::integer(1));
        set.insert(Value::list_empty());
        set.insert(Value::map_empty());
        set.insert(Value::integer(1));

        assert_eq!(set.len(), 3);
        assert!(set.contains(&Value::list_empty()));
    }

    #[test]
    fn test_host_identity() {
        let host = Value::host(String::from("x"));
        let other = Value::host(String::from("x"));
        assert_eq!(host, host.clone());
        assert_ne!(host, other);
    }
}
