//! Path navigation over value trees
//!
//! A [`Node`] is a read-only cursor into a tree; every lookup on it returns
//! another node, so chains never need intermediate checks. A lookup that
//! fails produces [`Node::Missing`], and every extractor on a missing node
//! returns `None`.
//!
//! ```rust
//! use ard::codec;
//!
//! let decoded = codec::decode(br#"{"first":{"property1":"Hello"}}"#, codec::Format::Json, false).unwrap();
//! let node = decoded.value.node();
//!
//! assert_eq!(node.get(["first", "property1"]).string().as_deref(), Some("Hello"));
//! assert!(node.get(["first", "nope"]).string().is_none());
//! ```
//!
//! [`NodeMut`] adds in-place edits: [`NodeMut::force_get`] creates the
//! missing maps on the way down, [`NodeMut::set`] rewrites a slot and
//! [`NodeMut::delete`] removes it.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::core::conversions::parse_bool;
use crate::core::{List, Map, StringMap, Timestamp, Value, zero_timestamp};

static NULL: Value = Value::Null;

/// How extractors treat values that are not exactly the requested type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags {
    /// Read a Null as the zero value of the requested type
    pub nil_means_zero: bool,
    /// Convert between similar types instead of failing
    pub convert_similar: bool,
}

// ============================================================================
// NODE
// ============================================================================

/// Read-only cursor into a value tree
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    /// The path resolved to a value
    Found {
        /// Value at the cursor
        value: &'a Value,
        /// Extraction flags carried down from the root
        flags: NodeFlags,
    },
    /// The path did not resolve
    Missing,
}

impl<'a> Node<'a> {
    /// Cursor at the root of a tree
    #[must_use]
    pub const fn new(value: &'a Value) -> Self {
        Self::Found {
            value,
            flags: NodeFlags {
                nil_means_zero: false,
                convert_similar: false,
            },
        }
    }

    /// Copy of this node that reads Null as the requested type's zero
    #[must_use]
    pub fn nil_means_zero(self) -> Self {
        self.with_flags(|flags| flags.nil_means_zero = true)
    }

    /// Copy of this node that converts between similar types
    #[must_use]
    pub fn convert_similar(self) -> Self {
        self.with_flags(|flags| flags.convert_similar = true)
    }

    fn with_flags(self, change: impl FnOnce(&mut NodeFlags)) -> Self {
        match self {
            Self::Found { value, mut flags } => {
                change(&mut flags);
                Self::Found { value, flags }
            }
            Self::Missing => Self::Missing,
        }
    }

    /// Did the path resolve?
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Flags of a found node
    #[must_use]
    pub const fn flags(&self) -> Option<NodeFlags> {
        match self {
            Self::Found { flags, .. } => Some(*flags),
            Self::Missing => None,
        }
    }

    // ==================== Navigation ====================

    /// Descend through nested maps, one key per level
    ///
    /// Both map variants are searched; a string map matches on the
    /// canonical string form of the key. An empty key list, an absent key
    /// or a non-map on the way all give [`Node::Missing`].
    #[must_use]
    pub fn get<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        let Self::Found { mut value, flags } = self else {
            return Self::Missing;
        };

        let mut empty = true;
        for key in keys {
            empty = false;
            match child(value, &key.into()) {
                Some(next) => value = next,
                None => return Self::Missing,
            }
        }

        if empty {
            Self::Missing
        } else {
            Self::Found { value, flags }
        }
    }

    /// [`get`](Self::get) with the keys taken from a separated string
    #[must_use]
    pub fn get_path(self, path: &str, separator: &str) -> Self {
        self.get(path.split(separator))
    }

    /// Element of a list
    #[must_use]
    pub fn list_get(self, index: usize) -> Self {
        match self {
            Self::Found {
                value: Value::List(list),
                flags,
            } => list
                .get(index)
                .map_or(Self::Missing, |value| Self::Found { value, flags }),
            _ => Self::Missing,
        }
    }

    // ==================== Extractors ====================

    /// Value at the cursor, as it is
    #[must_use]
    pub const fn value(&self) -> Option<&'a Value> {
        match self {
            Self::Found { value, .. } => Some(*value),
            Self::Missing => None,
        }
    }

    /// Is the value at the cursor Null?
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Found { value: Value::Null, .. })
    }

    /// Zero value when the cursor holds Null and the flag allows it
    fn zero<T>(&self, zero: impl FnOnce() -> T) -> Option<T> {
        match self {
            Self::Found {
                value: Value::Null,
                flags,
            } if flags.nil_means_zero => Some(zero()),
            _ => None,
        }
    }

    /// Value to convert, when the flag allows it
    fn similar(&self) -> Option<&'a Value> {
        match self {
            Self::Found { value, flags } if flags.convert_similar && !value.is_null() => {
                Some(*value)
            }
            _ => None,
        }
    }

    /// String value; with conversion, the canonical form of any scalar
    #[must_use]
    pub fn string(&self) -> Option<Cow<'a, str>> {
        if let Some(Value::String(s)) = self.value() {
            return Some(Cow::Borrowed(s));
        }
        self.zero(|| Cow::Borrowed(""))
            .or_else(|| self.similar().filter(|v| v.is_primitive()).map(Value::key_string))
    }

    /// Byte value; with conversion, a base64 string
    #[must_use]
    pub fn bytes(&self) -> Option<Cow<'a, [u8]>> {
        if let Some(Value::Bytes(b)) = self.value() {
            return Some(Cow::Borrowed(b));
        }
        self.zero(|| Cow::Borrowed(&[][..])).or_else(|| match self.similar() {
            Some(Value::String(s)) => STANDARD.decode(s).ok().map(Cow::Owned),
            _ => None,
        })
    }

    /// Signed integer; with conversion, any number
    #[must_use]
    pub fn integer(&self) -> Option<i64> {
        if let Some(Value::Integer(i)) = self.value() {
            return Some(*i);
        }
        self.zero(|| 0).or_else(|| match self.similar() {
            Some(Value::UnsignedInteger(u)) => Some(*u as i64),
            Some(Value::Float(f)) => Some(*f as i64),
            _ => None,
        })
    }

    /// Unsigned integer; with conversion, any number
    #[must_use]
    pub fn unsigned_integer(&self) -> Option<u64> {
        if let Some(Value::UnsignedInteger(u)) = self.value() {
            return Some(*u);
        }
        self.zero(|| 0).or_else(|| match self.similar() {
            Some(Value::Integer(i)) => Some(*i as u64),
            Some(Value::Float(f)) => Some(*f as u64),
            _ => None,
        })
    }

    /// Float; with conversion, any number
    #[must_use]
    pub fn float(&self) -> Option<f64> {
        if let Some(Value::Float(f)) = self.value() {
            return Some(*f);
        }
        self.zero(|| 0.0).or_else(|| match self.similar() {
            Some(Value::Integer(i)) => Some(*i as f64),
            Some(Value::UnsignedInteger(u)) => Some(*u as f64),
            _ => None,
        })
    }

    /// Boolean; with conversion, any scalar whose string form is a
    /// boolean literal
    #[must_use]
    pub fn boolean(&self) -> Option<bool> {
        if let Some(Value::Boolean(b)) = self.value() {
            return Some(*b);
        }
        self.zero(|| false).or_else(|| {
            self.similar()
                .filter(|v| v.is_primitive())
                .and_then(|v| parse_bool(&v.key_string()))
        })
    }

    /// Timestamp; Null reads as the zero timestamp
    #[must_use]
    pub fn timestamp(&self) -> Option<Timestamp> {
        if let Some(Value::Timestamp(t)) = self.value() {
            return Some(*t);
        }
        self.zero(zero_timestamp)
    }

    /// Arbitrary-key map; with conversion, a string map's entries
    #[must_use]
    pub fn map(&self) -> Option<Cow<'a, Map>> {
        if let Some(Value::Map(m)) = self.value() {
            return Some(Cow::Borrowed(m));
        }
        self.zero(|| Cow::Owned(Map::new())).or_else(|| match self.similar() {
            Some(Value::StringMap(m)) => Some(Cow::Owned(
                m.iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.clone()))
                    .collect(),
            )),
            _ => None,
        })
    }

    /// String-key map; with conversion, a map's entries under their
    /// canonical key strings
    #[must_use]
    pub fn string_map(&self) -> Option<Cow<'a, StringMap>> {
        if let Some(Value::StringMap(m)) = self.value() {
            return Some(Cow::Borrowed(m));
        }
        self.zero(|| Cow::Owned(StringMap::new()))
            .or_else(|| match self.similar() {
                Some(Value::Map(m)) => Some(Cow::Owned(
                    m.iter()
                        .map(|(k, v)| (k.to_canonical_string(), v.clone()))
                        .collect(),
                )),
                _ => None,
            })
    }

    /// List; with conversion, bytes as unsigned integers
    #[must_use]
    pub fn list(&self) -> Option<Cow<'a, List>> {
        if let Some(Value::List(l)) = self.value() {
            return Some(Cow::Borrowed(l));
        }
        self.zero(|| Cow::Owned(List::new()))
            .or_else(|| match self.similar() {
                Some(Value::Bytes(b)) => Some(Cow::Owned(
                    b.iter().map(|&byte| Value::UnsignedInteger(u64::from(byte))).collect(),
                )),
                _ => None,
            })
    }

    /// List of strings
    ///
    /// Without conversion every element must be a string; with it, scalar
    /// elements are read through their canonical string form.
    #[must_use]
    pub fn string_list(&self) -> Option<Vec<String>> {
        let Self::Found { value, flags } = self else {
            return None;
        };

        match value {
            Value::List(list) => list
                .iter()
                .map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other if flags.convert_similar && other.is_primitive() => {
                        Some(other.to_canonical_string())
                    }
                    _ => None,
                })
                .collect(),
            _ => self.zero(Vec::new),
        }
    }
}

impl Value {
    /// Read-only cursor at this value
    #[must_use]
    pub const fn node(&self) -> Node<'_> {
        Node::new(self)
    }

    /// Mutable cursor at this value
    pub fn node_mut(&mut self) -> NodeMut<'_> {
        NodeMut::new(self)
    }
}

// ============================================================================
// NODE MUT
// ============================================================================

/// Where a mutable cursor points
#[derive(Debug)]
enum Slot<'a> {
    /// The tree itself; it has no container to rewrite
    Root(&'a mut Value),
    /// A key of a map, present or not
    Entry { map: &'a mut Value, key: Value },
    Missing,
}

/// Mutable cursor into a value tree
///
/// ```rust
/// use ard::Value;
///
/// let mut value = Value::Null;
/// assert!(value.node_mut().force_get(["a", "b"]).set(Value::Integer(1)));
/// assert_eq!(value.node().get(["a", "b"]).integer(), Some(1));
/// ```
#[derive(Debug)]
pub struct NodeMut<'a> {
    slot: Slot<'a>,
    flags: NodeFlags,
}

impl<'a> NodeMut<'a> {
    /// Cursor at the root of a tree
    pub fn new(value: &'a mut Value) -> Self {
        Self {
            slot: Slot::Root(value),
            flags: NodeFlags::default(),
        }
    }

    const fn missing(flags: NodeFlags) -> Self {
        Self {
            slot: Slot::Missing,
            flags,
        }
    }

    /// Read Null as the requested type's zero
    #[must_use]
    pub fn nil_means_zero(mut self) -> Self {
        self.flags.nil_means_zero = true;
        self
    }

    /// Convert between similar types
    #[must_use]
    pub fn convert_similar(mut self) -> Self {
        self.flags.convert_similar = true;
        self
    }

    /// Did the path resolve?
    #[must_use]
    pub const fn is_missing(&self) -> bool {
        matches!(self.slot, Slot::Missing)
    }

    /// Read-only view, for the extractors
    ///
    /// An entry whose key is absent reads as Null.
    #[must_use]
    pub fn as_node(&self) -> Node<'_> {
        let value = match &self.slot {
            Slot::Root(value) => &**value,
            Slot::Entry { map, key } => child(map, key).unwrap_or(&NULL),
            Slot::Missing => return Node::Missing,
        };
        Node::Found {
            value,
            flags: self.flags,
        }
    }

    /// The value behind the slot, inserting Null for an absent entry when
    /// `insert` is set
    fn into_value(self, insert: bool) -> Option<&'a mut Value> {
        match self.slot {
            Slot::Root(value) => Some(value),
            Slot::Entry { map, key } if insert => child_or_insert(map, &key),
            Slot::Entry { map, key } => child_mut(map, &key),
            Slot::Missing => None,
        }
    }

    // ==================== Navigation ====================

    /// Descend through nested maps without changing anything
    ///
    /// Same rules as [`Node::get`].
    #[must_use]
    pub fn get<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        let flags = self.flags;
        let keys: Vec<Value> = keys.into_iter().map(Into::into).collect();
        let Some((last, path)) = keys.split_last() else {
            return Self::missing(flags);
        };
        let Some(mut current) = self.into_value(false) else {
            return Self::missing(flags);
        };

        for key in path {
            match child_mut(current, key) {
                Some(next) => current = next,
                None => return Self::missing(flags),
            }
        }

        if child(current, last).is_none() {
            return Self::missing(flags);
        }
        Self {
            slot: Slot::Entry {
                map: current,
                key: last.clone(),
            },
            flags,
        }
    }

    /// Descend through nested maps, creating what is missing
    ///
    /// Intermediate maps take the variant of the map they are added to, and
    /// a Null on the way is replaced the same way. The final key need not
    /// exist; its slot then reads as Null until [`set`](Self::set).
    /// Anything other than a map or Null on the way gives a missing node.
    #[must_use]
    pub fn force_get<I, K>(self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Value>,
    {
        let flags = self.flags;
        let keys: Vec<Value> = keys.into_iter().map(Into::into).collect();
        let Some((last, path)) = keys.split_last() else {
            return Self::missing(flags);
        };
        let Some(mut current) = self.into_value(true) else {
            return Self::missing(flags);
        };
        if current.is_null() {
            *current = Value::map_empty();
        }

        for key in path {
            let Some(empty) = empty_like(current) else {
                return Self::missing(flags);
            };
            let Some(next) = child_or_insert(current, key) else {
                return Self::missing(flags);
            };
            if next.is_null() {
                *next = empty;
            }
            current = next;
        }

        if !current.is_any_map() {
            return Self::missing(flags);
        }
        Self {
            slot: Slot::Entry {
                map: current,
                key: last.clone(),
            },
            flags,
        }
    }

    /// [`get`](Self::get) with the keys taken from a separated string
    #[must_use]
    pub fn get_path(self, path: &str, separator: &str) -> Self {
        self.get(path.split(separator))
    }

    /// [`force_get`](Self::force_get) with the keys taken from a separated
    /// string
    #[must_use]
    pub fn force_get_path(self, path: &str, separator: &str) -> Self {
        self.force_get(path.split(separator))
    }

    // ==================== Edits ====================

    /// Store a value in the slot's container
    ///
    /// Returns false for the root and for missing nodes.
    pub fn set(&mut self, value: Value) -> bool {
        let Slot::Entry { map, key } = &mut self.slot else {
            return false;
        };

        match &mut **map {
            Value::Map(m) => {
                m.insert(key.clone(), value);
                true
            }
            Value::StringMap(m) => {
                m.insert(key.to_canonical_string(), value);
                true
            }
            _ => false,
        }
    }

    /// Push onto the list at the cursor
    ///
    /// Returns false when the cursor does not hold a list.
    pub fn append(&mut self, value: Value) -> bool {
        let target = match &mut self.slot {
            Slot::Root(target) => Some(&mut **target),
            Slot::Entry { map, key } => child_mut(map, key),
            Slot::Missing => None,
        };

        match target.and_then(Value::as_list_mut) {
            Some(list) => {
                list.push(value);
                true
            }
            None => false,
        }
    }

    /// Remove the slot's key from its container
    ///
    /// The cursor is missing afterwards. Returns whether a key was removed.
    pub fn delete(&mut self) -> bool {
        if !matches!(self.slot, Slot::Entry { .. }) {
            return false;
        }
        let Slot::Entry { map, key } = std::mem::replace(&mut self.slot, Slot::Missing) else {
            return false;
        };

        match map {
            Value::Map(m) => m.shift_remove(&key).is_some(),
            Value::StringMap(m) => m.shift_remove(&*key.key_string()).is_some(),
            _ => false,
        }
    }
}

// ==================== Map access ====================

fn child<'v>(map: &'v Value, key: &Value) -> Option<&'v Value> {
    match map {
        Value::Map(m) => m.get(key),
        Value::StringMap(m) => m.get(&*key.key_string()),
        _ => None,
    }
}

fn child_mut<'v>(map: &'v mut Value, key: &Value) -> Option<&'v mut Value> {
    match map {
        Value::Map(m) => m.get_mut(key),
        Value::StringMap(m) => m.get_mut(&*key.key_string()),
        _ => None,
    }
}

fn child_or_insert<'v>(map: &'v mut Value, key: &Value) -> Option<&'v mut Value> {
    match map {
        Value::Map(m) => Some(m.entry(key.clone()).or_insert(Value::Null)),
        Value::StringMap(m) => Some(
            m.entry(key.to_canonical_string())
                .or_insert(Value::Null),
        ),
        _ => None,
    }
}

/// Empty map of the same variant
fn empty_like(map: &Value) -> Option<Value> {
    match map {
        Value::Map(_) => Some(Value::Map(Map::new())),
        Value::StringMap(_) => Some(Value::StringMap(StringMap::new())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::codec::{Format, decode};

    fn document() -> Value {
        decode(br#"{"first":{"property1":"Hello","n":5,"list":["a","b"]}}"#, Format::Json, false)
            .unwrap()
            .value
    }

    #[test]
    fn test_get_nested_string() {
        let value = document();
        let node = value.node().get(["first", "property1"]);
        assert_eq!(node.string().as_deref(), Some("Hello"));
        assert!(node.integer().is_none());
    }

    #[rstest]
    #[case(&[][..])]
    #[case(&["nope"][..])]
    #[case(&["first", "property1", "deeper"][..])]
    fn test_get_missing(#[case] keys: &[&str]) {
        let value = document();
        let node = value.node().get(keys.iter().copied());
        assert!(node.is_missing());
        assert!(node.string().is_none());
        assert!(!node.is_null());
    }

    #[test]
    fn test_get_path_and_list_get() {
        let value = document();
        let node = value.node().get_path("first/list", "/");
        assert_eq!(node.string_list(), Some(vec!["a".to_owned(), "b".to_owned()]));
        assert_eq!(node.list_get(1).string().as_deref(), Some("b"));
        assert!(node.list_get(2).is_missing());
    }

    #[test]
    fn test_string_map_lookup() {
        let mut inner = StringMap::new();
        inner.insert("k".to_owned(), Value::Boolean(true));
        let mut outer = StringMap::new();
        outer.insert("m".to_owned(), Value::StringMap(inner));
        let value = Value::StringMap(outer);

        assert_eq!(value.node().get(["m", "k"]).boolean(), Some(true));
    }

    #[test]
    fn test_nil_means_zero() {
        let value = Value::Null;
        let node = value.node();
        assert!(node.is_null());
        assert!(node.integer().is_none());

        let node = node.nil_means_zero();
        assert_eq!(node.integer(), Some(0));
        assert_eq!(node.string().as_deref(), Some(""));
        assert_eq!(node.boolean(), Some(false));
        assert_eq!(node.timestamp(), Some(zero_timestamp()));
        assert_eq!(node.list().map(|l| l.len()), Some(0));
        assert_eq!(node.string_list(), Some(Vec::new()));
    }

    #[test]
    fn test_convert_similar() {
        let numbers = Value::Integer(-1);
        let node = numbers.node();
        assert!(node.unsigned_integer().is_none());
        let node = node.convert_similar();
        assert_eq!(node.unsigned_integer(), Some(u64::MAX));
        assert_eq!(node.float(), Some(-1.0));
        assert_eq!(node.string().as_deref(), Some("-1"));

        let flag = Value::string("T");
        assert_eq!(flag.node().convert_similar().boolean(), Some(true));
        assert_eq!(Value::Integer(0).node().convert_similar().boolean(), Some(false));
        assert!(Value::string("yes").node().convert_similar().boolean().is_none());

        let encoded = Value::string("AQI=");
        assert_eq!(encoded.node().convert_similar().bytes().as_deref(), Some(&[1, 2][..]));

        let bytes = Value::Bytes(vec![7]);
        assert_eq!(
            bytes.node().convert_similar().list().as_deref(),
            Some(&vec![Value::UnsignedInteger(7)])
        );

        let mixed = Value::List(vec![Value::string("a"), Value::Integer(2)]);
        assert!(mixed.node().string_list().is_none());
        assert_eq!(
            mixed.node().convert_similar().string_list(),
            Some(vec!["a".to_owned(), "2".to_owned()])
        );
    }

    #[test]
    fn test_convert_between_map_variants() {
        let value = document();
        let first = value.node().get(["first"]);
        assert!(first.string_map().is_none());

        let converted = first.convert_similar().string_map().unwrap();
        assert_eq!(converted.get("n"), Some(&Value::Float(5.0)));

        let mut string_map = StringMap::new();
        string_map.insert("x".to_owned(), Value::Null);
        let value = Value::StringMap(string_map);
        let map = value.node().convert_similar().map().unwrap();
        assert!(map.contains_key(&Value::string("x")));
    }

    #[test]
    fn test_set_existing_and_root() {
        let mut value = document();
        assert!(!value.node_mut().set(Value::Null));

        let mut node = value.node_mut().get(["first", "n"]);
        assert!(node.set(Value::Integer(6)));
        assert_eq!(value.node().get(["first", "n"]).integer(), Some(6));

        assert!(!value.node_mut().get(["first", "absent"]).set(Value::Null));
    }

    #[test]
    fn test_force_get_creates_maps_of_parent_variant() {
        let mut value = Value::StringMap(StringMap::new());
        let mut node = value.node_mut().force_get_path("a.b.c", ".");
        assert!(node.as_node().is_null());
        assert!(node.set(Value::string("deep")));

        let a = value.get_key("a").unwrap();
        assert!(matches!(a, Value::StringMap(_)));
        assert_eq!(value.node().get_path("a.b.c", ".").string().as_deref(), Some("deep"));
    }

    #[test]
    fn test_force_get_replaces_null_and_stops_at_scalars() {
        let mut value = document();
        value.node_mut().force_get(["first", "property1"]).set(Value::Null);

        let mut node = value.node_mut().force_get(["first", "property1", "x"]);
        assert!(node.set(Value::Integer(1)));
        assert!(matches!(
            value.node().get(["first", "property1"]).value(),
            Some(Value::Map(_))
        ));

        assert!(value.node_mut().force_get(["first", "n", "x"]).is_missing());
    }

    #[test]
    fn test_append() {
        let mut value = document();
        assert!(value.node_mut().get(["first", "list"]).append(Value::string("c")));
        assert!(!value.node_mut().get(["first", "n"]).append(Value::Null));
        assert_eq!(
            value.node().get(["first", "list"]).string_list(),
            Some(vec!["a".to_owned(), "b".to_owned(), "c".to_owned()])
        );
    }

    #[test]
    fn test_delete_keeps_order_of_the_rest() {
        let mut value = document();
        let mut node = value.node_mut().get(["first", "property1"]);
        assert!(node.delete());
        assert!(node.is_missing());
        assert!(!node.delete());

        let keys: Vec<_> = value
            .node()
            .get(["first"])
            .map()
            .unwrap()
            .keys()
            .map(Value::to_canonical_string)
            .collect();
        assert_eq!(keys, ["n", "list"]);
    }
}
