//! Reflector: conversion between host types and ARD
//!
//! Host types take part through serde. [`Reflector::unpack`] drives a
//! type's `Serialize` implementation into a value tree and
//! [`Reflector::pack`] drives its `Deserialize` implementation from one.
//! Field naming is controlled with the usual serde attributes:
//!
//! - `#[serde(rename = "name")]` picks the key
//! - `#[serde(skip)]` leaves a field out
//! - `#[serde(skip_serializing_if = "...", default)]` omits empty fields
//!
//! ```rust
//! use ard::{Reflector, Value};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Server {
//!     host: String,
//!     port: u16,
//! }
//!
//! let reflector = Reflector::default();
//! let server = Server { host: "localhost".into(), port: 8080 };
//!
//! let value = reflector.unpack(&server).unwrap();
//! assert_eq!(value.get_key("port"), Some(&Value::UnsignedInteger(8080)));
//!
//! let back: Server = reflector.pack(&value).unwrap();
//! assert_eq!(back, server);
//! ```

mod de;
pub mod hook;
mod host;
mod ser;
pub mod timestamp;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::core::{Path, Value};
use crate::error::ArdResult;
use crate::ops::{copy_string_maps_to_maps, merge};

pub use hook::{FromArd, ToArd};
pub use host::{HostValue, Reflectable};

/// Newtype-struct name that marks a timestamp travelling through serde
pub(crate) const TIMESTAMP_TOKEN: &str = "$__ard_private_Timestamp";

/// Field name mapping function
pub type FieldNameMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

// ============================================================================
// FIELD CACHE
// ============================================================================

/// Identity of a struct's field list
///
/// Serde hands out the same `&'static [&'static str]` for every call made by
/// one derived implementation, so its address identifies the struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct FieldKey {
    type_name: &'static str,
    fields: usize,
    len: usize,
}

/// Resolved field names of one struct, keyed by the ARD map key
#[derive(Debug, Default)]
pub(crate) struct FieldTable {
    by_key: HashMap<String, &'static str>,
}

impl FieldTable {
    /// Struct field for a map key, if the struct has one
    pub(crate) fn resolve(&self, key: &str) -> Option<&'static str> {
        self.by_key.get(key).copied()
    }
}

// ============================================================================
// REFLECTOR
// ============================================================================

/// Converts host values to and from ARD
///
/// Cloning is cheap; clones share the field cache. The cache is safe for
/// concurrent use, so one reflector can serve many threads.
#[derive(Clone, Default)]
pub struct Reflector {
    ignore_missing_struct_fields: bool,
    nil_means_zero: bool,
    field_name_mapper: Option<FieldNameMapper>,
    fields: Arc<DashMap<FieldKey, Arc<FieldTable>>>,
}

impl Reflector {
    /// Create a reflector with default settings
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Builder ====================

    /// Skip map keys that match no struct field instead of failing
    #[must_use]
    pub fn ignore_missing_struct_fields(mut self, ignore: bool) -> Self {
        self.ignore_missing_struct_fields = ignore;
        self
    }

    /// Pack null as the target's zero value instead of failing
    #[must_use]
    pub fn nil_means_zero(mut self, enabled: bool) -> Self {
        self.nil_means_zero = enabled;
        self
    }

    /// Rename struct fields on the way in and out
    ///
    /// The mapper sees field names as serde reports them, that is after any
    /// `#[serde(rename)]`. Changing the mapper starts a fresh field cache.
    #[must_use]
    pub fn field_name_mapper<F>(mut self, mapper: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.field_name_mapper = Some(Arc::new(mapper));
        self.fields = Arc::default();
        self
    }

    // ==================== Settings ====================

    /// Are unknown map keys skipped when packing structs?
    #[inline]
    #[must_use]
    pub fn ignores_missing_struct_fields(&self) -> bool {
        self.ignore_missing_struct_fields
    }

    /// Does null pack as the zero value?
    #[inline]
    #[must_use]
    pub fn nil_is_zero(&self) -> bool {
        self.nil_means_zero
    }

    // ==================== Operations ====================

    /// Unpack a host value into ARD, producing [`Value::Map`] for maps and
    /// structs
    ///
    /// # Errors
    ///
    /// Returns [`crate::ArdError::UnsupportedType`] for values with no ARD
    /// representative, such as 128-bit integers out of 64-bit range.
    pub fn unpack<T>(&self, value: &T) -> ArdResult<Value>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(ser::ValueSerializer::new(self, false, Path::new()))
    }

    /// Unpack a host value into ARD, producing string maps
    ///
    /// Map keys are stringified with [`Value::key_string`].
    ///
    /// # Errors
    ///
    /// Same as [`Reflector::unpack`].
    pub fn unpack_string_maps<T>(&self, value: &T) -> ArdResult<Value>
    where
        T: Serialize + ?Sized,
    {
        value.serialize(ser::ValueSerializer::new(self, true, Path::new()))
    }

    /// Pack a value tree into a fresh host value
    ///
    /// Host leaves inside `value` must be reflected first, see
    /// [`crate::ops::valid_copy`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::ArdError::Reflect`] carrying the path of the first
    /// value that does not fit the target type.
    pub fn pack<'v, T>(&'v self, value: &'v Value) -> ArdResult<T>
    where
        T: Deserialize<'v>,
    {
        T::deserialize(de::ValueDeserializer::new(value, self, Path::new()))
    }

    /// Project a value tree onto an existing host value
    ///
    /// The target is unpacked, `value` is merged over it and the result is
    /// packed back, so fields missing from `value` keep their current
    /// contents. On error the target is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Reflector::unpack`] and [`Reflector::pack`].
    pub fn pack_into<T>(&self, value: &Value, target: &mut T) -> ArdResult<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let current = self.unpack(target)?;
        let merged = merge(current, &copy_string_maps_to_maps(value), false);
        *target = self.pack(&merged)?;
        Ok(())
    }

    // ==================== Field names ====================

    /// ARD key for a struct field
    pub(crate) fn field_key<'f>(&self, field: &'f str) -> std::borrow::Cow<'f, str> {
        match &self.field_name_mapper {
            Some(mapper) => std::borrow::Cow::Owned(mapper(field)),
            None => std::borrow::Cow::Borrowed(field),
        }
    }

    /// Cached field table for a struct, built on first use
    pub(crate) fn field_table(
        &self,
        type_name: &'static str,
        fields: &'static [&'static str],
    ) -> Arc<FieldTable> {
        let key = FieldKey {
            type_name,
            fields: fields.as_ptr() as usize,
            len: fields.len(),
        };
        self.fields
            .entry(key)
            .or_insert_with(|| {
                tracing::trace!(type_name, fields = fields.len(), "caching struct field table");
                Arc::new(FieldTable {
                    by_key: fields
                        .iter()
                        .map(|field| (self.field_key(field).into_owned(), *field))
                        .collect(),
                })
            })
            .clone()
    }
}

impl fmt::Debug for Reflector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reflector")
            .field(
                "ignore_missing_struct_fields",
                &self.ignore_missing_struct_fields,
            )
            .field("nil_means_zero", &self.nil_means_zero)
            .field("field_name_mapper", &self.field_name_mapper.is_some())
            .field("cached_structs", &self.fields.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Database {
        host: String,
        port: u16,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        replicas: Vec<String>,
    }

    #[test]
    fn test_field_table_is_cached() {
        static FIELDS: &[&str] = &["a", "b"];
        let reflector = Reflector::new();

        let first = reflector.field_table("T", FIELDS);
        let second = reflector.clone().field_table("T", FIELDS);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.resolve("b"), Some("b"));
        assert_eq!(first.resolve("c"), None);
    }

    #[test]
    fn test_field_name_mapper_applies_both_ways() {
        let reflector = Reflector::new().field_name_mapper(|name| name.to_uppercase());
        let db = Database {
            host: "db".to_owned(),
            port: 5432,
            replicas: Vec::new(),
        };

        let value = reflector.unpack(&db).unwrap();
        assert_eq!(value.get_key("HOST"), Some(&Value::string("db")));
        assert!(value.get_key("host").is_none());
        assert!(value.get_key("REPLICAS").is_none());

        let back: Database = reflector.pack(&value).unwrap();
        assert_eq!(back, db);
    }

    #[test]
    fn test_pack_into_keeps_unset_fields() {
        let reflector = Reflector::new();
        let mut db = Database {
            host: "old".to_owned(),
            port: 1,
            replicas: vec!["r1".to_owned()],
        };

        let patch: Value = [("port".to_owned(), Value::from(2u16))]
            .into_iter()
            .collect();
        reflector.pack_into(&patch, &mut db).unwrap();

        assert_eq!(db.host, "old");
        assert_eq!(db.port, 2);
        assert_eq!(db.replicas, vec!["r1".to_owned()]);
    }

    #[test]
    fn test_pack_into_leaves_target_on_error() {
        let reflector = Reflector::new();
        let mut db = Database::default();

        let patch: Value = [("port".to_owned(), Value::string("not a port"))]
            .into_iter()
            .collect();
        assert!(reflector.pack_into(&patch, &mut db).is_err());
        assert_eq!(db, Database::default());
    }

    #[test]
    fn test_reflector_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Reflector>();
    }
}
