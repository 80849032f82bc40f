//! Unpacking: a serde `Serializer` that produces ARD values

use std::cell::Cell;

use chrono::DateTime;
use serde::{Serialize, ser};

use crate::core::{List, Map, Path, StringMap, Value};
use crate::error::{ArdError, ArdResult};
use crate::ops::stringify_keys;
use crate::reflect::{Reflector, TIMESTAMP_TOKEN};

/// Serializer state for one position in the tree
pub(crate) struct ValueSerializer<'r> {
    reflector: &'r Reflector,
    string_maps: bool,
    path: Path,
    /// Set when the value turned out to be a `u8`
    byte_mark: Option<&'r Cell<bool>>,
}

impl<'r> ValueSerializer<'r> {
    pub(crate) fn new(reflector: &'r Reflector, string_maps: bool, path: Path) -> Self {
        Self {
            reflector,
            string_maps,
            path,
            byte_mark: None,
        }
    }

    fn child(&self, path: Path) -> ValueSerializer<'r> {
        ValueSerializer::new(self.reflector, self.string_maps, path)
    }

    fn map_builder(self, len: Option<usize>) -> SerializeMap<'r> {
        SerializeMap {
            entries: Vec::with_capacity(len.unwrap_or(0)),
            pending_key: None,
            reflector: self.reflector,
            string_maps: self.string_maps,
            path: self.path,
        }
    }

    fn seq_builder(self, len: Option<usize>) -> SerializeList<'r> {
        SerializeList {
            items: List::with_capacity(len.unwrap_or(0)),
            all_bytes: true,
            reflector: self.reflector,
            string_maps: self.string_maps,
            path: self.path,
        }
    }
}

impl<'r> ser::Serializer for ValueSerializer<'r> {
    type Ok = Value;
    type Error = ArdError;

    type SerializeSeq = SerializeList<'r>;
    type SerializeTuple = SerializeList<'r>;
    type SerializeTupleStruct = SerializeList<'r>;
    type SerializeTupleVariant = SerializeVariant<SerializeList<'r>>;
    type SerializeMap = SerializeMap<'r>;
    type SerializeStruct = SerializeStruct<'r>;
    type SerializeStructVariant = SerializeVariant<SerializeStruct<'r>>;

    fn serialize_bool(self, v: bool) -> ArdResult<Value> {
        Ok(Value::Boolean(v))
    }

    fn serialize_i8(self, v: i8) -> ArdResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i16(self, v: i16) -> ArdResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i32(self, v: i32) -> ArdResult<Value> {
        self.serialize_i64(i64::from(v))
    }

    fn serialize_i64(self, v: i64) -> ArdResult<Value> {
        Ok(Value::Integer(v))
    }

    fn serialize_i128(self, v: i128) -> ArdResult<Value> {
        if let Ok(v) = i64::try_from(v) {
            Ok(Value::Integer(v))
        } else if let Ok(v) = u64::try_from(v) {
            Ok(Value::UnsignedInteger(v))
        } else {
            Err(ArdError::unsupported_type(&self.path, "i128"))
        }
    }

    fn serialize_u8(self, v: u8) -> ArdResult<Value> {
        if let Some(mark) = self.byte_mark {
            mark.set(true);
        }
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u16(self, v: u16) -> ArdResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u32(self, v: u32) -> ArdResult<Value> {
        self.serialize_u64(u64::from(v))
    }

    fn serialize_u64(self, v: u64) -> ArdResult<Value> {
        Ok(Value::UnsignedInteger(v))
    }

    fn serialize_u128(self, v: u128) -> ArdResult<Value> {
        u64::try_from(v)
            .map(Value::UnsignedInteger)
            .map_err(|_| ArdError::unsupported_type(&self.path, "u128"))
    }

    fn serialize_f32(self, v: f32) -> ArdResult<Value> {
        self.serialize_f64(f64::from(v))
    }

    fn serialize_f64(self, v: f64) -> ArdResult<Value> {
        Ok(Value::Float(v))
    }

    fn serialize_char(self, v: char) -> ArdResult<Value> {
        Ok(Value::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> ArdResult<Value> {
        Ok(Value::String(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> ArdResult<Value> {
        Ok(Value::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> ArdResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_some<T>(self, value: &T) -> ArdResult<Value>
    where
        T: ?Sized + Serialize,
    {
        value.serialize(self)
    }

    fn serialize_unit(self) -> ArdResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> ArdResult<Value> {
        Ok(Value::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> ArdResult<Value> {
        Ok(Value::string(variant))
    }

    fn serialize_newtype_struct<T>(self, name: &'static str, value: &T) -> ArdResult<Value>
    where
        T: ?Sized + Serialize,
    {
        if name != TIMESTAMP_TOKEN {
            return value.serialize(self);
        }

        let path = self.path.clone();
        match value.serialize(self)? {
            Value::String(text) => DateTime::parse_from_rfc3339(&text)
                .map(Value::Timestamp)
                .map_err(|e| ArdError::reflect_at(&path, format!("invalid timestamp {text:?}: {e}"))),
            other => Ok(other),
        }
    }

    fn serialize_newtype_variant<T>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> ArdResult<Value>
    where
        T: ?Sized + Serialize,
    {
        let path = self.path.append_field(variant);
        let payload = value
            .serialize(self.child(path.clone()))
            .map_err(|e| e.at(&path))?;
        Ok(tagged(variant, self.string_maps, payload))
    }

    fn serialize_seq(self, len: Option<usize>) -> ArdResult<Self::SerializeSeq> {
        Ok(self.seq_builder(len))
    }

    fn serialize_tuple(self, len: usize) -> ArdResult<Self::SerializeTuple> {
        Ok(self.seq_builder(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> ArdResult<Self::SerializeTupleStruct> {
        Ok(self.seq_builder(Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> ArdResult<Self::SerializeTupleVariant> {
        let inner = self.child(self.path.append_field(variant));
        Ok(SerializeVariant {
            inner: inner.seq_builder(Some(len)),
            variant,
            string_maps: self.string_maps,
        })
    }

    fn serialize_map(self, len: Option<usize>) -> ArdResult<Self::SerializeMap> {
        Ok(self.map_builder(len))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> ArdResult<Self::SerializeStruct> {
        Ok(SerializeStruct {
            map: self.map_builder(Some(len)),
        })
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> ArdResult<Self::SerializeStructVariant> {
        let inner = self.child(self.path.append_field(variant));
        Ok(SerializeVariant {
            inner: SerializeStruct {
                map: inner.map_builder(Some(len)),
            },
            variant,
            string_maps: self.string_maps,
        })
    }
}

// ==================== Sequences ====================

/// Collects list elements; a sequence of only `u8` becomes bytes
pub(crate) struct SerializeList<'r> {
    items: List,
    all_bytes: bool,
    reflector: &'r Reflector,
    string_maps: bool,
    path: Path,
}

impl SerializeList<'_> {
    fn push<T>(&mut self, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        let mark = Cell::new(false);
        let path = self.path.append_list(self.items.len());
        let element = value
            .serialize(ValueSerializer {
                reflector: self.reflector,
                string_maps: self.string_maps,
                path: path.clone(),
                byte_mark: Some(&mark),
            })
            .map_err(|e| e.at(&path))?;
        self.all_bytes &= mark.get();
        self.items.push(element);
        Ok(())
    }

    fn finish(self) -> Value {
        if self.all_bytes && !self.items.is_empty() {
            let bytes = self
                .items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|b| u8::try_from(b).ok())
                .collect();
            Value::Bytes(bytes)
        } else {
            Value::List(self.items)
        }
    }
}

impl ser::SerializeSeq for SerializeList<'_> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_element<T>(&mut self, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> ArdResult<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTuple for SerializeList<'_> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_element<T>(&mut self, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> ArdResult<Value> {
        Ok(self.finish())
    }
}

impl ser::SerializeTupleStruct for SerializeList<'_> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_field<T>(&mut self, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.push(value)
    }

    fn end(self) -> ArdResult<Value> {
        Ok(self.finish())
    }
}

// ==================== Maps ====================

/// Collects map entries into a map or string map
pub(crate) struct SerializeMap<'r> {
    entries: Vec<(Value, Value)>,
    pending_key: Option<Value>,
    reflector: &'r Reflector,
    string_maps: bool,
    path: Path,
}

impl SerializeMap<'_> {
    fn insert<T>(&mut self, key: Value, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        let path = self.path.append_map(key.key_string());
        let value = value
            .serialize(ValueSerializer::new(
                self.reflector,
                self.string_maps,
                path.clone(),
            ))
            .map_err(|e| e.at(&path))?;
        self.entries.push((key, value));
        Ok(())
    }

    fn finish(self) -> Value {
        if self.string_maps {
            Value::StringMap(stringify_keys(self.entries))
        } else {
            Value::Map(self.entries.into_iter().collect())
        }
    }
}

impl ser::SerializeMap for SerializeMap<'_> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_key<T>(&mut self, key: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        let key = key.serialize(ValueSerializer::new(
            self.reflector,
            self.string_maps,
            self.path.clone(),
        ))?;
        self.pending_key = Some(key);
        Ok(())
    }

    fn serialize_value<T>(&mut self, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| ArdError::reflect_at(&self.path, "map value without a key"))?;
        self.insert(key, value)
    }

    fn end(self) -> ArdResult<Value> {
        Ok(self.finish())
    }
}

// ==================== Structs ====================

/// Collects struct fields under their resolved names
pub(crate) struct SerializeStruct<'r> {
    map: SerializeMap<'r>,
}

impl SerializeStruct<'_> {
    fn field<T>(&mut self, key: &'static str, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        let name = self.map.reflector.field_key(key).into_owned();
        let path = self.map.path.append_field(name.as_str());
        let value = value
            .serialize(ValueSerializer::new(
                self.map.reflector,
                self.map.string_maps,
                path.clone(),
            ))
            .map_err(|e| e.at(&path))?;
        self.map.entries.push((Value::String(name), value));
        Ok(())
    }
}

impl ser::SerializeStruct for SerializeStruct<'_> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.field(key, value)
    }

    fn end(self) -> ArdResult<Value> {
        Ok(self.map.finish())
    }
}

// ==================== Enum variants ====================

/// Wraps a tuple or struct variant's payload as `{variant: payload}`
pub(crate) struct SerializeVariant<S> {
    inner: S,
    variant: &'static str,
    string_maps: bool,
}

/// Single-entry map `{variant: payload}`
fn tagged(variant: &'static str, string_maps: bool, payload: Value) -> Value {
    if string_maps {
        let mut map = StringMap::with_capacity(1);
        map.insert(variant.to_owned(), payload);
        Value::StringMap(map)
    } else {
        let mut map = Map::with_capacity(1);
        map.insert(Value::string(variant), payload);
        Value::Map(map)
    }
}

impl ser::SerializeTupleVariant for SerializeVariant<SerializeList<'_>> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_field<T>(&mut self, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.inner.push(value)
    }

    fn end(self) -> ArdResult<Value> {
        let payload = self.inner.finish();
        Ok(tagged(self.variant, self.string_maps, payload))
    }
}

impl ser::SerializeStructVariant for SerializeVariant<SerializeStruct<'_>> {
    type Ok = Value;
    type Error = ArdError;

    fn serialize_field<T>(&mut self, key: &'static str, value: &T) -> ArdResult<()>
    where
        T: ?Sized + Serialize,
    {
        self.inner.field(key, value)
    }

    fn end(self) -> ArdResult<Value> {
        let payload = self.inner.map.finish();
        Ok(tagged(self.variant, self.string_maps, payload))
    }
}
