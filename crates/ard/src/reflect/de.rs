//! Packing: a serde `Deserializer` that reads ARD values

use serde::de::value::{BorrowedStrDeserializer, SeqDeserializer};
use serde::de::{
    self, DeserializeSeed, EnumAccess, IntoDeserializer, MapAccess, SeqAccess, Unexpected,
    VariantAccess, Visitor,
};

use crate::core::key::format_timestamp;
use crate::core::{Path, Value};
use crate::error::{ArdError, ArdResult};
use crate::reflect::{FieldTable, Reflector, TIMESTAMP_TOKEN};

static NULL: Value = Value::Null;

/// Deserializer over a borrowed value
pub(crate) struct ValueDeserializer<'a> {
    value: &'a Value,
    reflector: &'a Reflector,
    path: Path,
}

impl<'a> ValueDeserializer<'a> {
    pub(crate) fn new(value: &'a Value, reflector: &'a Reflector, path: Path) -> Self {
        Self {
            value,
            reflector,
            path,
        }
    }

    /// Null that should read as the target's zero value
    fn zero_null(&self) -> bool {
        self.value.is_null() && self.reflector.nil_is_zero()
    }

    fn unexpected(&self) -> Unexpected<'_> {
        match self.value {
            Value::Null => Unexpected::Unit,
            Value::Boolean(b) => Unexpected::Bool(*b),
            Value::Integer(i) => Unexpected::Signed(*i),
            Value::UnsignedInteger(u) => Unexpected::Unsigned(*u),
            Value::Float(f) => Unexpected::Float(*f),
            Value::String(s) => Unexpected::Str(s),
            Value::Bytes(b) => Unexpected::Bytes(b),
            Value::Timestamp(_) => Unexpected::Other("timestamp"),
            Value::List(_) => Unexpected::Seq,
            Value::Map(_) | Value::StringMap(_) => Unexpected::Map,
            Value::Host(_) => Unexpected::Other("host value"),
        }
    }

    fn invalid_type(&self, expected: &dyn de::Expected) -> ArdError {
        if let Value::Host(_) = self.value {
            return self.host_error();
        }
        ArdError::reflect_at(
            &self.path,
            format!("invalid type: {}, expected {expected}", self.unexpected()),
        )
    }

    fn host_error(&self) -> ArdError {
        ArdError::reflect_at(
            &self.path,
            "host value must be reflected before packing; use ops::valid_copy",
        )
    }

    fn visit_map<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::Map(map) => visitor.visit_map(MapDeserializer::new(
                map.iter().map(|(k, v)| (Key::Value(k), v)),
                self.reflector,
                self.path,
            )),
            Value::StringMap(map) => visitor.visit_map(MapDeserializer::new(
                map.iter().map(|(k, v)| (Key::Str(k), v)),
                self.reflector,
                self.path,
            )),
            _ => visitor.visit_map(MapDeserializer::new(
                std::iter::empty(),
                self.reflector,
                self.path,
            )),
        };
        result.map_err(|e| e.at(&path))
    }

    fn visit_list<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::List(list) => visitor.visit_seq(ListDeserializer {
                iter: list.iter().enumerate(),
                reflector: self.reflector,
                path: self.path,
            }),
            Value::Bytes(bytes) => {
                let mut seq = SeqDeserializer::<_, ArdError>::new(bytes.iter().copied());
                let out = visitor.visit_seq(&mut seq)?;
                seq.end()?;
                Ok(out)
            }
            _ => visitor.visit_seq(SeqDeserializer::<_, ArdError>::new(std::iter::empty::<u8>())),
        };
        result.map_err(|e| e.at(&path))
    }

    fn signed<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::Integer(i) => visitor.visit_i64(*i),
            Value::UnsignedInteger(u) => visitor.visit_u64(*u),
            Value::Float(f) => match truncate_signed(*f) {
                Some(i) => visitor.visit_i64(i),
                None => Err(ArdError::reflect(format!("float {f} out of integer range"))),
            },
            _ if self.zero_null() => visitor.visit_i64(0),
            _ => Err(self.invalid_type(&visitor)),
        };
        result.map_err(|e| e.at(&path))
    }

    fn unsigned<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::Integer(i) => visitor.visit_i64(*i),
            Value::UnsignedInteger(u) => visitor.visit_u64(*u),
            Value::Float(f) => match truncate_unsigned(*f) {
                Some(u) => visitor.visit_u64(u),
                None => Err(ArdError::reflect(format!(
                    "float {f} out of unsigned integer range"
                ))),
            },
            _ if self.zero_null() => visitor.visit_u64(0),
            _ => Err(self.invalid_type(&visitor)),
        };
        result.map_err(|e| e.at(&path))
    }

    fn float<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        #[allow(clippy::cast_precision_loss)]
        let result = match value {
            Value::Float(f) => visitor.visit_f64(*f),
            Value::Integer(i) => visitor.visit_f64(*i as f64),
            Value::UnsignedInteger(u) => visitor.visit_f64(*u as f64),
            _ if self.zero_null() => visitor.visit_f64(0.0),
            _ => Err(self.invalid_type(&visitor)),
        };
        result.map_err(|e| e.at(&path))
    }

    fn string<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Timestamp(t) => visitor.visit_string(format_timestamp(t)),
            _ if self.zero_null() => visitor.visit_borrowed_str(""),
            _ => Err(self.invalid_type(&visitor)),
        };
        result.map_err(|e| e.at(&path))
    }

    fn byte_buf<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::Bytes(b) => visitor.visit_borrowed_bytes(b),
            Value::List(_) => return self.visit_list(visitor),
            Value::Null => visitor.visit_borrowed_bytes(&[]),
            _ => Err(self.invalid_type(&visitor)),
        };
        result.map_err(|e| e.at(&path))
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn truncate_signed(f: f64) -> Option<i64> {
    let t = f.trunc();
    (t.is_finite() && t >= i64::MIN as f64 && t < i64::MAX as f64).then_some(t as i64)
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn truncate_unsigned(f: f64) -> Option<u64> {
    let t = f.trunc();
    (t.is_finite() && t >= 0.0 && t < u64::MAX as f64).then_some(t as u64)
}

impl<'a> de::Deserializer<'a> for ValueDeserializer<'a> {
    type Error = ArdError;

    fn deserialize_any<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let value = self.value;
        let result = match value {
            Value::Null => visitor.visit_unit(),
            Value::Boolean(b) => visitor.visit_bool(*b),
            Value::Integer(i) => visitor.visit_i64(*i),
            Value::UnsignedInteger(u) => visitor.visit_u64(*u),
            Value::Float(f) => visitor.visit_f64(*f),
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Bytes(b) => visitor.visit_borrowed_bytes(b),
            Value::Timestamp(t) => visitor.visit_map(TimestampDeserializer {
                text: Some(format_timestamp(t)),
            }),
            Value::List(_) => return self.visit_list(visitor),
            Value::Map(_) | Value::StringMap(_) => return self.visit_map(visitor),
            Value::Host(_) => Err(self.host_error()),
        };
        result.map_err(|e| e.at(&path))
    }

    fn deserialize_bool<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let value = self.value;
        match value {
            Value::Boolean(b) => visitor.visit_bool(*b),
            _ if self.zero_null() => visitor.visit_bool(false),
            _ => Err(self.invalid_type(&visitor)),
        }
        .map_err(|e| e.at(&self.path))
    }

    fn deserialize_i8<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.signed(visitor)
    }

    fn deserialize_i16<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.signed(visitor)
    }

    fn deserialize_i32<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.signed(visitor)
    }

    fn deserialize_i64<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.signed(visitor)
    }

    fn deserialize_i128<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.signed(visitor)
    }

    fn deserialize_u8<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.unsigned(visitor)
    }

    fn deserialize_u16<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.unsigned(visitor)
    }

    fn deserialize_u32<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.unsigned(visitor)
    }

    fn deserialize_u64<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.unsigned(visitor)
    }

    fn deserialize_u128<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.unsigned(visitor)
    }

    fn deserialize_f32<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.float(visitor)
    }

    fn deserialize_f64<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.float(visitor)
    }

    fn deserialize_char<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.string(visitor)
    }

    fn deserialize_str<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.string(visitor)
    }

    fn deserialize_string<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.string(visitor)
    }

    fn deserialize_bytes<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.byte_buf(visitor)
    }

    fn deserialize_byte_buf<V: Visitor<'a>>(self, visitor: V) -> ArdResult<V::Value> {
        self.byte_buf(visitor)
    }

    fn deserialize_option<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let value = self.value;
        match value {
            Value::Null => visitor.visit_none(),
            _ => visitor.visit_some(self),
        }
    }

    fn deserialize_unit<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let value = self.value;
        match value {
            Value::Null => visitor.visit_unit(),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_unit_struct<V>(self, _name: &'static str, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        self.deserialize_unit(visitor)
    }

    fn deserialize_newtype_struct<V>(self, name: &'static str, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        if name == TIMESTAMP_TOKEN {
            return self.string(visitor);
        }
        visitor.visit_newtype_struct(self)
    }

    fn deserialize_seq<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let value = self.value;
        match value {
            // lists are nullable: null packs as an empty one
            Value::List(_) | Value::Bytes(_) | Value::Null => self.visit_list(visitor),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_tuple<V>(self, _len: usize, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_tuple_struct<V>(
        self,
        _name: &'static str,
        _len: usize,
        visitor: V,
    ) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        self.deserialize_seq(visitor)
    }

    fn deserialize_map<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let value = self.value;
        match value {
            Value::Map(_) | Value::StringMap(_) | Value::Null => self.visit_map(visitor),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_struct<V>(
        self,
        name: &'static str,
        fields: &'static [&'static str],
        visitor: V,
    ) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let path = self.path.clone();
        let table = self.reflector.field_table(name, fields);
        let access = match self.value {
            Value::Map(map) => StructDeserializer::new(
                Box::new(map.iter().map(|(k, v)| (Key::Value(k), v))),
                table,
                name,
                self.reflector,
                self.path,
            ),
            Value::StringMap(map) => StructDeserializer::new(
                Box::new(map.iter().map(|(k, v)| (Key::Str(k), v))),
                table,
                name,
                self.reflector,
                self.path,
            ),
            // every field reads as null, which then packs as its zero
            _ if self.zero_null() => StructDeserializer::new(
                Box::new(fields.iter().map(|f| (Key::Str(f), &NULL))),
                table,
                name,
                self.reflector,
                self.path,
            ),
            _ => return Err(self.invalid_type(&visitor)),
        };
        visitor.visit_map(access).map_err(|e| e.at(&path))
    }

    fn deserialize_enum<V>(
        self,
        name: &'static str,
        _variants: &'static [&'static str],
        visitor: V,
    ) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let (variant, payload) = match self.value {
            Value::String(s) => (s.as_str(), None),
            Value::Map(map) if map.len() == 1 => match map.iter().next() {
                Some((Value::String(k), v)) => (k.as_str(), Some(v)),
                _ => return Err(self.invalid_type(&"enum variant name")),
            },
            Value::StringMap(map) if map.len() == 1 => match map.iter().next() {
                Some((k, v)) => (k.as_str(), Some(v)),
                None => return Err(self.invalid_type(&"enum variant name")),
            },
            _ => return Err(self.invalid_type(&visitor)),
        };

        let path = self.path.clone();
        visitor
            .visit_enum(EnumDeserializer {
                enum_name: name,
                variant,
                payload,
                reflector: self.reflector,
                path: self.path.append_field(variant),
            })
            .map_err(|e| e.at(&path))
    }

    fn deserialize_identifier<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        let value = self.value;
        match value {
            Value::String(s) => visitor.visit_borrowed_str(s),
            Value::Integer(i) => visitor.visit_i64(*i),
            Value::UnsignedInteger(u) => visitor.visit_u64(*u),
            _ => Err(self.invalid_type(&visitor)),
        }
    }

    fn deserialize_ignored_any<V>(self, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        visitor.visit_unit()
    }
}

// ==================== Lists ====================

struct ListDeserializer<'a, I> {
    iter: I,
    reflector: &'a Reflector,
    path: Path,
}

impl<'a, I> SeqAccess<'a> for ListDeserializer<'a, I>
where
    I: Iterator<Item = (usize, &'a Value)> + ExactSizeIterator,
{
    type Error = ArdError;

    fn next_element_seed<T>(&mut self, seed: T) -> ArdResult<Option<T::Value>>
    where
        T: DeserializeSeed<'a>,
    {
        match self.iter.next() {
            Some((index, value)) => {
                let path = self.path.append_list(index);
                seed.deserialize(ValueDeserializer::new(value, self.reflector, path.clone()))
                    .map(Some)
                    .map_err(|e| e.at(&path))
            }
            None => Ok(None),
        }
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.iter.len())
    }
}

// ==================== Maps ====================

/// Map key as stored: a value or a plain string
#[derive(Clone, Copy)]
enum Key<'a> {
    Value(&'a Value),
    Str(&'a str),
}

impl Key<'_> {
    fn text(&self) -> std::borrow::Cow<'_, str> {
        match self {
            Key::Value(v) => v.key_string(),
            Key::Str(s) => std::borrow::Cow::Borrowed(s),
        }
    }
}

struct MapDeserializer<'a, I> {
    iter: I,
    pending: Option<(Key<'a>, &'a Value)>,
    reflector: &'a Reflector,
    path: Path,
}

impl<'a, I> MapDeserializer<'a, I> {
    fn new(iter: I, reflector: &'a Reflector, path: Path) -> Self {
        Self {
            iter,
            pending: None,
            reflector,
            path,
        }
    }
}

impl<'a, I> MapAccess<'a> for MapDeserializer<'a, I>
where
    I: Iterator<Item = (Key<'a>, &'a Value)>,
{
    type Error = ArdError;

    fn next_key_seed<K>(&mut self, seed: K) -> ArdResult<Option<K::Value>>
    where
        K: DeserializeSeed<'a>,
    {
        let Some((key, value)) = self.iter.next() else {
            return Ok(None);
        };
        self.pending = Some((key, value));
        match key {
            Key::Value(k) => seed
                .deserialize(ValueDeserializer::new(k, self.reflector, self.path.clone()))
                .map(Some),
            Key::Str(s) => seed.deserialize(BorrowedStrDeserializer::new(s)).map(Some),
        }
    }

    fn next_value_seed<V>(&mut self, seed: V) -> ArdResult<V::Value>
    where
        V: DeserializeSeed<'a>,
    {
        let (key, value) = self
            .pending
            .take()
            .ok_or_else(|| ArdError::reflect_at(&self.path, "map value requested before key"))?;
        let path = self.path.append_map(key.text());
        seed.deserialize(ValueDeserializer::new(value, self.reflector, path.clone()))
            .map_err(|e| e.at(&path))
    }

    fn size_hint(&self) -> Option<usize> {
        None
    }
}

// ==================== Structs ====================

type Entries<'a> = Box<dyn Iterator<Item = (Key<'a>, &'a Value)> + 'a>;

struct StructDeserializer<'a> {
    entries: Entries<'a>,
    pending: Option<(&'static str, &'a Value)>,
    table: std::sync::Arc<FieldTable>,
    type_name: &'static str,
    reflector: &'a Reflector,
    path: Path,
}

impl<'a> StructDeserializer<'a> {
    fn new(
        entries: Entries<'a>,
        table: std::sync::Arc<FieldTable>,
        type_name: &'static str,
        reflector: &'a Reflector,
        path: Path,
    ) -> Self {
        Self {
            entries,
            pending: None,
            table,
            type_name,
            reflector,
            path,
        }
    }
}

impl<'a> MapAccess<'a> for StructDeserializer<'a> {
    type Error = ArdError;

    fn next_key_seed<K>(&mut self, seed: K) -> ArdResult<Option<K::Value>>
    where
        K: DeserializeSeed<'a>,
    {
        for (key, value) in self.entries.by_ref() {
            let text = key.text();
            match self.table.resolve(&text) {
                Some(field) => {
                    self.pending = Some((field, value));
                    return seed.deserialize(BorrowedStrDeserializer::new(field)).map(Some);
                }
                None if self.reflector.ignores_missing_struct_fields() => {
                    tracing::trace!(key = %text, type_name = self.type_name, "skipping unknown field");
                }
                None => {
                    return Err(ArdError::reflect_at(
                        &self.path,
                        format!("unknown field {text:?} for {}", self.type_name),
                    ));
                }
            }
        }
        Ok(None)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> ArdResult<V::Value>
    where
        V: DeserializeSeed<'a>,
    {
        let (field, value) = self
            .pending
            .take()
            .ok_or_else(|| ArdError::reflect_at(&self.path, "field value requested before key"))?;
        let path = self.path.append_field(self.reflector.field_key(field));
        seed.deserialize(ValueDeserializer::new(value, self.reflector, path.clone()))
            .map_err(|e| e.at(&path))
    }
}

// ==================== Enums ====================

struct EnumDeserializer<'a> {
    enum_name: &'static str,
    variant: &'a str,
    payload: Option<&'a Value>,
    reflector: &'a Reflector,
    path: Path,
}

impl<'a> EnumAccess<'a> for EnumDeserializer<'a> {
    type Error = ArdError;
    type Variant = Self;

    fn variant_seed<V>(self, seed: V) -> ArdResult<(V::Value, Self)>
    where
        V: DeserializeSeed<'a>,
    {
        let variant = seed.deserialize(BorrowedStrDeserializer::<ArdError>::new(self.variant))?;
        Ok((variant, self))
    }
}

impl<'a> VariantAccess<'a> for EnumDeserializer<'a> {
    type Error = ArdError;

    fn unit_variant(self) -> ArdResult<()> {
        match self.payload {
            None | Some(Value::Null) => Ok(()),
            Some(_) => Err(ArdError::reflect_at(
                &self.path,
                format!("unit variant {:?} takes no payload", self.variant),
            )),
        }
    }

    fn newtype_variant_seed<T>(self, seed: T) -> ArdResult<T::Value>
    where
        T: DeserializeSeed<'a>,
    {
        seed.deserialize(ValueDeserializer::new(
            self.payload.unwrap_or(&NULL),
            self.reflector,
            self.path,
        ))
    }

    fn tuple_variant<V>(self, _len: usize, visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        de::Deserializer::deserialize_seq(
            ValueDeserializer::new(self.payload.unwrap_or(&NULL), self.reflector, self.path),
            visitor,
        )
    }

    fn struct_variant<V>(self, fields: &'static [&'static str], visitor: V) -> ArdResult<V::Value>
    where
        V: Visitor<'a>,
    {
        de::Deserializer::deserialize_struct(
            ValueDeserializer::new(self.payload.unwrap_or(&NULL), self.reflector, self.path),
            self.enum_name,
            fields,
            visitor,
        )
    }
}

// ==================== Timestamps ====================

/// Presents a timestamp to self-describing visitors as the private
/// single-entry map that [`Value`]'s visitor recognises
struct TimestampDeserializer {
    text: Option<String>,
}

impl<'a> MapAccess<'a> for TimestampDeserializer {
    type Error = ArdError;

    fn next_key_seed<K>(&mut self, seed: K) -> ArdResult<Option<K::Value>>
    where
        K: DeserializeSeed<'a>,
    {
        if self.text.is_none() {
            return Ok(None);
        }
        seed.deserialize(BorrowedStrDeserializer::new(TIMESTAMP_TOKEN))
            .map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> ArdResult<V::Value>
    where
        V: DeserializeSeed<'a>,
    {
        let text = self
            .text
            .take()
            .ok_or_else(|| ArdError::reflect("timestamp value requested twice"))?;
        seed.deserialize(text.into_deserializer())
    }
}
