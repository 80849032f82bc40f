//! CBOR (RFC 8949)
//!
//! The only format that carries the whole model without loss:
//!
//! | ARD value          | CBOR                                              |
//! |--------------------|---------------------------------------------------|
//! | `Integer`          | major 0 / 1                                       |
//! | `UnsignedInteger`  | major 0 above `i64::MAX`, else tag 2 (bignum)     |
//! | `Float`            | 8-byte float                                      |
//! | `Bytes` / `String` | major 2 / 3                                       |
//! | `List`             | major 4                                           |
//! | `Map`, `StringMap` | major 5                                           |
//! | `Timestamp`        | tag 0 with RFC 3339 text                          |
//!
//! The decoder is more forgiving than the encoder: it accepts
//! indefinite-length items, half and single floats, `undefined`, bignums up
//! to 64 bits and epoch times (tag 1). Other tags are dropped and their
//! content kept.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use tracing::trace;

use crate::codec::{Format, MAX_DEPTH};
use crate::core::key::format_timestamp;
use crate::core::{List, Map, Path, Timestamp, Value};
use crate::error::{ArdError, ArdResult};

// ==================== Constants ====================

const MAJOR_UNSIGNED: u8 = 0;
const MAJOR_NEGATIVE: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;
const MAJOR_TAG: u8 = 6;

const TAG_DATE_TIME: u64 = 0;
const TAG_EPOCH: u64 = 1;
const TAG_POSITIVE_BIGNUM: u64 = 2;
const TAG_NEGATIVE_BIGNUM: u64 = 3;

const FALSE: u8 = 0xf4;
const TRUE: u8 = 0xf5;
const NULL: u8 = 0xf6;
const FLOAT64: u8 = 0xfb;
const BREAK: u8 = 0xff;

const INDEFINITE: u8 = 31;

/// Decode a single CBOR data item
///
/// Maps decode to [`Value::Map`].
///
/// # Errors
///
/// Returns a decode error with the byte offset for malformed or truncated
/// input, nesting deeper than [`MAX_DEPTH`] and trailing bytes.
pub fn decode(bytes: &[u8]) -> ArdResult<Value> {
    let mut decoder = Decoder::new(bytes);
    let value = decoder.item()?;
    if decoder.input.has_remaining() {
        return Err(decoder.error("trailing bytes after data item"));
    }
    Ok(value)
}

/// Decode a base64 envelope
///
/// # Errors
///
/// Returns a decode error for invalid base64, otherwise as [`decode`].
pub fn decode_base64(text: &str) -> ArdResult<Value> {
    let bytes = STANDARD
        .decode(text.trim())
        .map_err(|e| ArdError::decode(Format::Cbor, format!("invalid base64: {e}")))?;
    decode(&bytes)
}

/// Encode a value
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode(value: &Value) -> ArdResult<Vec<u8>> {
    let mut out = Vec::new();
    write_value(&mut out, value, &Path::new())?;
    Ok(out)
}

/// Encode into a base64 envelope
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_base64(value: &Value) -> ArdResult<String> {
    encode(value).map(|bytes| STANDARD.encode(bytes))
}

/// Check that the input is exactly one well-formed data item
///
/// # Errors
///
/// Same as [`decode`].
pub fn validate(bytes: &[u8]) -> ArdResult<()> {
    decode(bytes).map(|_| ())
}

// ==================== Encoding ====================

fn write_head(out: &mut Vec<u8>, major: u8, argument: u64) {
    let major = major << 5;
    if argument < 24 {
        out.put_u8(major | argument as u8);
    } else if let Ok(n) = u8::try_from(argument) {
        out.put_u8(major | 24);
        out.put_u8(n);
    } else if let Ok(n) = u16::try_from(argument) {
        out.put_u8(major | 25);
        out.put_u16(n);
    } else if let Ok(n) = u32::try_from(argument) {
        out.put_u8(major | 26);
        out.put_u32(n);
    } else {
        out.put_u8(major | 27);
        out.put_u64(argument);
    }
}

fn write_text(out: &mut Vec<u8>, text: &str) {
    write_head(out, MAJOR_TEXT, text.len() as u64);
    out.put_slice(text.as_bytes());
}

fn write_value(out: &mut Vec<u8>, value: &Value, path: &Path) -> ArdResult<()> {
    match value {
        Value::Null => out.put_u8(NULL),
        Value::Boolean(b) => out.put_u8(if *b { TRUE } else { FALSE }),
        Value::Integer(i) => {
            if *i >= 0 {
                write_head(out, MAJOR_UNSIGNED, *i as u64);
            } else {
                write_head(out, MAJOR_NEGATIVE, !*i as u64);
            }
        }
        Value::UnsignedInteger(u) => {
            if i64::try_from(*u).is_ok() {
                write_head(out, MAJOR_TAG, TAG_POSITIVE_BIGNUM);
                let be = u.to_be_bytes();
                let skip = be.iter().take_while(|b| **b == 0).count();
                write_head(out, MAJOR_BYTES, (be.len() - skip) as u64);
                out.put_slice(&be[skip..]);
            } else {
                write_head(out, MAJOR_UNSIGNED, *u);
            }
        }
        Value::Float(f) => {
            out.put_u8(FLOAT64);
            out.put_f64(*f);
        }
        Value::String(s) => write_text(out, s),
        Value::Bytes(b) => {
            write_head(out, MAJOR_BYTES, b.len() as u64);
            out.put_slice(b);
        }
        Value::Timestamp(t) => {
            write_head(out, MAJOR_TAG, TAG_DATE_TIME);
            write_text(out, &format_timestamp(t));
        }
        Value::List(list) => {
            write_head(out, MAJOR_ARRAY, list.len() as u64);
            for (index, element) in list.iter().enumerate() {
                write_value(out, element, &path.append_list(index))?;
            }
        }
        Value::Map(map) => {
            write_head(out, MAJOR_MAP, map.len() as u64);
            for (key, element) in map {
                let path = path.append_map(key.key_string());
                write_value(out, key, &path)?;
                write_value(out, element, &path)?;
            }
        }
        Value::StringMap(map) => {
            write_head(out, MAJOR_MAP, map.len() as u64);
            for (key, element) in map {
                write_text(out, key);
                write_value(out, element, &path.append_map(key.as_str()))?;
            }
        }
        Value::Host(host) => return Err(ArdError::unsupported_type(path, host.type_name())),
    }
    Ok(())
}

// ==================== Decoding ====================

struct Decoder<'a> {
    input: &'a [u8],
    len: usize,
    depth: usize,
}

impl<'a> Decoder<'a> {
    fn new(input: &'a [u8]) -> Self {
        Self {
            input,
            len: input.len(),
            depth: 0,
        }
    }

    fn offset(&self) -> usize {
        self.len - self.input.remaining()
    }

    fn error(&self, message: &str) -> ArdError {
        ArdError::decode_at(Format::Cbor, self.offset(), message)
    }

    fn need(&self, n: usize) -> ArdResult<()> {
        if self.input.remaining() < n {
            Err(self.error("unexpected end of input"))
        } else {
            Ok(())
        }
    }

    fn byte(&mut self) -> ArdResult<u8> {
        self.need(1)?;
        Ok(self.input.get_u8())
    }

    fn take(&mut self, len: u64) -> ArdResult<&'a [u8]> {
        let len = usize::try_from(len).map_err(|_| self.error("length too large"))?;
        self.need(len)?;
        let (head, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(head)
    }

    /// Consume a break byte if one is next
    fn at_break(&mut self) -> ArdResult<bool> {
        self.need(1)?;
        if self.input[0] == BREAK {
            self.input.advance(1);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Argument of an initial byte; `None` for indefinite length
    fn argument(&mut self, info: u8) -> ArdResult<Option<u64>> {
        let argument = match info {
            0..=23 => info.into(),
            24 => {
                self.need(1)?;
                self.input.get_u8().into()
            }
            25 => {
                self.need(2)?;
                self.input.get_u16().into()
            }
            26 => {
                self.need(4)?;
                self.input.get_u32().into()
            }
            27 => {
                self.need(8)?;
                self.input.get_u64()
            }
            INDEFINITE => return Ok(None),
            _ => return Err(self.error("reserved additional information")),
        };
        Ok(Some(argument))
    }

    fn definite(&mut self, info: u8) -> ArdResult<u64> {
        self.argument(info)?
            .ok_or_else(|| self.error("indefinite length not allowed here"))
    }

    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> ArdResult<T>) -> ArdResult<T> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn item(&mut self) -> ArdResult<Value> {
        let start = self.offset();
        let initial = self.byte()?;
        let (major, info) = (initial >> 5, initial & 0x1f);

        match major {
            MAJOR_UNSIGNED => {
                let n = self.definite(info)?;
                Ok(i64::try_from(n).map_or(Value::UnsignedInteger(n), Value::Integer))
            }
            MAJOR_NEGATIVE => {
                let n = self.definite(info)?;
                negative(n).ok_or_else(|| at(start, "negative integer out of range"))
            }
            MAJOR_BYTES => self.chunks(MAJOR_BYTES, info).map(Value::Bytes),
            MAJOR_TEXT => {
                let bytes = self.chunks(MAJOR_TEXT, info)?;
                String::from_utf8(bytes)
                    .map(Value::String)
                    .map_err(|_| at(start, "text is not valid UTF-8"))
            }
            MAJOR_ARRAY => self.nested(|d| d.list(info)),
            MAJOR_MAP => self.nested(|d| d.map(info)),
            MAJOR_TAG => {
                let tag = self.definite(info)?;
                self.nested(|d| d.tagged(tag, start))
            }
            // major 7
            _ => self.simple(info, start),
        }
    }

    /// Byte or text string content, joining indefinite-length chunks
    fn chunks(&mut self, major: u8, info: u8) -> ArdResult<Vec<u8>> {
        if let Some(len) = self.argument(info)? {
            return Ok(self.take(len)?.to_vec());
        }

        let mut out = Vec::new();
        while !self.at_break()? {
            let initial = self.byte()?;
            if initial >> 5 != major {
                return Err(self.error("chunk type differs from its string"));
            }
            let len = self.definite(initial & 0x1f)?;
            out.extend_from_slice(self.take(len)?);
        }
        Ok(out)
    }

    fn list(&mut self, info: u8) -> ArdResult<Value> {
        let mut list = List::new();
        match self.argument(info)? {
            Some(len) => {
                for _ in 0..len {
                    list.push(self.item()?);
                }
            }
            None => {
                while !self.at_break()? {
                    list.push(self.item()?);
                }
            }
        }
        Ok(Value::List(list))
    }

    fn map(&mut self, info: u8) -> ArdResult<Value> {
        let mut map = Map::new();
        match self.argument(info)? {
            Some(len) => {
                for _ in 0..len {
                    self.entry(&mut map)?;
                }
            }
            None => {
                while !self.at_break()? {
                    self.entry(&mut map)?;
                }
            }
        }
        Ok(Value::Map(map))
    }

    /// Later duplicates replace earlier entries
    fn entry(&mut self, map: &mut Map) -> ArdResult<()> {
        let start = self.offset();
        let key = self.item()?;
        let value = self.item()?;
        if let Some(previous) = map.insert(key, value) {
            trace!(offset = start, ?previous, "duplicate CBOR map key replaced");
        }
        Ok(())
    }

    fn tagged(&mut self, tag: u64, start: usize) -> ArdResult<Value> {
        let content = self.item()?;
        match (tag, content) {
            (TAG_DATE_TIME, Value::String(text)) => DateTime::parse_from_rfc3339(&text)
                .map(Value::Timestamp)
                .map_err(|e| at(start, &format!("invalid date/time {text:?}: {e}"))),
            (TAG_EPOCH, content) => epoch(&content)
                .map(Value::Timestamp)
                .ok_or_else(|| at(start, "invalid epoch time")),
            (TAG_POSITIVE_BIGNUM, Value::Bytes(b)) => bignum(&b)
                .map(Value::UnsignedInteger)
                .ok_or_else(|| at(start, "bignum wider than 64 bits")),
            (TAG_NEGATIVE_BIGNUM, Value::Bytes(b)) => bignum(&b)
                .and_then(negative)
                .ok_or_else(|| at(start, "negative bignum out of range")),
            (TAG_DATE_TIME..=TAG_NEGATIVE_BIGNUM, _) => {
                Err(at(start, &format!("unexpected content for tag {tag}")))
            }
            (tag, content) => {
                trace!(tag, offset = start, "dropping unsupported CBOR tag");
                Ok(content)
            }
        }
    }

    fn simple(&mut self, info: u8, start: usize) -> ArdResult<Value> {
        match info {
            20 => Ok(Value::Boolean(false)),
            21 => Ok(Value::Boolean(true)),
            // null and undefined
            22 | 23 => Ok(Value::Null),
            25 => {
                self.need(2)?;
                Ok(Value::Float(half(self.input.get_u16())))
            }
            26 => {
                self.need(4)?;
                Ok(Value::Float(self.input.get_f32().into()))
            }
            27 => {
                self.need(8)?;
                Ok(Value::Float(self.input.get_f64()))
            }
            INDEFINITE => Err(at(start, "unexpected break")),
            _ => Err(at(start, &format!("unsupported simple value {info}"))),
        }
    }
}

fn at(offset: usize, message: &str) -> ArdError {
    ArdError::decode_at(Format::Cbor, offset, message)
}

/// `-1 - n` when it fits an `i64`
fn negative(n: u64) -> Option<Value> {
    i64::try_from(n).ok().map(|n| Value::Integer(-1 - n))
}

fn bignum(bytes: &[u8]) -> Option<u64> {
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    let digits = &bytes[skip..];
    (digits.len() <= 8).then(|| digits.iter().fold(0u64, |n, b| (n << 8) | u64::from(*b)))
}

fn epoch(content: &Value) -> Option<Timestamp> {
    let utc = match content {
        Value::Integer(seconds) => DateTime::<Utc>::from_timestamp(*seconds, 0),
        Value::UnsignedInteger(seconds) => {
            DateTime::<Utc>::from_timestamp(i64::try_from(*seconds).ok()?, 0)
        }
        Value::Float(f) if f.is_finite() => {
            let seconds = f.floor();
            let nanos = (((f - seconds) * 1e9).round() as u32).min(999_999_999);
            DateTime::<Utc>::from_timestamp(seconds as i64, nanos)
        }
        _ => None,
    };
    utc.map(|t| t.fixed_offset())
}

/// IEEE 754 half precision
fn half(bits: u16) -> f64 {
    let sign = if bits & 0x8000 == 0 { 1.0 } else { -1.0 };
    let exponent = i32::from((bits >> 10) & 0x1f);
    let mantissa = f64::from(bits & 0x3ff);

    let magnitude = match exponent {
        0 => mantissa * 2f64.powi(-24),
        31 if mantissa == 0.0 => f64::INFINITY,
        31 => f64::NAN,
        _ => (1.0 + mantissa / 1024.0) * 2f64.powi(exponent - 15),
    };
    sign * magnitude
}
