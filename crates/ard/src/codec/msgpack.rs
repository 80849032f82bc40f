//! MessagePack
//!
//! Integers keep their signedness: `Integer` is always written with a signed
//! marker (negative fixint, int8 .. int64) and `UnsignedInteger` with an
//! unsigned one (positive fixint, uint8 .. uint64), so each decodes back to
//! the variant it came from. Timestamps use the standard extension type -1
//! in its 12-byte form; the 4- and 8-byte forms are accepted when reading.
//!
//! Maps whose keys are all strings decode to [`Value::StringMap`], all others
//! to [`Value::Map`].

use std::fmt::Display;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use rmp::Marker;
use rmp::encode::{
    write_array_len, write_bin, write_bool, write_ext_meta, write_f64, write_i8, write_i16,
    write_i32, write_i64, write_map_len, write_nfix, write_nil, write_str, write_uint,
};

use crate::codec::{Format, MAX_DEPTH};
use crate::core::{List, Map, Path, StringMap, Timestamp, Value};
use crate::error::{ArdError, ArdResult};

/// Extension type of the standard timestamp
const TIMESTAMP_EXT: i8 = -1;

const NANOS_PER_SECOND: u32 = 1_000_000_000;

/// Decode a single MessagePack object
///
/// # Errors
///
/// Returns a decode error with the byte offset for malformed or truncated
/// input, unknown extension types, nesting deeper than [`MAX_DEPTH`] and
/// trailing bytes.
pub fn decode(bytes: &[u8]) -> ArdResult<Value> {
    let mut reader = Reader::new(bytes);
    let value = reader.object()?;
    if reader.input.has_remaining() {
        return Err(reader.error("trailing bytes after object"));
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
        .map_err(|e| ArdError::decode(Format::MessagePack, format!("invalid base64: {e}")))?;
    decode(&bytes)
}

/// Encode a value
///
/// # Errors
///
/// Returns an unsupported-type error for host values and an encode error
/// for containers longer than `u32::MAX`.
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

/// Check that the input is exactly one well-formed object
///
/// # Errors
///
/// Same as [`decode`].
pub fn validate(bytes: &[u8]) -> ArdResult<()> {
    decode(bytes).map(|_| ())
}

// ==================== Writing ====================

fn write_error(e: impl Display) -> ArdError {
    ArdError::encode(Format::MessagePack, e.to_string())
}

fn length(len: usize) -> ArdResult<u32> {
    u32::try_from(len).map_err(|_| write_error(format!("length {len} exceeds u32::MAX")))
}

/// Smallest signed encoding; never a positive fixint
fn write_signed(out: &mut Vec<u8>, n: i64) -> ArdResult<()> {
    if (-32..0).contains(&n) {
        write_nfix(out, n as i8).map_err(write_error)
    } else if let Ok(n) = i8::try_from(n) {
        write_i8(out, n).map_err(write_error)
    } else if let Ok(n) = i16::try_from(n) {
        write_i16(out, n).map_err(write_error)
    } else if let Ok(n) = i32::try_from(n) {
        write_i32(out, n).map_err(write_error)
    } else {
        write_i64(out, n).map_err(write_error)
    }
}

fn write_timestamp(out: &mut Vec<u8>, t: &Timestamp) -> ArdResult<()> {
    write_ext_meta(out, 12, TIMESTAMP_EXT).map_err(write_error)?;
    // leap seconds are folded into the last nanosecond
    out.put_u32(t.timestamp_subsec_nanos().min(NANOS_PER_SECOND - 1));
    out.put_i64(t.timestamp());
    Ok(())
}

fn write_value(out: &mut Vec<u8>, value: &Value, path: &Path) -> ArdResult<()> {
    match value {
        Value::Null => write_nil(out).map_err(write_error)?,
        Value::Boolean(b) => write_bool(out, *b).map_err(write_error)?,
        Value::Integer(i) => write_signed(out, *i)?,
        Value::UnsignedInteger(u) => {
            write_uint(out, *u).map_err(write_error)?;
        }
        Value::Float(f) => write_f64(out, *f).map_err(write_error)?,
        Value::String(s) => write_str(out, s).map_err(write_error)?,
        Value::Bytes(b) => write_bin(out, b).map_err(write_error)?,
        Value::Timestamp(t) => write_timestamp(out, t)?,
        Value::List(list) => {
            write_array_len(out, length(list.len())?).map_err(write_error)?;
            for (index, element) in list.iter().enumerate() {
                write_value(out, element, &path.append_list(index))?;
            }
        }
        Value::Map(map) => {
            write_map_len(out, length(map.len())?).map_err(write_error)?;
            for (key, element) in map {
                let path = path.append_map(key.key_string());
                write_value(out, key, &path)?;
                write_value(out, element, &path)?;
            }
        }
        Value::StringMap(map) => {
            write_map_len(out, length(map.len())?).map_err(write_error)?;
            for (key, element) in map {
                write_str(out, key).map_err(write_error)?;
                write_value(out, element, &path.append_map(key.as_str()))?;
            }
        }
        Value::Host(host) => return Err(ArdError::unsupported_type(path, host.type_name())),
    }
    Ok(())
}

// ==================== Reading ====================

struct Reader<'a> {
    input: &'a [u8],
    len: usize,
    depth: usize,
}

impl<'a> Reader<'a> {
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

    fn error(&self, message: impl Display) -> ArdError {
        ArdError::decode_at(Format::MessagePack, self.offset(), message)
    }

    fn need(&self, n: usize) -> ArdResult<()> {
        if self.input.remaining() < n {
            Err(self.error("unexpected end of input"))
        } else {
            Ok(())
        }
    }

    fn take(&mut self, len: u32) -> ArdResult<&'a [u8]> {
        let len = len as usize;
        self.need(len)?;
        let (head, rest) = self.input.split_at(len);
        self.input = rest;
        Ok(head)
    }

    fn len_u8(&mut self) -> ArdResult<u32> {
        self.need(1)?;
        Ok(self.input.get_u8().into())
    }

    fn len_u16(&mut self) -> ArdResult<u32> {
        self.need(2)?;
        Ok(self.input.get_u16().into())
    }

    fn len_u32(&mut self) -> ArdResult<u32> {
        self.need(4)?;
        Ok(self.input.get_u32())
    }

    fn nested(&mut self, f: impl FnOnce(&mut Self) -> ArdResult<Value>) -> ArdResult<Value> {
        if self.depth >= MAX_DEPTH {
            return Err(self.error("nesting too deep"));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    fn object(&mut self) -> ArdResult<Value> {
        let start = self.offset();
        self.need(1)?;
        let marker = Marker::from_u8(self.input.get_u8());

        macro_rules! number {
            ($size:expr, $get:ident, $variant:ident) => {{
                self.need($size)?;
                Ok(Value::$variant(self.input.$get().into()))
            }};
        }

        match marker {
            Marker::Null => Ok(Value::Null),
            Marker::True => Ok(Value::Boolean(true)),
            Marker::False => Ok(Value::Boolean(false)),
            Marker::FixPos(n) => Ok(Value::UnsignedInteger(n.into())),
            Marker::U8 => number!(1, get_u8, UnsignedInteger),
            Marker::U16 => number!(2, get_u16, UnsignedInteger),
            Marker::U32 => number!(4, get_u32, UnsignedInteger),
            Marker::U64 => number!(8, get_u64, UnsignedInteger),
            Marker::FixNeg(n) => Ok(Value::Integer(n.into())),
            Marker::I8 => number!(1, get_i8, Integer),
            Marker::I16 => number!(2, get_i16, Integer),
            Marker::I32 => number!(4, get_i32, Integer),
            Marker::I64 => number!(8, get_i64, Integer),
            Marker::F32 => number!(4, get_f32, Float),
            Marker::F64 => number!(8, get_f64, Float),
            Marker::FixStr(len) => self.string(len.into(), start),
            Marker::Str8 => {
                let len = self.len_u8()?;
                self.string(len, start)
            }
            Marker::Str16 => {
                let len = self.len_u16()?;
                self.string(len, start)
            }
            Marker::Str32 => {
                let len = self.len_u32()?;
                self.string(len, start)
            }
            Marker::Bin8 => {
                let len = self.len_u8()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            Marker::Bin16 => {
                let len = self.len_u16()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            Marker::Bin32 => {
                let len = self.len_u32()?;
                Ok(Value::Bytes(self.take(len)?.to_vec()))
            }
            Marker::FixArray(len) => self.nested(|r| r.list(len.into())),
            Marker::Array16 => {
                let len = self.len_u16()?;
                self.nested(|r| r.list(len))
            }
            Marker::Array32 => {
                let len = self.len_u32()?;
                self.nested(|r| r.list(len))
            }
            Marker::FixMap(len) => self.nested(|r| r.map(len.into())),
            Marker::Map16 => {
                let len = self.len_u16()?;
                self.nested(|r| r.map(len))
            }
            Marker::Map32 => {
                let len = self.len_u32()?;
                self.nested(|r| r.map(len))
            }
            Marker::FixExt1 => self.ext(1, start),
            Marker::FixExt2 => self.ext(2, start),
            Marker::FixExt4 => self.ext(4, start),
            Marker::FixExt8 => self.ext(8, start),
            Marker::FixExt16 => self.ext(16, start),
            Marker::Ext8 => {
                let len = self.len_u8()?;
                self.ext(len, start)
            }
            Marker::Ext16 => {
                let len = self.len_u16()?;
                self.ext(len, start)
            }
            Marker::Ext32 => {
                let len = self.len_u32()?;
                self.ext(len, start)
            }
            Marker::Reserved => Err(at(start, "reserved marker 0xc1")),
        }
    }

    fn string(&mut self, len: u32, start: usize) -> ArdResult<Value> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(|s| Value::String(s.to_owned()))
            .map_err(|_| at(start, "string is not valid UTF-8"))
    }

    fn list(&mut self, len: u32) -> ArdResult<Value> {
        let mut list = List::new();
        for _ in 0..len {
            list.push(self.object()?);
        }
        Ok(Value::List(list))
    }

    fn map(&mut self, len: u32) -> ArdResult<Value> {
        let mut entries = Vec::new();
        for _ in 0..len {
            let key = self.object()?;
            entries.push((key, self.object()?));
        }

        if entries.iter().all(|(key, _)| key.is_string()) {
            let map = entries
                .into_iter()
                .filter_map(|(key, value)| match key {
                    Value::String(key) => Some((key, value)),
                    _ => None,
                })
                .collect::<StringMap>();
            Ok(Value::StringMap(map))
        } else {
            Ok(Value::Map(entries.into_iter().collect::<Map>()))
        }
    }

    fn ext(&mut self, len: u32, start: usize) -> ArdResult<Value> {
        self.need(1)?;
        let kind = self.input.get_i8();
        let mut data = self.take(len)?;

        if kind != TIMESTAMP_EXT {
            return Err(at(start, format!("unsupported extension type {kind}")));
        }

        let (seconds, nanos) = match data.len() {
            4 => (i64::from(data.get_u32()), 0),
            8 => {
                let packed = data.get_u64();
                ((packed & 0x3_ffff_ffff) as i64, (packed >> 34) as u32)
            }
            12 => {
                let nanos = data.get_u32();
                (data.get_i64(), nanos)
            }
            other => return Err(at(start, format!("timestamp extension of {other} bytes"))),
        };

        timestamp(seconds, nanos)
            .map(Value::Timestamp)
            .ok_or_else(|| at(start, "timestamp out of range"))
    }
}

fn at(offset: usize, message: impl Display) -> ArdError {
    ArdError::decode_at(Format::MessagePack, offset, message)
}

fn timestamp(seconds: i64, nanos: u32) -> Option<Timestamp> {
    if nanos >= NANOS_PER_SECOND {
        return None;
    }
    DateTime::<Utc>::from_timestamp(seconds, nanos).map(|t| t.fixed_offset())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Value::Integer(5), &[0xd0, 0x05][..])]
    #[case(Value::Integer(-1), &[0xff][..])]
    #[case(Value::Integer(-33), &[0xd0, 0xdf][..])]
    #[case(Value::Integer(300), &[0xd1, 0x01, 0x2c][..])]
    #[case(Value::UnsignedInteger(5), &[0x05][..])]
    #[case(Value::UnsignedInteger(200), &[0xcc, 0xc8][..])]
    #[case(Value::Null, &[0xc0][..])]
    #[case(Value::string("hi"), &[0xa2, b'h', b'i'][..])]
    #[case(Value::Bytes(vec![7]), &[0xc4, 0x01, 0x07][..])]
    fn test_encode_and_decode(#[case] value: Value, #[case] expected: &[u8]) {
        let bytes = encode(&value).unwrap();
        assert_eq!(bytes, expected);
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn test_signedness_survives() {
        let value = Value::List(vec![
            Value::Integer(0),
            Value::UnsignedInteger(0),
            Value::Integer(i64::MAX),
            Value::UnsignedInteger(u64::MAX),
            Value::Integer(i64::MIN),
        ]);
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_map_variants() {
        let mut strings = Map::new();
        strings.insert(Value::string("a"), Value::Float(0.5));
        let decoded = decode(&encode(&Value::Map(strings)).unwrap()).unwrap();
        assert!(matches!(decoded, Value::StringMap(_)));

        let mut mixed = Map::new();
        mixed.insert(Value::string("a"), Value::Null);
        mixed.insert(Value::Integer(1), Value::Null);
        let value = Value::Map(mixed);
        assert_eq!(decode(&encode(&value).unwrap()).unwrap(), value);
    }

    #[test]
    fn test_timestamp_round_trip() {
        let t = DateTime::parse_from_rfc3339("1969-07-20T20:17:40.123456789Z").unwrap();
        let bytes = encode(&Value::Timestamp(t)).unwrap();
        assert_eq!(&bytes[..3], &[0xc7, 12, 0xff]);
        assert_eq!(decode(&bytes).unwrap(), Value::Timestamp(t));
    }

    #[rstest]
    #[case(&[0xd6, 0xff, 0x00, 0x00, 0x00, 0x3c][..], "1970-01-01T00:01:00Z")]
    #[case(
        &[0xd7, 0xff, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, 0x01][..],
        "1970-01-01T00:00:01.000000001Z"
    )]
    fn test_compact_timestamps(#[case] bytes: &[u8], #[case] expected: &str) {
        let expected = DateTime::parse_from_rfc3339(expected).unwrap();
        assert_eq!(decode(bytes).unwrap(), Value::Timestamp(expected));
    }

    #[rstest]
    #[case(&[][..], "unexpected end of input")]
    #[case(&[0x92, 0x01][..], "unexpected end of input")]
    #[case(&[0x01, 0x02][..], "trailing bytes")]
    #[case(&[0xc1][..], "reserved marker")]
    #[case(&[0xd4, 0x05, 0x00][..], "unsupported extension type 5")]
    #[case(&[0xa1, 0xff][..], "not valid UTF-8")]
    fn test_decode_errors(#[case] bytes: &[u8], #[case] message: &str) {
        let error = decode(bytes).unwrap_err();
        assert!(error.is_decode());
        assert!(error.to_string().contains(message), "{error}");
    }

    #[test]
    fn test_depth_limit() {
        let mut bytes = vec![0x91; MAX_DEPTH + 1];
        bytes.push(0xc0);
        assert!(decode(&bytes).is_err());

        let mut ok = vec![0x91; MAX_DEPTH];
        ok.push(0xc0);
        assert!(decode(&ok).is_ok());
    }

    #[test]
    fn test_base64_envelope() {
        let value = Value::List(vec![Value::Integer(-3)]);
        assert_eq!(decode_base64(&encode_base64(&value).unwrap()).unwrap(), value);
    }
}
