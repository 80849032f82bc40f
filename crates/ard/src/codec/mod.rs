//! Format codecs and the format-agnostic facade
//!
//! Each submodule reads and writes one wire format. The functions here pick
//! the codec by [`Format`], normalize decoded trees to [`Value::Map`] and
//! make sure nothing but pure ARD reaches an encoder.
//!
//! ```rust
//! use ard::codec::{self, EncodeOptions, Format};
//! use ard::{Reflector, Value};
//!
//! let decoded = codec::decode(b"name: ard\nsize: 3\n", Format::Yaml, false).unwrap();
//! assert_eq!(decoded.value.get_key("size"), Some(&Value::Integer(3)));
//!
//! let cbor = codec::encode(&decoded.value, Format::Cbor, &Reflector::default(), &EncodeOptions::default())
//!     .unwrap();
//! let back = codec::decode(&cbor, Format::Cbor, false).unwrap();
//! assert_eq!(back.value, decoded.value);
//! ```

pub mod cbor;
pub mod json;
pub mod msgpack;
#[cfg(feature = "template")]
mod template;
pub mod xjson;
pub mod xml;
pub mod yaml;

use std::fmt::{self, Display, Formatter};
use std::io::Read;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{PathElement, Value};
use crate::error::{ArdError, ArdResult};
use crate::ops::{normalize_maps, valid_copy};
use crate::reflect::Reflector;

#[cfg(feature = "template")]
pub use template::decode_template;

/// Deepest container nesting the decoders accept
pub const MAX_DEPTH: usize = 512;

// ============================================================================
// FORMAT
// ============================================================================

/// Supported wire formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// YAML 1.2
    Yaml,
    /// Plain JSON (lossy for integers, bytes and complex keys)
    Json,
    /// JSON with `$ard.*` type annotations
    XJson,
    /// Typed XML elements
    Xml,
    /// CBOR (RFC 8949)
    Cbor,
    /// MessagePack
    MessagePack,
}

impl Format {
    /// Every supported format
    pub const ALL: [Self; 6] = [
        Self::Yaml,
        Self::Json,
        Self::XJson,
        Self::Xml,
        Self::Cbor,
        Self::MessagePack,
    ];

    /// Identifier used by [`Display`] and [`FromStr`]
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json => "json",
            Self::XJson => "xjson",
            Self::Xml => "xml",
            Self::Cbor => "cbor",
            Self::MessagePack => "messagepack",
        }
    }

    /// Is this a binary format? Binary formats travel as base64 in text
    #[inline]
    #[must_use]
    pub const fn is_binary(self) -> bool {
        matches!(self, Self::Cbor | Self::MessagePack)
    }

    /// Conventional file extension
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Json | Self::XJson => "json",
            Self::Xml => "xml",
            Self::Cbor => "cbor",
            Self::MessagePack => "msgpack",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Format {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| ArdError::unsupported_format(s))
    }
}

// ============================================================================
// LOCATOR
// ============================================================================

/// 1-based position in a source document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    /// Line, starting at 1
    pub line: usize,
    /// Column, starting at 1
    pub column: usize,
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Maps a path in a decoded tree back to its source position
pub trait Locator: fmt::Debug + Send + Sync {
    /// Position of the value at `path`, or of the deepest node on the way
    fn locate(&self, path: &[PathElement]) -> Option<Location>;
}

// ============================================================================
// OPTIONS
// ============================================================================

/// Encoder options
///
/// Deserializable so applications can carry it in their own configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Indentation width for pretty output (JSON, extended JSON, XML)
    pub indent: Option<usize>,
    /// Write explicit type tags (YAML)
    pub verbose: bool,
}

impl EncodeOptions {
    /// Options with pretty output
    #[must_use]
    pub fn indented(indent: usize) -> Self {
        Self {
            indent: Some(indent),
            ..Self::default()
        }
    }

    /// Enable explicit type tags
    #[must_use]
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

// ============================================================================
// FACADE
// ============================================================================

/// A decoded tree, optionally with the locator for its source
#[derive(Debug)]
pub struct Decoded {
    /// The decoded value, using [`Value::Map`] for every map
    pub value: Value,
    /// Source positions, when requested and supported by the format
    pub locator: Option<Box<dyn Locator>>,
}

/// Decode bytes of the given format
///
/// A locator is produced only for YAML, and only when `locate` is set.
///
/// # Errors
///
/// Returns [`ArdError::Decode`] when the input is not well-formed.
#[tracing::instrument(skip_all, fields(format = %format))]
pub fn decode(bytes: &[u8], format: Format, locate: bool) -> ArdResult<Decoded> {
    debug!(len = bytes.len(), locate, "decoding");

    let (value, locator) = match format {
        Format::Yaml if locate => {
            let (value, locator) = yaml::decode_with_locator(bytes)?;
            (value, Some(Box::new(locator) as Box<dyn Locator>))
        }
        Format::Yaml => (yaml::decode(bytes)?, None),
        Format::Json => (json::decode(bytes)?, None),
        Format::XJson => (xjson::decode(bytes)?, None),
        Format::Xml => (xml::decode(bytes)?, None),
        Format::Cbor => (cbor::decode(bytes)?, None),
        Format::MessagePack => (msgpack::decode(bytes)?, None),
    };

    let (value, _) = normalize_maps(value);
    Ok(Decoded { value, locator })
}

/// Decode text; binary formats are expected as a base64 envelope
///
/// # Errors
///
/// Returns [`ArdError::Decode`] when the input (or its envelope) is not
/// well-formed.
pub fn decode_text(text: &str, format: Format, locate: bool) -> ArdResult<Decoded> {
    if format.is_binary() {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| ArdError::decode(format, format!("invalid base64: {e}")))?;
        decode(&bytes, format, locate)
    } else {
        decode(text.as_bytes(), format, locate)
    }
}

/// Read a whole stream and decode it
///
/// # Errors
///
/// Returns [`ArdError::Io`] when reading fails, otherwise as [`decode`].
pub fn read<R: Read>(mut reader: R, format: Format, locate: bool) -> ArdResult<Decoded> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode(&bytes, format, locate)
}

/// Encode a value in the given format
///
/// Host values are reflected first, so the encoder only ever sees pure ARD.
///
/// # Errors
///
/// Returns the reflector's error for host values that cannot be reflected,
/// or [`ArdError::Encode`] when the format cannot represent the value.
#[tracing::instrument(skip_all, fields(format = %format))]
pub fn encode(
    value: &Value,
    format: Format,
    reflector: &Reflector,
    options: &EncodeOptions,
) -> ArdResult<Vec<u8>> {
    let value = valid_copy(value, reflector)?;

    let bytes = match format {
        Format::Yaml => yaml::encode_with(&value, options)?.into_bytes(),
        Format::Json => json::encode_with(&value, options.indent)?,
        Format::XJson => xjson::encode_with(&value, options.indent)?,
        Format::Xml => xml::encode_with(&value, options.indent)?,
        Format::Cbor => cbor::encode(&value)?,
        Format::MessagePack => msgpack::encode(&value)?,
    };

    debug!(len = bytes.len(), "encoded");
    Ok(bytes)
}

/// Encode a value as text; binary formats are wrapped in base64
///
/// # Errors
///
/// Same as [`encode`].
pub fn encode_text(
    value: &Value,
    format: Format,
    reflector: &Reflector,
    options: &EncodeOptions,
) -> ArdResult<String> {
    let bytes = encode(value, format, reflector, options)?;
    if format.is_binary() {
        Ok(STANDARD.encode(bytes))
    } else {
        String::from_utf8(bytes).map_err(|e| ArdError::encode(format, e.to_string()))
    }
}

/// Encode and decode again
///
/// Shows exactly what a value looks like after a trip through the format.
///
/// # Errors
///
/// Same as [`encode`] and [`decode`].
pub fn roundtrip(value: &Value, format: Format, reflector: &Reflector) -> ArdResult<Value> {
    let bytes = encode(value, format, reflector, &EncodeOptions::default())?;
    Ok(decode(&bytes, format, false)?.value)
}

/// Check that bytes are well-formed without building a tree
///
/// # Errors
///
/// Returns [`ArdError::Decode`] describing the first problem found.
pub fn validate(bytes: &[u8], format: Format) -> ArdResult<()> {
    debug!(format = %format, len = bytes.len(), "validating");
    match format {
        Format::Yaml => yaml::validate(bytes),
        Format::Json | Format::XJson => json::validate(bytes),
        Format::Xml => xml::validate(bytes),
        Format::Cbor => cbor::validate(bytes),
        Format::MessagePack => msgpack::validate(bytes),
    }
}

/// Input as UTF-8 text
pub(crate) fn utf8(bytes: &[u8], format: Format) -> ArdResult<&str> {
    std::str::from_utf8(bytes).map_err(|e| ArdError::decode(format, format!("invalid UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::core::{Map, StringMap};

    fn sample() -> Value {
        let mut inner = StringMap::new();
        inner.insert("enabled".to_owned(), Value::Boolean(true));
        inner.insert("ratio".to_owned(), Value::Float(0.25));

        let mut map = Map::new();
        map.insert(Value::string("name"), Value::string("ard"));
        map.insert(
            Value::string("list"),
            Value::List(vec![Value::string("a"), Value::Null]),
        );
        map.insert(Value::string("inner"), Value::StringMap(inner));
        Value::Map(map)
    }

    #[rstest]
    #[case("yaml", Format::Yaml)]
    #[case("json", Format::Json)]
    #[case("xjson", Format::XJson)]
    #[case("xml", Format::Xml)]
    #[case("cbor", Format::Cbor)]
    #[case("messagepack", Format::MessagePack)]
    fn test_format_names(#[case] name: &str, #[case] format: Format) {
        assert_eq!(name.parse::<Format>().unwrap(), format);
        assert_eq!(format.to_string(), name);
        assert_eq!(
            serde_json::to_string(&format).unwrap(),
            format!("\"{name}\"")
        );
    }

    #[test]
    fn test_unknown_format() {
        let error = "toml".parse::<Format>().unwrap_err();
        assert!(matches!(error, ArdError::UnsupportedFormat { .. }));
    }

    #[rstest]
    #[case(Format::Yaml)]
    #[case(Format::Json)]
    #[case(Format::XJson)]
    #[case(Format::Xml)]
    #[case(Format::Cbor)]
    #[case(Format::MessagePack)]
    fn test_roundtrip_normalizes_to_maps(#[case] format: Format) {
        let reflector = Reflector::default();
        let value = sample();

        let back = roundtrip(&value, format, &reflector).unwrap();
        let (expected, _) = normalize_maps(value);
        assert_eq!(back, expected, "format {format}");
    }

    #[rstest]
    #[case(Format::Cbor)]
    #[case(Format::MessagePack)]
    #[case(Format::Json)]
    fn test_text_envelope(#[case] format: Format) {
        let reflector = Reflector::default();
        let text = encode_text(&sample(), format, &reflector, &EncodeOptions::default()).unwrap();
        let decoded = decode_text(&text, format, false).unwrap();
        assert_eq!(decoded.value, normalize_maps(sample()).0);
    }

    #[test]
    fn test_locator_only_for_yaml() {
        let yaml = decode(b"a: 1\n", Format::Yaml, true).unwrap();
        assert!(yaml.locator.is_some());

        let json = decode(b"{\"a\": 1}", Format::Json, true).unwrap();
        assert!(json.locator.is_none());
    }

    #[test]
    fn test_encode_reflects_host_values() {
        let value = Value::List(vec![Value::host(vec!["x".to_owned()])]);
        let bytes = encode(
            &value,
            Format::Json,
            &Reflector::default(),
            &EncodeOptions::default(),
        )
        .unwrap();
        assert_eq!(bytes, br#"[["x"]]"#);
    }

    #[test]
    fn test_read_from_stream() {
        let decoded = read(&b"[1, 2]"[..], Format::Json, false).unwrap();
        assert_eq!(
            decoded.value,
            Value::List(vec![Value::Float(1.0), Value::Float(2.0)])
        );
    }

    #[rstest]
    #[case(Format::Yaml, &b"a: [1, 2"[..])]
    #[case(Format::Json, &b"{\"a\": }"[..])]
    #[case(Format::Xml, &b"<list><int>1</int>"[..])]
    #[case(Format::Cbor, &[0x82, 0x01][..])]
    #[case(Format::MessagePack, &[0x92, 0x01][..])]
    fn test_validate_rejects_malformed(#[case] format: Format, #[case] bytes: &[u8]) {
        let error = validate(bytes, format).unwrap_err();
        assert!(error.is_decode(), "{format}: {error}");
    }

    #[test]
    fn test_encode_options_from_config() {
        let options: EncodeOptions = serde_json::from_str(r#"{"indent": 2}"#).unwrap();
        assert_eq!(options, EncodeOptions::indented(2));
        assert!(!options.verbose);
    }
}
