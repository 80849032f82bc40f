//! Typed XML
//!
//! Every value is an element whose tag carries its type:
//!
//! ```xml
//! <map>
//!   <entry>
//!     <key><string>ports</string></key>
//!     <value><list><uint64>80</uint64><uint64>443</uint64></list></value>
//!   </entry>
//! </map>
//! ```
//!
//! Null is `<nil/>`, bytes are base64 text in `<bytes>`, timestamps are
//! RFC 3339 text in `<timestamp>`. Decoding also accepts the narrow numeric
//! tags (`int8` .. `int32`, `uint8` .. `uint32`, `float32`) and the untyped
//! `int`/`uint`, range-checking each one.

use std::fmt::Display;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::DateTime;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::codec::{Format, MAX_DEPTH, utf8};
use crate::core::conversions::parse_bool;
use crate::core::key::format_timestamp;
use crate::core::{List, Map, Path, Value};
use crate::error::{ArdError, ArdResult};

const NIL: &str = "nil";
const LIST: &str = "list";
const MAP: &str = "map";
const ENTRY: &str = "entry";
const KEY: &str = "key";
const VALUE: &str = "value";

/// Decode an XML document
///
/// # Errors
///
/// Returns a decode error for malformed XML, unknown tags, out-of-range
/// numbers, or a document that does not have exactly one root element.
pub fn decode(bytes: &[u8]) -> ArdResult<Value> {
    let root = parse(bytes)?;
    unpack(&root)
}

/// Decode an XML document from text
///
/// # Errors
///
/// Same as [`decode`].
pub fn decode_str(text: &str) -> ArdResult<Value> {
    decode(text.as_bytes())
}

/// Encode compactly
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode(value: &Value) -> ArdResult<Vec<u8>> {
    encode_with(value, None)
}

/// Encode, indenting nested elements when `indent` is set
///
/// # Errors
///
/// Returns an unsupported-type error for host values.
pub fn encode_with(value: &Value, indent: Option<usize>) -> ArdResult<Vec<u8>> {
    let mut writer = match indent {
        Some(width) => Writer::new_with_indent(Vec::new(), b' ', width),
        None => Writer::new(Vec::new()),
    };
    write_value(&mut writer, value, &Path::new())?;
    Ok(writer.into_inner())
}

/// Encode as a string
///
/// # Errors
///
/// Same as [`encode_with`].
pub fn encode_string(value: &Value, indent: Option<usize>) -> ArdResult<String> {
    String::from_utf8(encode_with(value, indent)?)
        .map_err(|e| ArdError::encode(Format::Xml, e.to_string()))
}

/// Check well-formedness (including matching end tags) without
/// interpreting element types
///
/// # Errors
///
/// Returns a decode error for the first problem found.
pub fn validate(bytes: &[u8]) -> ArdResult<()> {
    parse(bytes).map(|_| ())
}

// ==================== Reading ====================

/// Parsed element: tag, concatenated text and child elements
#[derive(Debug, Default)]
struct Element {
    tag: String,
    text: String,
    children: Vec<Element>,
    offset: usize,
}

impl Element {
    fn error(&self, message: impl Display) -> ArdError {
        ArdError::decode_at(Format::Xml, self.offset, format!("<{}>: {message}", self.tag))
    }
}

fn parse(bytes: &[u8]) -> ArdResult<Element> {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let offset = usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX);
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| ArdError::decode_at(Format::Xml, offset, e))?;

        match event {
            Event::Start(start) => {
                if stack.len() >= MAX_DEPTH {
                    return Err(ArdError::decode_at(
                        Format::Xml,
                        offset,
                        format!("nesting deeper than {MAX_DEPTH}"),
                    ));
                }
                stack.push(Element {
                    tag: tag_name(&start, offset)?,
                    offset,
                    ..Element::default()
                });
            }
            Event::Empty(start) => {
                let element = Element {
                    tag: tag_name(&start, offset)?,
                    offset,
                    ..Element::default()
                };
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack.pop().ok_or_else(|| {
                    ArdError::decode_at(Format::Xml, offset, "unexpected end tag")
                })?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let text = text
                    .unescape()
                    .map_err(|e| ArdError::decode_at(Format::Xml, offset, e))?;
                add_text(&mut stack, &text, offset)?;
            }
            Event::CData(data) => {
                let data = data.into_inner();
                add_text(&mut stack, utf8(&data, Format::Xml)?, offset)?;
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = stack.last() {
        return Err(open.error("element is never closed"));
    }
    root.ok_or_else(|| ArdError::decode(Format::Xml, "document has no root element"))
}

fn tag_name(start: &BytesStart<'_>, offset: usize) -> ArdResult<String> {
    let name = start.local_name();
    std::str::from_utf8(name.as_ref())
        .map(str::to_owned)
        .map_err(|e| ArdError::decode_at(Format::Xml, offset, e))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) -> ArdResult<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    } else if root.is_some() {
        return Err(element.error("document has more than one root element"));
    } else {
        *root = Some(element);
    }
    Ok(())
}

fn add_text(stack: &mut [Element], text: &str, offset: usize) -> ArdResult<()> {
    match stack.last_mut() {
        Some(element) => element.text.push_str(text),
        None if text.trim().is_empty() => {}
        None => {
            return Err(ArdError::decode_at(
                Format::Xml,
                offset,
                "text outside the root element",
            ));
        }
    }
    Ok(())
}

// ==================== Interpreting ====================

fn unpack(element: &Element) -> ArdResult<Value> {
    match element.tag.as_str() {
        NIL => Ok(Value::Null),
        LIST => Ok(Value::List(
            element
                .children
                .iter()
                .map(unpack)
                .collect::<ArdResult<List>>()?,
        )),
        MAP => {
            let mut map = Map::with_capacity(element.children.len());
            for entry in &element.children {
                let (key, value) = unpack_entry(entry)?;
                map.insert(key, value);
            }
            Ok(Value::Map(map))
        }
        "string" => Ok(Value::String(element.text.clone())),
        "int" | "int64" => number::<i64>(element).map(Value::Integer),
        "int32" => number::<i32>(element).map(|n| Value::Integer(n.into())),
        "int16" => number::<i16>(element).map(|n| Value::Integer(n.into())),
        "int8" => number::<i8>(element).map(|n| Value::Integer(n.into())),
        "uint" | "uint64" => number::<u64>(element).map(Value::UnsignedInteger),
        "uint32" => number::<u32>(element).map(|n| Value::UnsignedInteger(n.into())),
        "uint16" => number::<u16>(element).map(|n| Value::UnsignedInteger(n.into())),
        "uint8" => number::<u8>(element).map(|n| Value::UnsignedInteger(n.into())),
        "float64" => number::<f64>(element).map(Value::Float),
        "float32" => number::<f32>(element).map(|n| Value::Float(n.into())),
        "bool" => parse_bool(element.text.trim())
            .map(Value::Boolean)
            .ok_or_else(|| element.error(format!("invalid boolean {:?}", element.text))),
        "bytes" => STANDARD
            .decode(element.text.trim())
            .map(Value::Bytes)
            .map_err(|e| element.error(e)),
        "timestamp" => DateTime::parse_from_rfc3339(element.text.trim())
            .map(Value::Timestamp)
            .map_err(|e| element.error(e)),
        _ => Err(element.error("unsupported tag")),
    }
}

fn unpack_entry(entry: &Element) -> ArdResult<(Value, Value)> {
    if entry.tag != ENTRY {
        return Err(entry.error(format!("expected <{ENTRY}> inside <{MAP}>")));
    }

    let mut key = Value::Null;
    let mut value = Value::Null;
    for child in &entry.children {
        match child.tag.as_str() {
            KEY => key = single_child(child)?,
            VALUE => value = single_child(child)?,
            _ => return Err(child.error(format!("unexpected tag inside <{ENTRY}>"))),
        }
    }
    Ok((key, value))
}

/// Content of a `<key>` or `<value>`; empty means null
fn single_child(element: &Element) -> ArdResult<Value> {
    match element.children.as_slice() {
        [] => Ok(Value::Null),
        [child] => unpack(child),
        _ => Err(element.error("element has more than one child")),
    }
}

fn number<N>(element: &Element) -> ArdResult<N>
where
    N: FromStr,
    N::Err: Display,
{
    element
        .text
        .trim()
        .parse()
        .map_err(|e| element.error(format!("invalid number {:?}: {e}", element.text)))
}

// ==================== Writing ====================

type XmlWriter = Writer<Vec<u8>>;

fn write_value(writer: &mut XmlWriter, value: &Value, path: &Path) -> ArdResult<()> {
    match value {
        Value::Null => write(writer, Event::Empty(BytesStart::new(NIL))),
        Value::Boolean(b) => write_leaf(writer, "bool", if *b { "true" } else { "false" }),
        Value::Integer(i) => write_leaf(writer, "int64", &i.to_string()),
        Value::UnsignedInteger(u) => write_leaf(writer, "uint64", &u.to_string()),
        Value::Float(f) => write_leaf(writer, "float64", &format!("{f:?}")),
        Value::String(s) => write_leaf(writer, "string", s),
        Value::Bytes(b) => write_leaf(writer, "bytes", &STANDARD.encode(b)),
        Value::Timestamp(t) => write_leaf(writer, "timestamp", &format_timestamp(t)),
        Value::List(list) => {
            write(writer, Event::Start(BytesStart::new(LIST)))?;
            for (index, element) in list.iter().enumerate() {
                write_value(writer, element, &path.append_list(index))?;
            }
            write(writer, Event::End(BytesEnd::new(LIST)))
        }
        Value::Map(map) => {
            write(writer, Event::Start(BytesStart::new(MAP)))?;
            for (key, element) in map {
                write_entry(writer, key, element, &path.append_map(key.key_string()))?;
            }
            write(writer, Event::End(BytesEnd::new(MAP)))
        }
        Value::StringMap(map) => {
            write(writer, Event::Start(BytesStart::new(MAP)))?;
            for (key, element) in map {
                let key = Value::String(key.clone());
                let path = path.append_map(key.key_string());
                write_entry(writer, &key, element, &path)?;
            }
            write(writer, Event::End(BytesEnd::new(MAP)))
        }
        Value::Host(host) => Err(ArdError::unsupported_type(path, host.type_name())),
    }
}

fn write_entry(writer: &mut XmlWriter, key: &Value, value: &Value, path: &Path) -> ArdResult<()> {
    write(writer, Event::Start(BytesStart::new(ENTRY)))?;
    write(writer, Event::Start(BytesStart::new(KEY)))?;
    write_value(writer, key, path)?;
    write(writer, Event::End(BytesEnd::new(KEY)))?;
    write(writer, Event::Start(BytesStart::new(VALUE)))?;
    write_value(writer, value, path)?;
    write(writer, Event::End(BytesEnd::new(VALUE)))?;
    write(writer, Event::End(BytesEnd::new(ENTRY)))
}

/// Leaf element; empty text is written as an empty element so that
/// indentation never leaks into it
fn write_leaf(writer: &mut XmlWriter, tag: &str, text: &str) -> ArdResult<()> {
    if text.is_empty() {
        return write(writer, Event::Empty(BytesStart::new(tag)));
    }
    write(writer, Event::Start(BytesStart::new(tag)))?;
    write(writer, Event::Text(BytesText::new(text)))?;
    write(writer, Event::End(BytesEnd::new(tag)))
}

fn write(writer: &mut XmlWriter, event: Event<'_>) -> ArdResult<()> {
    writer
        .write_event(event)
        .map_err(|e| ArdError::encode(Format::Xml, e.to_string()))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::core::StringMap;

    #[test]
    fn test_encode_schema() {
        let mut map = StringMap::new();
        map.insert("n".to_owned(), Value::Null);
        map.insert(
            "l".to_owned(),
            Value::List(vec![Value::Integer(-1), Value::UnsignedInteger(2)]),
        );

        let xml = encode_string(&Value::StringMap(map), None).unwrap();
        assert_eq!(
            xml,
            "<map>\
             <entry><key><string>n</string></key><value><nil/></value></entry>\
             <entry><key><string>l</string></key><value>\
             <list><int64>-1</int64><uint64>2</uint64></list>\
             </value></entry>\
             </map>"
        );
    }

    #[test]
    fn test_round_trip_with_indent() {
        let mut map = Map::new();
        map.insert(Value::Integer(7), Value::string("  spaced  "));
        map.insert(Value::string(""), Value::Bytes(vec![0, 255]));
        map.insert(
            Value::List(vec![Value::Boolean(false)]),
            Value::Float(f64::INFINITY),
        );
        let value = Value::Map(map);

        let xml = encode_with(&value, Some(2)).unwrap();
        assert_eq!(decode(&xml).unwrap(), value);
    }

    #[rstest]
    #[case("<int8>127</int8>", Value::Integer(127))]
    #[case("<int>-5</int>", Value::Integer(-5))]
    #[case("<uint16>65535</uint16>", Value::UnsignedInteger(65535))]
    #[case("<float32>0.5</float32>", Value::Float(0.5))]
    #[case("<bool>T</bool>", Value::Boolean(true))]
    #[case("<bool>0</bool>", Value::Boolean(false))]
    #[case("<string><![CDATA[<raw>]]></string>", Value::string("<raw>"))]
    #[case("<string>a &amp; b</string>", Value::string("a & b"))]
    #[case("<?xml version=\"1.0\"?>\n<nil/>\n", Value::Null)]
    fn test_decode_leaves(#[case] xml: &str, #[case] expected: Value) {
        assert_eq!(decode_str(xml).unwrap(), expected);
    }

    #[rstest]
    #[case("<int8>128</int8>")]
    #[case("<uint8>-1</uint8>")]
    #[case("<bool>yes</bool>")]
    #[case("<widget/>")]
    #[case("<nil/><nil/>")]
    #[case("<list><nil/>")]
    #[case("<list></map>")]
    #[case("<map><entry><key><nil/><nil/></key></entry></map>")]
    #[case("")]
    fn test_decode_errors(#[case] xml: &str) {
        let error = decode_str(xml).unwrap_err();
        assert!(error.is_decode(), "{xml}: {error}");
    }

    #[test]
    fn test_missing_key_or_value_is_null() {
        let value = decode_str("<map><entry><value><int>1</int></value></entry></map>").unwrap();
        assert_eq!(value.get(&Value::Null), Some(&Value::Integer(1)));
    }
}
