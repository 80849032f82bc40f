//! Block-style emitter
//!
//! Maps and lists are written in block style with two-space indentation;
//! empty containers and complex keys use flow style. Complex keys and keys
//! too long for an implicit key take the explicit `? key` form. Strings are
//! always double-quoted so they never re-resolve as another type.

use std::fmt::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::core::key::{format_float, format_timestamp};
use crate::core::{Path, Value};
use crate::error::{ArdError, ArdResult};

const INDENT: usize = 2;

/// Longest key the scanner accepts without an explicit `?` indicator
const MAX_IMPLICIT_KEY: usize = 1024;

pub(crate) fn emit(value: &Value, verbose: bool) -> ArdResult<String> {
    let mut emitter = Emitter {
        out: String::new(),
        verbose,
    };
    emitter.node(value, 0, &Path::new())?;
    Ok(emitter.out)
}

/// Non-empty containers are written in block style
fn is_block(value: &Value) -> bool {
    match value {
        Value::List(list) => !list.is_empty(),
        Value::Map(map) => !map.is_empty(),
        Value::StringMap(map) => !map.is_empty(),
        _ => false,
    }
}

fn core_tag(value: &Value) -> &'static str {
    match value {
        Value::Null => "!!null",
        Value::Boolean(_) => "!!bool",
        Value::Integer(_) | Value::UnsignedInteger(_) => "!!int",
        Value::Float(_) => "!!float",
        Value::String(_) => "!!str",
        Value::Bytes(_) => "!!binary",
        Value::Timestamp(_) => "!!timestamp",
        Value::List(_) => "!!seq",
        Value::Map(_) | Value::StringMap(_) => "!!map",
        Value::Host(_) => "",
    }
}

struct Emitter {
    out: String,
    verbose: bool,
}

impl Emitter {
    fn indent(&mut self, width: usize) {
        self.out.extend(std::iter::repeat_n(' ', width));
    }

    /// Write any value followed by a newline; the cursor is at column `indent`
    fn node(&mut self, value: &Value, indent: usize, path: &Path) -> ArdResult<()> {
        if !is_block(value) {
            self.flow(value, path)?;
            self.out.push('\n');
            return Ok(());
        }

        if self.verbose {
            self.out.push_str(core_tag(value));
            self.out.push('\n');
            self.indent(indent);
        }
        self.block(value, indent, path)
    }

    /// Write the entries of a non-empty container
    fn block(&mut self, value: &Value, indent: usize, path: &Path) -> ArdResult<()> {
        match value {
            Value::List(list) => {
                for (index, item) in list.iter().enumerate() {
                    if index > 0 {
                        self.indent(indent);
                    }
                    self.out.push_str("- ");
                    self.node(item, indent + INDENT, &path.append_list(index))?;
                }
            }
            Value::Map(map) => {
                for (index, (key, item)) in map.iter().enumerate() {
                    if index > 0 {
                        self.indent(indent);
                    }
                    let path = path.append_map(key.key_string());
                    self.entry(key, item, indent, &path)?;
                }
            }
            Value::StringMap(map) => {
                for (index, (key, item)) in map.iter().enumerate() {
                    if index > 0 {
                        self.indent(indent);
                    }
                    let path = path.append_map(key.as_str());
                    self.entry(&Value::String(key.clone()), item, indent, &path)?;
                }
            }
            other => {
                self.flow(other, path)?;
                self.out.push('\n');
            }
        }
        Ok(())
    }

    fn entry(&mut self, key: &Value, value: &Value, indent: usize, path: &Path) -> ArdResult<()> {
        let start = self.out.len();
        self.flow(key, path)?;
        if matches!(key, Value::List(_) | Value::Map(_) | Value::StringMap(_))
            || self.out[start..].chars().count() >= MAX_IMPLICIT_KEY
        {
            self.out.insert_str(start, "? ");
            self.out.push('\n');
            self.indent(indent);
        }
        self.out.push(':');

        if is_block(value) {
            if self.verbose {
                self.out.push(' ');
                self.out.push_str(core_tag(value));
            }
            self.out.push('\n');
            self.indent(indent + INDENT);
            self.block(value, indent + INDENT, path)
        } else {
            self.out.push(' ');
            self.flow(value, path)?;
            self.out.push('\n');
            Ok(())
        }
    }

    /// Write a value on a single line
    fn flow(&mut self, value: &Value, path: &Path) -> ArdResult<()> {
        // bytes and timestamps always carry their tag
        if self.verbose && !matches!(value, Value::Bytes(_) | Value::Timestamp(_)) {
            self.out.push_str(core_tag(value));
            self.out.push(' ');
        }

        match value {
            Value::Null => self.out.push_str("null"),
            Value::Boolean(b) => self.out.push_str(if *b { "true" } else { "false" }),
            Value::Integer(i) => {
                let _ = write!(self.out, "{i}");
            }
            Value::UnsignedInteger(u) => {
                let _ = write!(self.out, "{u}");
            }
            Value::Float(f) => self.out.push_str(&format_float(*f)),
            Value::String(s) => self.quoted(s),
            Value::Bytes(b) => {
                self.out.push_str("!!binary ");
                self.quoted(&STANDARD.encode(b));
            }
            Value::Timestamp(t) => {
                self.out.push_str("!!timestamp ");
                self.quoted(&format_timestamp(t));
            }
            Value::List(list) => {
                self.out.push('[');
                for (index, item) in list.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    self.flow(item, &path.append_list(index))?;
                }
                self.out.push(']');
            }
            Value::Map(map) => {
                self.out.push('{');
                for (index, (key, item)) in map.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    let path = path.append_map(key.key_string());
                    self.flow(key, &path)?;
                    self.out.push_str(": ");
                    self.flow(item, &path)?;
                }
                self.out.push('}');
            }
            Value::StringMap(map) => {
                self.out.push('{');
                for (index, (key, item)) in map.iter().enumerate() {
                    if index > 0 {
                        self.out.push_str(", ");
                    }
                    if self.verbose {
                        self.out.push_str("!!str ");
                    }
                    self.quoted(key);
                    self.out.push_str(": ");
                    self.flow(item, &path.append_map(key.as_str()))?;
                }
                self.out.push('}');
            }
            Value::Host(host) => return Err(ArdError::unsupported_type(path, host.type_name())),
        }
        Ok(())
    }

    fn quoted(&mut self, s: &str) {
        self.out.push('"');
        for c in s.chars() {
            match c {
                '"' => self.out.push_str("\\\""),
                '\\' => self.out.push_str("\\\\"),
                '\n' => self.out.push_str("\\n"),
                '\r' => self.out.push_str("\\r"),
                '\t' => self.out.push_str("\\t"),
                c if c.is_control() => {
                    let _ = write!(self.out, "\\u{:04x}", u32::from(c));
                }
                c => self.out.push(c),
            }
        }
        self.out.push('"');
    }
}
