//! Paths into a value tree
//!
//! A [`Path`] is a sequence of steps. It is used to attribute reflector
//! errors, to query a [`crate::codec::Locator`] and by [`crate::node`].
//!
//! Wire form:
//!
//! - field steps are joined with `.`; the characters `" . [ ] { }` in a
//!   field name are escaped with a backslash
//! - map steps: `["key"]`
//! - list steps: `[N]`
//! - sequenced-list steps: `{N}`
//!
//! ```rust
//! use ard::Path;
//!
//! let path = Path::new()
//!     .append_field("servers")
//!     .append_list(0)
//!     .append_map("a.b");
//! assert_eq!(path.to_string(), r#"servers[0]["a.b"]"#);
//! assert_eq!(path.to_string().parse::<Path>().unwrap(), path);
//! ```

use std::fmt::{self, Display, Formatter, Write};
use std::str::FromStr;

use crate::error::{ArdError, ArdResult};

/// Maximum number of path segments accepted by the parser (DoS protection)
const MAX_PATH_SEGMENTS: usize = 100;

/// One step of a path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathElement {
    /// Struct field (or string map key read as a field)
    Field(String),
    /// Map entry by key
    Map(String),
    /// List element by index
    List(usize),
    /// Element of a list of single-entry maps
    SequencedList(usize),
}

/// Sequence of path steps
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<PathElement>);

impl Path {
    /// Create an empty path
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Check if path has no steps
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of steps
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterate over steps
    pub fn iter(&self) -> std::slice::Iter<'_, PathElement> {
        self.0.iter()
    }

    /// Steps as a slice
    pub fn elements(&self) -> &[PathElement] {
        &self.0
    }

    /// Add a step in place
    pub fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }

    /// Remove the last step
    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }

    /// Copy of this path extended by one step
    #[must_use]
    pub fn append(&self, element: PathElement) -> Self {
        let mut path = self.clone();
        path.push(element);
        path
    }

    /// Copy of this path extended by a field step
    #[must_use]
    pub fn append_field(&self, name: impl Into<String>) -> Self {
        self.append(PathElement::Field(name.into()))
    }

    /// Copy of this path extended by a map step
    #[must_use]
    pub fn append_map(&self, key: impl Into<String>) -> Self {
        self.append(PathElement::Map(key.into()))
    }

    /// Copy of this path extended by a list step
    #[must_use]
    pub fn append_list(&self, index: usize) -> Self {
        self.append(PathElement::List(index))
    }

    /// Copy of this path extended by a sequenced-list step
    #[must_use]
    pub fn append_sequenced_list(&self, index: usize) -> Self {
        self.append(PathElement::SequencedList(index))
    }
}

impl From<Vec<PathElement>> for Path {
    fn from(elements: Vec<PathElement>) -> Self {
        Self(elements)
    }
}

impl FromIterator<PathElement> for Path {
    fn from_iter<I: IntoIterator<Item = PathElement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a PathElement;
    type IntoIter = std::slice::Iter<'a, PathElement>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ==================== Wire form ====================

const FIELD_ESCAPES: &[char] = &['"', '.', '[', ']', '{', '}'];

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (index, element) in self.0.iter().enumerate() {
            match element {
                PathElement::Field(name) => {
                    if index > 0 {
                        f.write_char('.')?;
                    }
                    for c in name.chars() {
                        if FIELD_ESCAPES.contains(&c) {
                            f.write_char('\\')?;
                        }
                        f.write_char(c)?;
                    }
                }
                PathElement::Map(key) => write!(f, "[{key:?}]")?,
                PathElement::List(index) => write!(f, "[{index}]")?,
                PathElement::SequencedList(index) => write!(f, "{{{index}}}")?,
            }
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = ArdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

/// Parse the wire form back into a path
///
/// # Errors
///
/// Returns an error for unterminated steps, bad indices or more than 100
/// segments.
fn parse_path(input: &str) -> ArdResult<Path> {
    let mut path = Path::new();
    let mut chars = input.chars().peekable();
    let mut field = String::new();
    let mut in_field = false;

    let invalid = |message: &str| ArdError::reflect(format!("invalid path {input:?}: {message}"));

    loop {
        let Some(c) = chars.next() else {
            if in_field {
                path.push(PathElement::Field(std::mem::take(&mut field)));
            }
            break;
        };

        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| invalid("dangling escape"))?;
                field.push(escaped);
                in_field = true;
            }
            '.' => {
                if in_field {
                    path.push(PathElement::Field(std::mem::take(&mut field)));
                }
                in_field = true;
            }
            '[' | '{' => {
                if in_field && !field.is_empty() {
                    path.push(PathElement::Field(std::mem::take(&mut field)));
                }
                in_field = false;

                if c == '[' && chars.peek() == Some(&'"') {
                    chars.next();
                    let key = parse_quoted(&mut chars).ok_or_else(|| invalid("unterminated key"))?;
                    if chars.next() != Some(']') {
                        return Err(invalid("expected ']'"));
                    }
                    path.push(PathElement::Map(key));
                } else {
                    let close = if c == '[' { ']' } else { '}' };
                    let mut digits = String::new();
                    loop {
                        match chars.next() {
                            Some(d) if d == close => break,
                            Some(d) => digits.push(d),
                            None => return Err(invalid("unterminated index")),
                        }
                    }
                    let index = digits
                        .parse::<usize>()
                        .map_err(|_| invalid(&format!("bad index {digits:?}")))?;
                    path.push(if c == '[' {
                        PathElement::List(index)
                    } else {
                        PathElement::SequencedList(index)
                    });
                }
            }
            other => {
                field.push(other);
                in_field = true;
            }
        }

        if path.len() > MAX_PATH_SEGMENTS {
            return Err(invalid(&format!(
                "more than {MAX_PATH_SEGMENTS} segments"
            )));
        }
    }

    Ok(path)
}

/// Read a double-quoted key (opening quote already consumed)
fn parse_quoted(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut key = String::new();
    loop {
        match chars.next()? {
            '"' => return Some(key),
            '\\' => match chars.next()? {
                'n' => key.push('\n'),
                't' => key.push('\t'),
                'r' => key.push('\r'),
                '0' => key.push('\0'),
                'u' => {
                    // Rust debug escape: \u{XXXX}
                    if chars.next()? != '{' {
                        return None;
                    }
                    let mut hex = String::new();
                    loop {
                        match chars.next()? {
                            '}' => break,
                            h => hex.push(h),
                        }
                    }
                    key.push(char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?);
                }
                other => key.push(other),
            },
            other => key.push(other),
        }
    }
}
