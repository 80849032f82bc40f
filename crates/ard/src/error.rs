//! ARD Error Types
//!
//! Every fallible operation in this crate returns [`ArdResult`]. Format
//! errors carry enough context (byte offset, line/column or element) to find
//! the failure in the source document; reflector errors carry the [`Path`]
//! of the value that failed.

use std::fmt::Display;

use thiserror::Error;

use crate::codec::Format;
use crate::core::path::Path;

// ============================================================================
// MAIN ERROR TYPE
// ============================================================================

/// ARD errors
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ArdError {
    /// Format identifier is not one of the supported codecs
    #[error("unsupported format: {name:?}")]
    UnsupportedFormat { name: String },

    /// Input is not well-formed for the declared format
    #[error("malformed {format}: {message}")]
    Decode { format: Format, message: String },

    /// Value cannot be written in the declared format
    #[error("cannot encode {format}: {message}")]
    Encode { format: Format, message: String },

    /// Value does not fit the host type it is being packed into (or out of)
    #[error("{}{message}", path_prefix(.path))]
    Reflect { path: Path, message: String },

    /// Host value has no ARD representative
    #[error("{}unsupported type: {type_name}", path_prefix(.path))]
    UnsupportedType { path: Path, type_name: String },

    /// Template rendering failed
    #[error("template: {message}")]
    Template { message: String },

    /// Reading the input stream failed
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for ARD operations
pub type ArdResult<T> = Result<T, ArdError>;

fn path_prefix(path: &Path) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!("{path}: ")
    }
}

// ============================================================================
// CONVENIENCE CONSTRUCTORS
// ============================================================================

impl ArdError {
    /// Create an unsupported format error
    pub fn unsupported_format(name: impl Into<String>) -> Self {
        Self::UnsupportedFormat { name: name.into() }
    }

    /// Create a decode error
    pub fn decode(format: Format, message: impl Into<String>) -> Self {
        Self::Decode {
            format,
            message: message.into(),
        }
    }

    /// Create a decode error that points at a byte offset
    pub fn decode_at(format: Format, offset: usize, message: impl Display) -> Self {
        Self::Decode {
            format,
            message: format!("{message} at byte {offset}"),
        }
    }

    /// Create an encode error
    pub fn encode(format: Format, message: impl Into<String>) -> Self {
        Self::Encode {
            format,
            message: message.into(),
        }
    }

    /// Create a reflection error without a path
    pub fn reflect(message: impl Into<String>) -> Self {
        Self::Reflect {
            path: Path::new(),
            message: message.into(),
        }
    }

    /// Create a reflection error at a path
    pub fn reflect_at(path: &Path, message: impl Into<String>) -> Self {
        Self::Reflect {
            path: path.clone(),
            message: message.into(),
        }
    }

    /// Create an unsupported type error
    pub fn unsupported_type(path: &Path, type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            path: path.clone(),
            type_name: type_name.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Attach a path to a reflection error that does not have one yet
    ///
    /// Errors raised by serde-derived code know nothing about where they
    /// happened; the reflector calls this on the way out of each level.
    #[must_use]
    pub fn at(self, at: &Path) -> Self {
        match self {
            Self::Reflect { path, message } if path.is_empty() => Self::Reflect {
                path: at.clone(),
                message,
            },
            Self::UnsupportedType { path, type_name } if path.is_empty() => {
                Self::UnsupportedType {
                    path: at.clone(),
                    type_name,
                }
            }
            other => other,
        }
    }

    /// The path this error is attributed to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Reflect { path, .. } | Self::UnsupportedType { path, .. } if !path.is_empty() => {
                Some(path)
            }
            _ => None,
        }
    }

    /// Is this a malformed-input error?
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }
}

// ============================================================================
// SERDE INTEGRATION
// ============================================================================

impl serde::ser::Error for ArdError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::reflect(msg.to_string())
    }
}

impl serde::de::Error for ArdError {
    fn custom<T: Display>(msg: T) -> Self {
        Self::reflect(msg.to_string())
    }
}
