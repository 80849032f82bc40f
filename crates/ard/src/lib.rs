//! ARD - agnostic raw data
//!
//! A closed value model for configuration-like data, with codecs that move
//! it losslessly between YAML, JSON, XML, CBOR and MessagePack.
//!
//! - [`Value`]: the tree of nulls, booleans, numbers, strings, bytes,
//!   timestamps, lists and maps (arbitrary-key and string-key)
//! - [`ops`]: deep copy, merge, map-variant normalization and equality
//! - [`codec`]: per-format decoders and encoders behind one [`Format`] facade
//! - [`Reflector`]: conversion between serde types and value trees
//! - [`Node`]: chained lookups with optional zero values and conversions
//!
//! # Example
//!
//! ```rust
//! use ard::prelude::*;
//!
//! let decoded = codec::decode(b"server:\n  port: 8080\n", Format::Yaml, true).unwrap();
//! assert_eq!(decoded.value.node().get(["server", "port"]).integer(), Some(8080));
//!
//! let locator = decoded.locator.unwrap();
//! let path: Path = "server.port".parse().unwrap();
//! assert_eq!(locator.locate(path.elements()).map(|l| l.line), Some(2));
//! ```

#![deny(unused_must_use)]
#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod core;
pub mod error;
pub mod node;
pub mod ops;
pub mod reflect;

// Re-export main types
pub use crate::codec::{Decoded, EncodeOptions, Format, Location, Locator};
pub use crate::core::{
    List, Map, Path, PathElement, StringMap, Timestamp, TypeName, Value, zero_timestamp,
};
pub use crate::error::{ArdError, ArdResult};
pub use crate::node::{Node, NodeFlags, NodeMut};
pub use crate::reflect::{FromArd, HostValue, Reflectable, Reflector, ToArd};

#[doc(hidden)]
pub mod __private {
    pub use serde;
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::codec::{self, EncodeOptions, Format, Locator};
    pub use crate::{
        ArdError, ArdResult, List, Map, Node, NodeMut, Path, PathElement, Reflector, StringMap,
        TypeName, Value,
    };
}
