//! Core building blocks of the ARD value model.
//!
//! ## Core Components
//!
//! ### [`value`] - The Value enum
//!
//! The closed set of primitive and container types, including the two map
//! variants ([`Map`] with arbitrary keys, [`StringMap`] with string keys).
//!
//! ### [`kind`] - Type classification
//!
//! Canonical [`TypeName`]s, zero values and the predicate registry.
//!
//! ### [`hash`] - Equality and hashing
//!
//! Every value can be a map key: floats, maps and host values get explicit
//! equality and hashing rules.
//!
//! ### [`key`] - Canonical key stringification
//!
//! The single value-to-string function used by map conversion, struct field
//! matching and node reads.
//!
//! ### [`path`] - Locations in a value tree
//!
//! Field / map / list / sequenced-list steps with a stable wire form.
pub mod conversions;
pub mod hash;
pub mod key;
pub mod kind;
pub mod path;
pub mod serde;
pub mod value;

pub use hash::equals;
pub use kind::{TYPE_VALIDATORS, TypeName, TypeValidator, zero_timestamp};
pub use path::{Path, PathElement};
pub use value::{List, Map, StringMap, Timestamp, Value};
