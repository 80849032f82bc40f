//! Deep structural operations over value trees
//!
//! - [`copy`] family: fresh containers, optionally switching map variant
//! - [`valid_copy`] family: copies that reflect host values into pure ARD
//! - [`merge`]: target-biased deep merge
//! - [`normalize_maps`] / [`normalize_string_maps`]: whole-tree variant
//!   coercion with a change flag
//! - [`equals`]: structural equality (same as `==`)
mod copy;
mod merge;
mod normalize;

pub use crate::core::hash::equals;
pub use copy::{
    copy, copy_maps_to_string_maps, copy_string_maps_to_maps, valid_copy,
    valid_copy_maps_to_string_maps, valid_copy_string_maps_to_maps,
};
pub use merge::merge;
pub use normalize::{normalize_maps, normalize_string_maps};

pub(crate) use copy::stringify_keys;
