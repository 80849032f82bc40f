//! Map-variant normalization
//!
//! Decoders produce whichever map variant their format yields naturally
//! (JSON and MessagePack produce string maps). These functions convert a
//! whole tree to one variant and report whether anything changed, so
//! callers can skip work when the tree was already uniform.
//!
//! Only map values are converted; complex keys are left as they are.

use crate::core::{Map, Value};
use crate::ops::copy::stringify_keys;

impl Value {
    /// Convert every string map in this tree into a map, in place
    ///
    /// Returns `true` if anything was converted.
    pub fn convert_string_maps_to_maps(&mut self) -> bool {
        match self {
            Self::List(list) => list
                .iter_mut()
                .fold(false, |changed, v| v.convert_string_maps_to_maps() | changed),
            Self::Map(map) => map
                .values_mut()
                .fold(false, |changed, v| v.convert_string_maps_to_maps() | changed),
            Self::StringMap(map) => {
                let entries = std::mem::take(map);
                *self = Self::Map(
                    entries
                        .into_iter()
                        .map(|(k, mut v)| {
                            v.convert_string_maps_to_maps();
                            (Self::String(k), v)
                        })
                        .collect::<Map>(),
                );
                true
            }
            _ => false,
        }
    }

    /// Convert every map in this tree into a string map, in place
    ///
    /// Keys are stringified with [`Value::key_string`]; colliding keys keep
    /// the last value. Returns `true` if anything was converted.
    pub fn convert_maps_to_string_maps(&mut self) -> bool {
        match self {
            Self::List(list) => list
                .iter_mut()
                .fold(false, |changed, v| v.convert_maps_to_string_maps() | changed),
            Self::StringMap(map) => map
                .values_mut()
                .fold(false, |changed, v| v.convert_maps_to_string_maps() | changed),
            Self::Map(map) => {
                let entries = std::mem::take(map);
                *self = Self::StringMap(stringify_keys(entries.into_iter().map(|(k, mut v)| {
                    v.convert_maps_to_string_maps();
                    (k, v)
                })));
                true
            }
            _ => false,
        }
    }
}

/// Normalize a tree to the [`Map`] variant
///
/// Returns the tree and whether anything changed.
#[must_use]
pub fn normalize_maps(mut value: Value) -> (Value, bool) {
    let changed = value.convert_string_maps_to_maps();
    (value, changed)
}

/// Normalize a tree to the string map variant
///
/// Returns the tree and whether anything changed.
#[must_use]
pub fn normalize_string_maps(mut value: Value) -> (Value, bool) {
    let changed = value.convert_maps_to_string_maps();
    (value, changed)
}
