//! Deep copies
//!
//! Every copy gets fresh containers. Scalars are cloned. Host leaves are
//! shared, which is fine because they are immutable.

use std::borrow::Borrow;

use tracing::trace;

use crate::core::{List, Map, Path, StringMap, Value};
use crate::error::ArdResult;
use crate::reflect::Reflector;

/// Map variant policy for a copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MapMode {
    Keep,
    StringMapsToMaps,
    MapsToStringMaps,
}

/// Deep copy keeping both map variants as they are
///
/// Host values are passed through untouched; use [`valid_copy`] to
/// guarantee pure ARD.
pub fn copy(value: &Value) -> Value {
    copy_with(value, MapMode::Keep)
}

/// Deep copy turning every string map into a map
pub fn copy_string_maps_to_maps(value: &Value) -> Value {
    copy_with(value, MapMode::StringMapsToMaps)
}

/// Deep copy turning every map into a string map
///
/// Keys are stringified with [`Value::key_string`]. Keys that stringify
/// identically collide and the last one wins.
pub fn copy_maps_to_string_maps(value: &Value) -> Value {
    copy_with(value, MapMode::MapsToStringMaps)
}

fn copy_with(value: &Value, mode: MapMode) -> Value {
    match value {
        Value::List(list) => Value::List(list.iter().map(|v| copy_with(v, mode)).collect()),
        Value::Map(map) => match mode {
            MapMode::MapsToStringMaps => {
                Value::StringMap(stringify_keys(map.iter().map(|(k, v)| (k, copy_with(v, mode)))))
            }
            _ => Value::Map(
                map.iter()
                    .map(|(k, v)| (copy_with(k, mode), copy_with(v, mode)))
                    .collect(),
            ),
        },
        Value::StringMap(map) => match mode {
            MapMode::StringMapsToMaps => Value::Map(
                map.iter()
                    .map(|(k, v)| (Value::String(k.clone()), copy_with(v, mode)))
                    .collect(),
            ),
            _ => Value::StringMap(
                map.iter()
                    .map(|(k, v)| (k.clone(), copy_with(v, mode)))
                    .collect(),
            ),
        },
        scalar => scalar.clone(),
    }
}

/// Deep copy that guarantees a pure ARD result
///
/// Host values are unpacked through the reflector.
///
/// # Errors
///
/// Returns the reflector's error, attributed to the host value's path, when
/// a host value cannot be unpacked.
pub fn valid_copy(value: &Value, reflector: &Reflector) -> ArdResult<Value> {
    valid_copy_with(value, reflector, MapMode::Keep, &Path::new())
}

/// [`valid_copy`] that also turns every string map into a map
pub fn valid_copy_string_maps_to_maps(value: &Value, reflector: &Reflector) -> ArdResult<Value> {
    valid_copy_with(value, reflector, MapMode::StringMapsToMaps, &Path::new())
}

/// [`valid_copy`] that also turns every map into a string map
pub fn valid_copy_maps_to_string_maps(value: &Value, reflector: &Reflector) -> ArdResult<Value> {
    valid_copy_with(value, reflector, MapMode::MapsToStringMaps, &Path::new())
}

fn valid_copy_with(
    value: &Value,
    reflector: &Reflector,
    mode: MapMode,
    path: &Path,
) -> ArdResult<Value> {
    match value {
        Value::List(list) => {
            let mut out = List::with_capacity(list.len());
            for (index, element) in list.iter().enumerate() {
                out.push(valid_copy_with(element, reflector, mode, &path.append_list(index))?);
            }
            Ok(Value::List(out))
        }
        Value::Map(map) => {
            let mut entries = Vec::with_capacity(map.len());
            for (key, element) in map {
                let key_path = path.append_map(key.key_string());
                entries.push((
                    valid_copy_with(key, reflector, mode, &key_path)?,
                    valid_copy_with(element, reflector, mode, &key_path)?,
                ));
            }
            Ok(match mode {
                MapMode::MapsToStringMaps => {
                    Value::StringMap(stringify_keys(entries))
                }
                _ => Value::Map(entries.into_iter().collect::<Map>()),
            })
        }
        Value::StringMap(map) => {
            let mut out = StringMap::with_capacity(map.len());
            for (key, element) in map {
                out.insert(
                    key.clone(),
                    valid_copy_with(element, reflector, mode, &path.append_map(key.as_str()))?,
                );
            }
            Ok(match mode {
                MapMode::StringMapsToMaps => Value::Map(
                    out.into_iter()
                        .map(|(k, v)| (Value::String(k), v))
                        .collect(),
                ),
                _ => Value::StringMap(out),
            })
        }
        Value::Host(host) => {
            let unpacked = host
                .unpack(reflector, mode == MapMode::MapsToStringMaps)
                .map_err(|e| e.at(path))?;
            match mode {
                MapMode::StringMapsToMaps => Ok(copy_string_maps_to_maps(&unpacked)),
                _ => Ok(unpacked),
            }
        }
        scalar => Ok(scalar.clone()),
    }
}

/// Collect entries into a string map, stringifying keys
pub(crate) fn stringify_keys<K, I>(entries: I) -> StringMap
where
    K: Borrow<Value>,
    I: IntoIterator<Item = (K, Value)>,
{
    let mut out = StringMap::new();
    for (key, value) in entries {
        let key = key.borrow().key_string().into_owned();
        if out.contains_key(&key) {
            trace!(key = %key, "map keys collide after stringification; last one wins");
        }
        out.insert(key, value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Serialize;

    fn sample() -> Value {
        let mut inner = StringMap::new();
        inner.insert("b".to_owned(), Value::List(vec![Value::integer(1)]));

        let mut map = Map::new();
        map.insert(Value::integer(1), Value::StringMap(inner));
        map.insert(Value::string("s"), Value::bytes(vec![1, 2]));
        Value::Map(map)
    }

    #[test]
    fn test_copy_is_equal_and_independent() {
        let original = sample();
        let mut copied = copy(&original);
        assert_eq!(copied, original);

        if let Value::Map(map) = &mut copied {
            map.insert(Value::string("new"), Value::Null);
        }
        assert_ne!(copied, original);
        assert_eq!(original.len(), Some(2));
    }

    #[test]
    fn test_copy_string_maps_to_maps() {
        let copied = copy_string_maps_to_maps(&sample());
        let inner = copied.get(&Value::integer(1)).unwrap();
        assert!(matches!(inner, Value::Map(_)));
        assert_eq!(inner.get_key("b"), Some(&Value::List(vec![Value::integer(1)])));
    }

    #[test]
    fn test_copy_maps_to_string_maps() {
        let copied = copy_maps_to_string_maps(&sample());
        let Value::StringMap(map) = &copied else {
            panic!("expected string map, got {copied:?}");
        };
        assert!(map.contains_key("1"));
        assert!(map.contains_key("s"));
    }

    #[test]
    fn test_key_collision_last_wins() {
        let mut map = Map::new();
        map.insert(Value::integer(1), Value::string("int"));
        map.insert(Value::unsigned_integer(1), Value::string("uint"));

        let copied = copy_maps_to_string_maps(&Value::Map(map));
        assert_eq!(copied.len(), Some(1));
        assert_eq!(copied.get_key("1"), Some(&Value::string("uint")));
    }

    #[derive(Serialize)]
    struct Endpoint {
        host: String,
        port: u16,
    }

    #[test]
    fn test_valid_copy_reflects_host_values() {
        let mut map = StringMap::new();
        map.insert(
            "endpoint".to_owned(),
            Value::host(Endpoint {
                host: "localhost".to_owned(),
                port: 8080,
            }),
        );

        let copied = valid_copy(&Value::StringMap(map), &Reflector::default()).unwrap();
        let endpoint = copied.get_key("endpoint").unwrap();
        assert!(matches!(endpoint, Value::Map(_)));
        assert_eq!(endpoint.get_key("port"), Some(&Value::UnsignedInteger(8080)));
    }

    #[test]
    fn test_valid_copy_maps_to_string_maps_reflects_to_string_maps() {
        let value = Value::List(vec![Value::host(Endpoint {
            host: "h".to_owned(),
            port: 1,
        })]);

        let copied = valid_copy_maps_to_string_maps(&value, &Reflector::default()).unwrap();
        let endpoint = &copied.as_list().unwrap()[0];
        assert!(matches!(endpoint, Value::StringMap(_)));
    }

    #[test]
    fn test_copy_passes_host_through() {
        let host = Value::host(1u128);
        assert_eq!(copy(&host), host);
    }
}
