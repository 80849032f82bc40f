//! Deep merge

use crate::core::Value;

/// Merge `source` into `target`, target-biased
///
/// - two maps of the same variant merge key by key: shared keys are merged
///   recursively, source-only keys are copied in, target-only keys stay
/// - two lists are concatenated when `append_lists` is set
/// - anything else is replaced by a deep copy of `source`
///
/// `source` is never mutated and nothing in the result aliases it. The
/// merged tree is returned, so callers re-bind:
///
/// ```rust
/// use ard::{Value, ops::merge};
///
/// let target: Value = [("x".to_owned(), Value::from(1))].into_iter().collect();
/// let source: Value = [("y".to_owned(), Value::from(2))].into_iter().collect();
///
/// let target = merge(target, &source, false);
/// assert_eq!(target.len(), Some(2));
/// ```
#[must_use]
pub fn merge(target: Value, source: &Value, append_lists: bool) -> Value {
    match (target, source) {
        (Value::Map(mut target), Value::Map(source)) => {
            for (key, element) in source {
                if let Some(slot) = target.get_mut(key) {
                    let existing = std::mem::take(slot);
                    *slot = merge(existing, element, append_lists);
                } else {
                    target.insert(key.clone(), element.clone());
                }
            }
            Value::Map(target)
        }

        (Value::StringMap(mut target), Value::StringMap(source)) => {
            for (key, element) in source {
                if let Some(slot) = target.get_mut(key) {
                    let existing = std::mem::take(slot);
                    *slot = merge(existing, element, append_lists);
                } else {
                    target.insert(key.clone(), element.clone());
                }
            }
            Value::StringMap(target)
        }

        (Value::List(mut target), Value::List(source)) if append_lists => {
            target.extend(source.iter().cloned());
            Value::List(target)
        }

        (_, source) => source.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Map, StringMap};
    use pretty_assertions::assert_eq;

    fn string_map<const N: usize>(entries: [(&str, Value); N]) -> Value {
        Value::StringMap(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect::<StringMap>(),
        )
    }

    #[test]
    fn test_merge_overwrites_common_keys() {
        let target = string_map([("x", Value::integer(1)), ("y", Value::integer(2))]);
        let source = string_map([("y", Value::integer(3)), ("z", Value::integer(4))]);

        let merged = merge(target, &source, false);
        assert_eq!(
            merged,
            string_map([
                ("x", Value::integer(1)),
                ("y", Value::integer(3)),
                ("z", Value::integer(4)),
            ])
        );
    }

    #[test]
    fn test_merge_recurses_into_nested_maps() {
        let target = string_map([("db", string_map([("host", Value::string("a"))]))]);
        let source = string_map([("db", string_map([("port", Value::integer(5432))]))]);

        let merged = merge(target, &source, false);
        let db = merged.get_key("db").unwrap();
        assert_eq!(db.get_key("host"), Some(&Value::string("a")));
        assert_eq!(db.get_key("port"), Some(&Value::integer(5432)));
    }

    #[test]
    fn test_merge_lists() {
        let target = Value::List(vec![Value::integer(1)]);
        let source = Value::List(vec![Value::integer(2), Value::integer(3)]);

        let appended = merge(target.clone(), &source, true);
        assert_eq!(
            appended,
            Value::List(vec![Value::integer(1), Value::integer(2), Value::integer(3)])
        );

        let replaced = merge(target, &source, false);
        assert_eq!(replaced, source);
    }

    #[test]
    fn test_merge_variant_mismatch_copies_source() {
        let mut map = Map::new();
        map.insert(Value::string("a"), Value::integer(1));
        let target = Value::Map(map);
        let source = string_map([("b", Value::integer(2))]);

        assert_eq!(merge(target, &source, true), source);
        assert_eq!(merge(Value::integer(1), &source, true), source);
    }

    #[test]
    fn test_merge_result_does_not_alias_source() {
        let source = string_map([("list", Value::List(vec![Value::integer(1)]))]);
        let mut merged = merge(Value::string_map_empty(), &source, false);

        if let Some(Value::List(list)) = merged
            .as_string_map_mut()
            .and_then(|m| m.get_mut("list"))
        {
            list.push(Value::integer(2));
        }

        assert_eq!(
            source.get_key("list"),
            Some(&Value::List(vec![Value::integer(1)]))
        );
    }
}
