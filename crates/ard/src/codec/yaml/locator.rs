//! Source positions for decoded YAML

use std::sync::Arc;

use crate::codec::{Location, Locator};
use crate::core::PathElement;

use super::compose::{NodeKind, YamlNode};

/// Finds the line and column of a path in a decoded YAML document
///
/// Obtained from [`decode_with_locator`](super::decode_with_locator). A path
/// that ends on a mapping value reports the position of its key; a path that
/// only partially matches reports the deepest node it reached.
///
/// ```rust
/// use ard::codec::{Location, Locator, yaml};
/// use ard::Path;
///
/// let (_, locator) = yaml::decode_with_locator(b"server:\n  port: 80\n").unwrap();
/// let path: Path = "server.port".parse().unwrap();
/// assert_eq!(locator.locate(path.elements()), Some(Location { line: 2, column: 3 }));
/// ```
#[derive(Debug, Clone)]
pub struct YamlLocator {
    root: Option<Arc<YamlNode>>,
}

impl YamlLocator {
    pub(crate) fn new(root: Option<Arc<YamlNode>>) -> Self {
        Self { root }
    }
}

impl Locator for YamlLocator {
    fn locate(&self, path: &[PathElement]) -> Option<Location> {
        let mut node = self.root.as_ref()?;
        let mut location = node.location;

        for element in path {
            let next = match (element, &node.kind) {
                (PathElement::Field(name) | PathElement::Map(name), NodeKind::Mapping(entries)) => {
                    find_entry(entries, name)
                }
                (PathElement::List(index), NodeKind::Sequence(items)) => {
                    items.get(*index).map(|item| (item.location, item))
                }
                (PathElement::SequencedList(index), NodeKind::Sequence(items)) => {
                    items.get(*index).map(|item| match &item.kind {
                        NodeKind::Mapping(pairs) if pairs.len() == 1 => {
                            let (key, value) = &pairs[0];
                            (key.location, value)
                        }
                        _ => (item.location, item),
                    })
                }
                _ => None,
            };

            match next {
                Some((found, child)) => {
                    location = found;
                    node = child;
                }
                None => break,
            }
        }

        Some(location)
    }
}

/// Entry for a string key, looking through merge keys when it is absent
fn find_entry<'a>(
    entries: &'a [(Arc<YamlNode>, Arc<YamlNode>)],
    name: &str,
) -> Option<(Location, &'a Arc<YamlNode>)> {
    let direct = entries
        .iter()
        .find(|(key, _)| !key.is_merge_key() && key.scalar_text() == Some(name));
    if let Some((key, value)) = direct {
        return Some((key.location, value));
    }

    entries
        .iter()
        .filter(|(key, _)| key.is_merge_key())
        .find_map(|(_, source)| match &source.kind {
            NodeKind::Mapping(merged) => find_entry(merged, name),
            NodeKind::Sequence(sources) => sources.iter().find_map(|source| match &source.kind {
                NodeKind::Mapping(merged) => find_entry(merged, name),
                _ => None,
            }),
            NodeKind::Scalar { .. } => None,
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;
    use crate::codec::yaml::decode_with_locator;
    use crate::core::Path;

    const DOCUMENT: &str = "\
name: app
ports:
  - 80
  - 443
base: &base
  retries: 3
job:
  <<: *base
  steps:
    - run: build
    - run: test
";

    fn locate(path: &str) -> Option<Location> {
        let (_, locator) = decode_with_locator(DOCUMENT.as_bytes()).unwrap();
        let path: Path = path.parse().unwrap();
        locator.locate(path.elements())
    }

    #[rstest]
    #[case("name", 1, 1)]
    #[case("ports", 2, 1)]
    #[case("ports[1]", 4, 5)]
    #[case("job.retries", 6, 3)]
    #[case("job.steps{1}", 11, 7)]
    #[case("job.steps[0]", 10, 7)]
    #[case("[\"job\"].steps", 9, 3)]
    fn test_locate(#[case] path: &str, #[case] line: usize, #[case] column: usize) {
        assert_eq!(locate(path), Some(Location { line, column }));
    }

    #[rstest]
    #[case("ports.missing", 2, 1)]
    #[case("ports[7]", 2, 1)]
    #[case("job.steps[0].nope", 10, 7)]
    fn test_partial_match_reports_deepest(
        #[case] path: &str,
        #[case] line: usize,
        #[case] column: usize,
    ) {
        assert_eq!(locate(path), Some(Location { line, column }));
    }

    #[test]
    fn test_empty_document_has_no_locations() {
        let (_, locator) = decode_with_locator(b"").unwrap();
        assert_eq!(locator.locate(&[]), None);
    }
}
