//! Event stream to node tree
//!
//! The composer keeps every node's source position and shares aliased nodes
//! through `Arc`, so an alias costs one pointer however large its anchor is.

use std::collections::HashMap;
use std::sync::Arc;

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser, Tag};
use yaml_rust2::scanner::{Marker, TScalarStyle};

use crate::codec::{Format, Location};
use crate::error::{ArdError, ArdResult};

/// Handles that stand for the YAML core tag namespace
const CORE_HANDLES: [&str; 2] = ["tag:yaml.org,2002:", "!!"];

/// A composed YAML node
#[derive(Debug)]
pub(crate) struct YamlNode {
    pub(crate) kind: NodeKind,
    pub(crate) tag: Option<NodeTag>,
    pub(crate) location: Location,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Scalar { text: String, plain: bool },
    Sequence(Vec<Arc<YamlNode>>),
    Mapping(Vec<(Arc<YamlNode>, Arc<YamlNode>)>),
}

/// Explicit tag of a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NodeTag {
    /// A core tag such as `!!int`, by its suffix
    Core(String),
    /// Any other tag, kept verbatim
    Other(String),
}

impl NodeTag {
    fn from_event(tag: Tag) -> Self {
        if CORE_HANDLES.contains(&tag.handle.as_str()) {
            Self::Core(tag.suffix)
        } else {
            Self::Other(format!("{}{}", tag.handle, tag.suffix))
        }
    }
}

impl YamlNode {
    /// Is this the merge key `<<`?
    pub(crate) fn is_merge_key(&self) -> bool {
        matches!(&self.kind, NodeKind::Scalar { text, plain: true } if text == "<<")
            && self.tag.is_none()
    }

    /// Text of a scalar node
    pub(crate) fn scalar_text(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Scalar { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Parse every document in `text`
pub(crate) fn compose(text: &str) -> ArdResult<Vec<Arc<YamlNode>>> {
    let mut composer = Composer::default();
    Parser::new_from_str(text)
        .load(&mut composer, true)
        .map_err(|e| ArdError::decode(Format::Yaml, e.to_string()))?;

    match composer.error {
        Some(error) => Err(error),
        None => Ok(composer.documents),
    }
}

/// Run the parser without building nodes
pub(crate) fn scan(text: &str) -> ArdResult<()> {
    struct Discard;

    impl MarkedEventReceiver for Discard {
        fn on_event(&mut self, _event: Event, _mark: Marker) {}
    }

    Parser::new_from_str(text)
        .load(&mut Discard, true)
        .map_err(|e| ArdError::decode(Format::Yaml, e.to_string()))
}

// ==================== Composer ====================

/// A collection whose children are still arriving
struct Open {
    anchor: usize,
    tag: Option<NodeTag>,
    location: Location,
    content: OpenContent,
}

enum OpenContent {
    Sequence(Vec<Arc<YamlNode>>),
    Mapping {
        entries: Vec<(Arc<YamlNode>, Arc<YamlNode>)>,
        key: Option<Arc<YamlNode>>,
    },
}

#[derive(Default)]
struct Composer {
    stack: Vec<Open>,
    anchors: HashMap<usize, Arc<YamlNode>>,
    documents: Vec<Arc<YamlNode>>,
    error: Option<ArdError>,
}

impl Composer {
    fn complete(&mut self, node: Arc<YamlNode>, anchor: usize) {
        if anchor != 0 {
            self.anchors.insert(anchor, Arc::clone(&node));
        }

        match self.stack.last_mut() {
            None => self.documents.push(node),
            Some(open) => match &mut open.content {
                OpenContent::Sequence(items) => items.push(node),
                OpenContent::Mapping { entries, key } => match key.take() {
                    Some(key) => entries.push((key, node)),
                    None => *key = Some(node),
                },
            },
        }
    }

    fn close(&mut self) {
        let Some(open) = self.stack.pop() else {
            return;
        };

        let kind = match open.content {
            OpenContent::Sequence(items) => NodeKind::Sequence(items),
            OpenContent::Mapping { entries, .. } => NodeKind::Mapping(entries),
        };
        let node = Arc::new(YamlNode {
            kind,
            tag: open.tag,
            location: open.location,
        });
        self.complete(node, open.anchor);
    }
}

impl MarkedEventReceiver for Composer {
    fn on_event(&mut self, event: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }

        let location = Location {
            line: mark.line(),
            column: mark.col() + 1,
        };

        match event {
            Event::Scalar(text, style, anchor, tag) => {
                let node = Arc::new(YamlNode {
                    kind: NodeKind::Scalar {
                        text,
                        plain: style == TScalarStyle::Plain,
                    },
                    tag: tag.map(NodeTag::from_event),
                    location,
                });
                self.complete(node, anchor);
            }
            Event::SequenceStart(anchor, tag) => self.stack.push(Open {
                anchor,
                tag: tag.map(NodeTag::from_event),
                location,
                content: OpenContent::Sequence(Vec::new()),
            }),
            Event::MappingStart(anchor, tag) => self.stack.push(Open {
                anchor,
                tag: tag.map(NodeTag::from_event),
                location,
                content: OpenContent::Mapping {
                    entries: Vec::new(),
                    key: None,
                },
            }),
            Event::SequenceEnd | Event::MappingEnd => self.close(),
            Event::Alias(anchor) => match self.anchors.get(&anchor) {
                Some(node) => {
                    let node = Arc::clone(node);
                    self.complete(node, 0);
                }
                None => {
                    self.error = Some(ArdError::decode(
                        Format::Yaml,
                        format!("unknown alias at {location}"),
                    ));
                }
            },
            Event::DocumentEnd => self.anchors.clear(),
            _ => {}
        }
    }
}
