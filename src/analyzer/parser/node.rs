//! Position-tracked value tree and the optional path navigator.
//!
//! Every node remembers the character offsets it spans in the original
//! input. Rules never cast or index the tree directly; they walk it with
//! the `Option`-returning accessors below, so a missing or mistyped field
//! is simply `None`.

use crate::analyzer::parser::position::LineIndex;
use crate::analyzer::types::{Position, Span};
use std::collections::BTreeMap;

/// A node in a parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: NodeValue,
    /// Character offset where the node starts.
    pub start: usize,
    /// Character offset where the node ends.
    pub end: usize,
}

/// The value held by a node.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Sequence(Vec<Node>),
    Mapping(Vec<MapEntry>),
}

/// One `key: value` pair of a mapping, in source order.
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    /// The key rendered as a string.
    pub key: String,
    /// Character offset where the key starts.
    pub key_start: usize,
    pub value: Node,
}

impl Node {
    pub fn new(value: NodeValue, start: usize, end: usize) -> Self {
        Self { value, start, end }
    }

    /// Look up a mapping key. Later duplicates win, as in most loaders.
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.entry(key).map(|e| &e.value)
    }

    /// Look up a mapping entry (key position included).
    pub fn entry(&self, key: &str) -> Option<&MapEntry> {
        match &self.value {
            NodeValue::Mapping(entries) => entries.iter().rev().find(|e| e.key == key),
            _ => None,
        }
    }

    /// Index into a sequence.
    pub fn at(&self, index: usize) -> Option<&Node> {
        match &self.value {
            NodeValue::Sequence(items) => items.get(index),
            _ => None,
        }
    }

    /// Walk a list of segments. Numeric segments index into sequences.
    pub fn path(&self, segments: &[&str]) -> Option<&Node> {
        segments
            .iter()
            .try_fold(self, |node, segment| node.child(segment))
    }

    /// Resolve a slash-delimited pointer such as
    /// `/spec/template/spec/containers/0/image`.
    ///
    /// The empty pointer is the node itself. `~1` and `~0` decode to `/` and `~`.
    pub fn pointer(&self, pointer: &str) -> Option<&Node> {
        if pointer.is_empty() {
            return Some(self);
        }
        let rest = pointer.strip_prefix('/')?;
        rest.split('/')
            .try_fold(self, |node, segment| node.child(&unescape_segment(segment)))
    }

    fn child(&self, segment: &str) -> Option<&Node> {
        match &self.value {
            NodeValue::Mapping(_) => self.get(segment),
            NodeValue::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.value {
            NodeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match &self.value {
            NodeValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match &self.value {
            NodeValue::Int(n) => Some(*n as f64),
            NodeValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match &self.value {
            NodeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Node]> {
        match &self.value {
            NodeValue::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> Option<&[MapEntry]> {
        match &self.value {
            NodeValue::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Sequence items, or an empty slice for anything else.
    pub fn items(&self) -> &[Node] {
        self.as_sequence().unwrap_or(&[])
    }

    /// Mapping entries, or an empty slice for anything else.
    pub fn entries(&self) -> &[MapEntry] {
        self.as_mapping().unwrap_or(&[])
    }

    pub fn is_null(&self) -> bool {
        matches!(self.value, NodeValue::Null)
    }

    pub fn is_mapping(&self) -> bool {
        matches!(self.value, NodeValue::Mapping(_))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.value, NodeValue::Sequence(_))
    }

    /// Any scalar except null, rendered as a string.
    pub fn scalar_string(&self) -> Option<String> {
        match &self.value {
            NodeValue::String(s) => Some(s.clone()),
            NodeValue::Int(n) => Some(n.to_string()),
            NodeValue::Float(f) => Some(f.to_string()),
            NodeValue::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// A mapping of scalars as strings. Non-scalar values are skipped.
    pub fn string_map(&self) -> BTreeMap<String, String> {
        self.entries()
            .iter()
            .filter_map(|e| e.value.scalar_string().map(|v| (e.key.clone(), v)))
            .collect()
    }

    /// Name of the node's type as used in messages.
    pub fn type_name(&self) -> &'static str {
        match &self.value {
            NodeValue::Null => "null",
            NodeValue::Bool(_) => "boolean",
            NodeValue::Int(_) => "integer",
            NodeValue::Float(_) => "number",
            NodeValue::String(_) => "string",
            NodeValue::Sequence(_) => "array",
            NodeValue::Mapping(_) => "object",
        }
    }

    /// Start position of the node.
    pub fn position(&self, index: &LineIndex) -> Position {
        index.position(self.start)
    }

    /// Full span of the node.
    pub fn span(&self, index: &LineIndex) -> Span {
        Span::new(index.position(self.start), index.position(self.end))
    }

    /// Convert to a JSON value for schema validation.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;
        match &self.value {
            NodeValue::Null => Value::Null,
            NodeValue::Bool(b) => Value::Bool(*b),
            NodeValue::Int(n) => Value::from(*n),
            NodeValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            NodeValue::String(s) => Value::String(s.clone()),
            NodeValue::Sequence(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            NodeValue::Mapping(entries) => {
                let mut map = serde_json::Map::new();
                for entry in entries {
                    map.insert(entry.key.clone(), entry.value.to_json());
                }
                Value::Object(map)
            }
        }
    }

    /// Number of nodes in this subtree, the node itself included.
    pub fn weight(&self) -> usize {
        1 + match &self.value {
            NodeValue::Sequence(items) => items.iter().map(Node::weight).sum(),
            NodeValue::Mapping(entries) => entries.iter().map(|e| 1 + e.value.weight()).sum(),
            _ => 0,
        }
    }
}

impl MapEntry {
    /// Start position of the key.
    pub fn key_position(&self, index: &LineIndex) -> Position {
        index.position(self.key_start)
    }
}

/// Decode one pointer segment.
pub fn unescape_segment(segment: &str) -> String {
    segment.replace("~1", "/").replace("~0", "~")
}

/// Encode one pointer segment.
pub fn escape_segment(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Join segments into a pointer.
pub fn join_pointer<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|s| format!("/{}", escape_segment(s.as_ref())))
        .collect()
}
