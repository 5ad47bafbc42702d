//! YAML event handling for the position-tracked tree.
//!
//! The input is split on document separators first and every chunk is run
//! through its own `yaml_rust2` parser, so a syntax error in one document
//! leaves the others intact. Marker offsets are shifted by the chunk start,
//! which keeps every node span relative to the complete input.

use crate::analyzer::parser::node::{MapEntry, Node, NodeValue};
use std::collections::HashMap;
use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::{Marker, TScalarStyle};

/// Deepest collection nesting accepted before a document is rejected.
pub const MAX_DEPTH: usize = 256;

/// Largest number of nodes a single document may expand to (aliases included).
pub const MAX_NODES: usize = 1_000_000;

/// A slice of the input between document separators.
#[derive(Debug, Clone, Copy)]
pub struct Chunk<'a> {
    pub text: &'a str,
    /// Character offset of `text` within the input.
    pub offset: usize,
}

/// Split raw text on `---` separator lines.
///
/// Always returns at least one chunk. Content after the separator on the
/// same line belongs to the following chunk.
pub fn split_documents(text: &str) -> Vec<Chunk<'_>> {
    let mut chunks = Vec::new();
    let mut chunk_byte = 0;
    let mut chunk_char = 0;
    let mut line_byte = 0;
    let mut line_char = 0;

    for line in text.split_inclusive('\n') {
        if is_separator(line) {
            chunks.push(Chunk {
                text: &text[chunk_byte..line_byte],
                offset: chunk_char,
            });
            chunk_byte = line_byte + 3;
            chunk_char = line_char + 3;
        }
        line_byte += line.len();
        line_char += line.chars().count();
    }

    chunks.push(Chunk {
        text: &text[chunk_byte..],
        offset: chunk_char,
    });
    chunks
}

fn is_separator(line: &str) -> bool {
    let Some(rest) = line.strip_prefix("---") else {
        return false;
    };
    let rest = rest.trim_end_matches(['\n', '\r']);
    rest.is_empty() || rest.starts_with([' ', '\t'])
}

/// Offset of the first character that is neither whitespace nor part of a
/// comment or directive line.
pub fn first_content_offset(chunk: &Chunk<'_>) -> usize {
    let mut offset = chunk.offset;
    for line in chunk.text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let body = trimmed.trim_end();
        if !body.is_empty() && !body.starts_with('#') && !body.starts_with('%') {
            let indent = line.chars().count() - trimmed.chars().count();
            return offset + indent;
        }
        offset += line.chars().count();
    }
    chunk.offset
}

/// Why a chunk failed to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkError {
    pub message: String,
    /// Character offset in the complete input.
    pub offset: usize,
}

/// Parse one chunk into at most one root node.
pub fn parse_chunk(chunk: &Chunk<'_>) -> Result<Option<Node>, ChunkError> {
    let mut builder = TreeBuilder::new(chunk.offset);
    let mut parser = Parser::new_from_str(chunk.text);

    if let Err(err) = parser.load(&mut builder, true) {
        return Err(ChunkError {
            message: err.info().to_string(),
            offset: chunk.offset + err.marker().index(),
        });
    }
    if let Some(err) = builder.error.take() {
        return Err(err);
    }

    let mut roots = builder.documents.into_iter().flatten();
    let root = roots.next();
    if roots.next().is_some() {
        log::debug!(
            "ignoring extra documents after an explicit end marker at offset {}",
            chunk.offset
        );
    }
    Ok(root)
}

enum Frame {
    Sequence {
        start: usize,
        anchor: usize,
        height: usize,
        items: Vec<Node>,
    },
    Mapping {
        start: usize,
        anchor: usize,
        height: usize,
        entries: Vec<MapEntry>,
        pending_key: Option<Node>,
    },
}

impl Frame {
    fn height_mut(&mut self) -> &mut usize {
        match self {
            Frame::Sequence { height, .. } | Frame::Mapping { height, .. } => height,
        }
    }
}

/// Builds `Node` trees from parser events.
struct TreeBuilder {
    offset: usize,
    stack: Vec<Frame>,
    /// Anchored nodes with their collection height.
    anchors: HashMap<usize, (Node, usize)>,
    documents: Vec<Option<Node>>,
    current: Option<Node>,
    nodes: usize,
    /// Depth of collections being skipped after a limit was hit.
    skipping: usize,
    error: Option<ChunkError>,
}

impl TreeBuilder {
    fn new(offset: usize) -> Self {
        Self {
            offset,
            stack: Vec::new(),
            anchors: HashMap::new(),
            documents: Vec::new(),
            current: None,
            nodes: 0,
            skipping: 0,
            error: None,
        }
    }

    fn fail(&mut self, message: String, offset: usize) {
        if self.error.is_none() {
            self.error = Some(ChunkError { message, offset });
        }
    }

    fn start_collection(&mut self, frame: Frame, at: usize) {
        if self.skipping > 0 || self.error.is_some() {
            self.skipping += 1;
            return;
        }
        if self.stack.len() >= MAX_DEPTH {
            self.fail(format!("nesting exceeds {} levels", MAX_DEPTH), at);
            self.skipping = 1;
            return;
        }
        self.stack.push(frame);
    }

    fn end_collection(&mut self, at: usize) {
        if self.skipping > 0 {
            self.skipping -= 1;
            return;
        }
        let Some(frame) = self.stack.pop() else {
            return;
        };
        let (node, anchor, height) = match frame {
            Frame::Sequence {
                start,
                anchor,
                height,
                items,
            } => (Node::new(NodeValue::Sequence(items), start, at), anchor, height + 1),
            Frame::Mapping {
                start,
                anchor,
                height,
                entries,
                ..
            } => (Node::new(NodeValue::Mapping(entries), start, at), anchor, height + 1),
        };
        self.insert(node, anchor, height);
    }

    /// Paste an anchored subtree. Its height counts against the nesting limit
    /// so chained aliases cannot build a tree deeper than a parsed one.
    fn insert_alias(&mut self, id: usize, at: usize) {
        let Some((target, height)) = self.anchors.get(&id) else {
            self.insert(Node::new(NodeValue::Null, at, at), 0, 0);
            return;
        };
        let height = *height;
        if self.stack.len() + height > MAX_DEPTH {
            self.fail(format!("nesting exceeds {} levels", MAX_DEPTH), at);
            return;
        }
        let extra = target.weight().saturating_sub(1);
        if self.nodes.saturating_add(extra) >= MAX_NODES {
            self.fail(
                format!("document expands to more than {} nodes", MAX_NODES),
                at,
            );
            return;
        }
        let target = target.clone();
        self.nodes += extra;
        self.insert(target, 0, height);
    }

    fn insert(&mut self, node: Node, anchor: usize, height: usize) {
        if self.error.is_some() {
            return;
        }
        self.nodes += 1;
        if self.nodes > MAX_NODES {
            self.fail(
                format!("document expands to more than {} nodes", MAX_NODES),
                node.start,
            );
            return;
        }
        if anchor > 0 {
            self.anchors.insert(anchor, (node.clone(), height));
        }

        if let Some(frame) = self.stack.last_mut() {
            let frame_height = frame.height_mut();
            *frame_height = (*frame_height).max(height);
        }
        match self.stack.last_mut() {
            None => self.current = Some(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                None => *pending_key = Some(node),
                Some(key) => entries.push(MapEntry {
                    key: key_string(&key),
                    key_start: key.start,
                    value: node,
                }),
            },
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, event: Event, mark: Marker) {
        let at = self.offset + mark.index();
        match event {
            Event::DocumentStart { .. } => {
                self.stack.clear();
                self.current = None;
            }
            Event::DocumentEnd { .. } => {
                let root = self.current.take();
                self.documents.push(root);
            }
            Event::Scalar(value, style, anchor, ..) => {
                if self.skipping > 0 {
                    return;
                }
                let quoted = !matches!(style, TScalarStyle::Plain);
                let width = value.chars().count() + if quoted { 2 } else { 0 };
                let resolved = if quoted {
                    NodeValue::String(value)
                } else {
                    resolve_plain(value)
                };
                self.insert(Node::new(resolved, at, at + width), anchor, 0);
            }
            Event::SequenceStart(anchor, ..) => self.start_collection(
                Frame::Sequence {
                    start: at,
                    anchor,
                    height: 0,
                    items: Vec::new(),
                },
                at,
            ),
            Event::MappingStart(anchor, ..) => self.start_collection(
                Frame::Mapping {
                    start: at,
                    anchor,
                    height: 0,
                    entries: Vec::new(),
                    pending_key: None,
                },
                at,
            ),
            Event::SequenceEnd { .. } | Event::MappingEnd { .. } => self.end_collection(at),
            Event::Alias(id) => {
                if self.skipping > 0 || self.error.is_some() {
                    return;
                }
                self.insert_alias(id, at);
            }
            _ => {}
        }
    }
}

fn key_string(key: &Node) -> String {
    match &key.value {
        NodeValue::Null => "null".to_string(),
        NodeValue::Sequence(_) | NodeValue::Mapping(_) => format!("<{}>", key.type_name()),
        _ => key.scalar_string().unwrap_or_default(),
    }
}

/// Resolve a plain scalar with YAML 1.2 core schema rules.
pub fn resolve_plain(value: String) -> NodeValue {
    match value.as_str() {
        "" | "~" | "null" | "Null" | "NULL" => return NodeValue::Null,
        "true" | "True" | "TRUE" => return NodeValue::Bool(true),
        "false" | "False" | "FALSE" => return NodeValue::Bool(false),
        ".inf" | ".Inf" | ".INF" | "+.inf" | "+.Inf" | "+.INF" => {
            return NodeValue::Float(f64::INFINITY);
        }
        "-.inf" | "-.Inf" | "-.INF" => return NodeValue::Float(f64::NEG_INFINITY),
        ".nan" | ".NaN" | ".NAN" => return NodeValue::Float(f64::NAN),
        _ => {}
    }

    if let Some(n) = parse_int(&value) {
        return NodeValue::Int(n);
    }
    if looks_like_float(&value) {
        if let Ok(f) = value.parse::<f64>() {
            return NodeValue::Float(f);
        }
    }
    NodeValue::String(value)
}

fn parse_int(value: &str) -> Option<i64> {
    if let Some(hex) = value.strip_prefix("0x") {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(oct) = value.strip_prefix("0o") {
        return i64::from_str_radix(oct, 8).ok();
    }
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

fn looks_like_float(value: &str) -> bool {
    value.bytes().any(|b| b.is_ascii_digit())
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_documents() {
        let chunks = split_documents("a: 1\n---\nb: 2\n--- # trailing\n");
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "a: 1\n");
        assert_eq!(chunks[0].offset, 0);
        assert_eq!(chunks[1].text, "\nb: 2\n");
        assert_eq!(chunks[1].offset, 8);
        assert_eq!(chunks[2].text, " # trailing\n");
    }

    #[test]
    fn test_separator_needs_column_one() {
        let chunks = split_documents("a: |\n  ---\n  text\n----\n");
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_resolve_plain_scalars() {
        assert_eq!(resolve_plain("~".into()), NodeValue::Null);
        assert_eq!(resolve_plain("true".into()), NodeValue::Bool(true));
        assert_eq!(resolve_plain("42".into()), NodeValue::Int(42));
        assert_eq!(resolve_plain("-7".into()), NodeValue::Int(-7));
        assert_eq!(resolve_plain("0x1F".into()), NodeValue::Int(31));
        assert_eq!(resolve_plain("1.5".into()), NodeValue::Float(1.5));
        assert_eq!(resolve_plain("yes".into()), NodeValue::String("yes".into()));
        assert_eq!(resolve_plain("inf".into()), NodeValue::String("inf".into()));
        assert_eq!(resolve_plain("100m".into()), NodeValue::String("100m".into()));
        assert_eq!(resolve_plain("1.2.3".into()), NodeValue::String("1.2.3".into()));
    }

    #[test]
    fn test_quoted_scalars_stay_strings() {
        let chunk = Chunk {
            text: "port: \"8080\"\nother: 8080\n",
            offset: 0,
        };
        let root = parse_chunk(&chunk).unwrap().unwrap();
        assert_eq!(root.get("port").and_then(Node::as_str), Some("8080"));
        assert_eq!(root.get("other").and_then(Node::as_i64), Some(8080));
    }

    #[test]
    fn test_aliases_expand() {
        let chunk = Chunk {
            text: "base: &b {x: 1}\ncopy: *b\n",
            offset: 0,
        };
        let root = parse_chunk(&chunk).unwrap().unwrap();
        assert_eq!(root.pointer("/copy/x").and_then(Node::as_i64), Some(1));
    }

    #[test]
    fn test_deep_nesting_is_an_error() {
        let text = format!("{}{}", "[".repeat(MAX_DEPTH + 10), "]".repeat(MAX_DEPTH + 10));
        let chunk = Chunk {
            text: &text,
            offset: 0,
        };
        let err = parse_chunk(&chunk).unwrap_err();
        assert!(err.message.contains("nesting"));
    }

    fn wrapped(depth: usize, inner: &str) -> String {
        format!("{}{} {}", "[".repeat(depth), inner, "]".repeat(depth))
    }

    #[test]
    fn test_chained_aliases_respect_nesting_limit() {
        let mut text = format!("a0: &a0 {}\n", wrapped(200, "1"));
        for i in 1..4 {
            let inner = wrapped(200, &format!("*a{}", i - 1));
            text.push_str(&format!("a{}: &a{} {}\n", i, i, inner));
        }
        let chunk = Chunk {
            text: &text,
            offset: 0,
        };
        let err = parse_chunk(&chunk).unwrap_err();
        assert!(err.message.contains("nesting exceeds 256 levels"));
    }

    #[test]
    fn test_shallow_alias_inside_nesting_is_kept() {
        let text = format!("a: &a {}\nb: {}\n", wrapped(100, "1"), wrapped(100, "*a"));
        let chunk = Chunk {
            text: &text,
            offset: 0,
        };
        let root = parse_chunk(&chunk).unwrap().unwrap();
        let mut node = root.get("b").unwrap();
        for _ in 0..200 {
            node = node.at(0).unwrap();
        }
        assert_eq!(node.as_i64(), Some(1));
    }

    #[test]
    fn test_syntax_error_offset_is_global() {
        let chunk = Chunk {
            text: "a: [1, 2\n",
            offset: 100,
        };
        let err = parse_chunk(&chunk).unwrap_err();
        assert!(err.offset >= 100);
    }

    #[test]
    fn test_first_content_offset_skips_comments() {
        let chunk = Chunk {
            text: "\n# header\n  kind: Pod\n",
            offset: 10,
        };
        // "\n" (1) + "# header\n" (9) + two spaces of indent
        assert_eq!(first_content_offset(&chunk), 10 + 1 + 9 + 2);
    }
}
