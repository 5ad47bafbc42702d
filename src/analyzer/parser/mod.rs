//! Position-tracked parser for multi-document YAML input.
//!
//! `parse` splits the text on `---` separators, parses every document on its
//! own and returns trees whose node offsets all refer to the complete input.

pub mod node;
pub mod position;
pub mod yaml;

pub use node::{MapEntry, Node, NodeValue};
pub use position::LineIndex;

use crate::analyzer::types::Position;
use rayon::prelude::*;

/// A syntax error in one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub position: Position,
}

/// One unit of input text between document separators.
#[derive(Debug, Clone)]
pub struct Document {
    /// Zero-based index of the document in the input.
    pub index: usize,
    /// The value tree. `None` for blank documents and documents with errors.
    pub root: Option<Node>,
    /// First line of actual content (or the separator position for blank documents).
    pub start: Position,
    /// Character offset of the document chunk.
    pub start_offset: usize,
    /// The syntax error, if the document failed to parse.
    pub error: Option<ParseError>,
}

impl Document {
    /// A document with no usable content: only whitespace, comments or `null`.
    pub fn is_empty(&self) -> bool {
        self.error.is_none() && self.root.as_ref().is_none_or(Node::is_null)
    }
}

/// The result of parsing a complete input.
#[derive(Debug, Clone)]
pub struct ParsedInput {
    pub documents: Vec<Document>,
    pub line_index: LineIndex,
}

impl ParsedInput {
    /// Every syntax error, in document order.
    pub fn errors(&self) -> impl Iterator<Item = &ParseError> {
        self.documents.iter().filter_map(|d| d.error.as_ref())
    }

    /// Whether every document parsed.
    pub fn is_success(&self) -> bool {
        self.documents.iter().all(|d| d.error.is_none())
    }

    /// Documents that carry content.
    pub fn non_empty(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().filter(|d| !d.is_empty())
    }
}

/// Parse raw text into documents.
pub fn parse(text: &str) -> ParsedInput {
    let line_index = LineIndex::new(text);
    let chunks = yaml::split_documents(text);

    let documents: Vec<Document> = chunks
        .par_iter()
        .enumerate()
        .map(|(index, chunk)| {
            let start_offset = yaml::first_content_offset(chunk);
            let start = line_index.position(start_offset);
            match yaml::parse_chunk(chunk) {
                Ok(root) => Document {
                    index,
                    root,
                    start,
                    start_offset: chunk.offset,
                    error: None,
                },
                Err(err) => Document {
                    index,
                    root: None,
                    start,
                    start_offset: chunk.offset,
                    error: Some(ParseError {
                        message: err.message,
                        position: line_index.position(err.offset),
                    }),
                },
            }
        })
        .collect();

    log::debug!(
        "parsed {} document(s), {} with errors",
        documents.len(),
        documents.iter().filter(|d| d.error.is_some()).count()
    );

    ParsedInput {
        documents,
        line_index,
    }
}
