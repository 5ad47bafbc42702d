//! Offset to (line, column) index shared across a whole input.
//!
//! Offsets are character offsets into the complete input text, the same unit
//! the YAML scanner reports in its markers. The index is built once per
//! analysis run and never reset per document, so a node taken from any
//! document resolves against the original text.

use crate::analyzer::types::Position;

/// Maps character offsets of the input to 1-indexed positions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineIndex {
    /// Character offset at which each line starts.
    line_starts: Vec<usize>,
    /// Total number of characters in the input.
    len: usize,
}

impl LineIndex {
    /// Build the index for a complete input.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0];
        let mut len = 0;
        for (i, c) in text.chars().enumerate() {
            if c == '\n' {
                line_starts.push(i + 1);
            }
            len = i + 1;
        }
        Self { line_starts, len }
    }

    /// Resolve a character offset. Offsets past the end clamp to the end.
    pub fn position(&self, offset: usize) -> Position {
        let offset = offset.min(self.len);
        let line = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = offset - self.line_starts[line];
        Position::new((line + 1) as u32, (column + 1) as u32)
    }

    /// Character offset at which a 1-indexed line starts.
    pub fn line_start(&self, line: u32) -> Option<usize> {
        let idx = (line as usize).checked_sub(1)?;
        self.line_starts.get(idx).copied()
    }

    /// Number of lines in the input.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Number of characters in the input.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positions_across_lines() {
        let index = LineIndex::new("ab\ncd\n\nef");
        assert_eq!(index.position(0), Position::new(1, 1));
        assert_eq!(index.position(1), Position::new(1, 2));
        assert_eq!(index.position(3), Position::new(2, 1));
        assert_eq!(index.position(6), Position::new(3, 1));
        assert_eq!(index.position(8), Position::new(4, 2));
        assert_eq!(index.line_count(), 4);
    }

    #[test]
    fn test_offset_past_end_clamps() {
        let index = LineIndex::new("abc");
        assert_eq!(index.position(100), Position::new(1, 4));
    }

    #[test]
    fn test_empty_input() {
        let index = LineIndex::new("");
        assert!(index.is_empty());
        assert_eq!(index.position(0), Position::start());
        assert_eq!(index.line_start(1), Some(0));
        assert_eq!(index.line_start(0), None);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        let index = LineIndex::new("é: x\nb: y");
        // 'é' is two bytes but one character
        assert_eq!(index.position(5), Position::new(2, 1));
    }
}
