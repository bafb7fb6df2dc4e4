//! Position and location tracking for operation documents
//!
//! Positions are zero-based line/column pairs. Every record and content block keeps a [`Range`]
//! so that parse and validation errors can point back at the source, and so that markdown
//! embedded documents can be shifted back onto the lines of the enclosing markdown file.
//!
//! - [`Position`] - A line:column position in source text
//! - [`Range`] - A byte span plus start/end positions
//! - [`SourceLocation`] - Converts byte offsets to positions

use serde::Serialize;
use std::ops::Range as ByteRange;

/// A position in source text (zero-based line and column)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Move this position down by `lines`, keeping the column.
    pub fn shifted(self, lines: usize) -> Self {
        Self::new(self.line + lines, self.column)
    }
}

/// A location in source text (byte span plus start and end positions)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Range {
    pub span: ByteRange<usize>,
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn new(span: ByteRange<usize>, start: Position, end: Position) -> Self {
        Self { span, start, end }
    }

    /// Translate the range by a number of lines and bytes.
    ///
    /// Used when a document fragment was tokenized on its own and has to be
    /// re-anchored inside the file it was extracted from.
    pub fn shifted(&self, lines: usize, bytes: usize) -> Self {
        Range::new(
            self.span.start + bytes..self.span.end + bytes,
            self.start.shifted(lines),
            self.end.shifted(lines),
        )
    }
}

impl Default for Range {
    fn default() -> Self {
        Self::new(0..0, Position::default(), Position::default())
    }
}

/// Provides fast conversion from byte offsets to line/column positions
pub struct SourceLocation {
    /// Byte offsets where each line starts
    line_starts: Vec<usize>,
}

impl SourceLocation {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];

        for (byte_pos, ch) in source.char_indices() {
            if ch == '\n' {
                line_starts.push(byte_pos + 1);
            }
        }

        Self { line_starts }
    }

    /// Convert a byte offset to a line/column position
    pub fn byte_to_position(&self, byte_offset: usize) -> Position {
        let line = self
            .line_starts
            .binary_search(&byte_offset)
            .unwrap_or_else(|i| i - 1);

        Position::new(line, byte_offset - self.line_starts[line])
    }

    /// Convert a byte range to a [`Range`]
    pub fn byte_range_to_range(&self, range: &ByteRange<usize>) -> Range {
        Range::new(
            range.clone(),
            self.byte_to_position(range.start),
            self.byte_to_position(range.end),
        )
    }

    /// Get the byte offset for the start of a line
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_ordering() {
        assert!(Position::new(1, 5) < Position::new(2, 0));
        assert!(Position::new(1, 5) > Position::new(1, 4));
        assert_eq!(Position::new(3, 1), Position::new(3, 1));
    }

    #[test]
    fn test_range_shifted() {
        let range = Range::new(4..9, Position::new(0, 4), Position::new(1, 2));
        let moved = range.shifted(10, 100);

        assert_eq!(moved.span, 104..109);
        assert_eq!(moved.start, Position::new(10, 4));
        assert_eq!(moved.end, Position::new(11, 2));
    }

    #[test]
    fn test_byte_to_position_multiline() {
        let loc = SourceLocation::new("Hello\nworld\ntest");

        assert_eq!(loc.byte_to_position(0), Position::new(0, 0));
        assert_eq!(loc.byte_to_position(5), Position::new(0, 5));
        assert_eq!(loc.byte_to_position(6), Position::new(1, 0));
        assert_eq!(loc.byte_to_position(10), Position::new(1, 4));
        assert_eq!(loc.byte_to_position(12), Position::new(2, 0));
    }

    #[test]
    fn test_byte_to_position_with_unicode() {
        let loc = SourceLocation::new("Hello\nwörld");
        assert_eq!(loc.byte_to_position(6), Position::new(1, 0));
        assert_eq!(loc.byte_to_position(7), Position::new(1, 1));
    }

    #[test]
    fn test_line_start() {
        let loc = SourceLocation::new("Hello\nWorld\nTest");

        assert_eq!(loc.line_start(1), Some(6));
        assert_eq!(loc.line_start(3), None);
    }
}
