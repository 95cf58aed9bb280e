//! Byte offset to line/column conversion.

use crate::ByteOffset;
use std::fmt;
use text_size::TextSize;

/// A 1-based line and column, as shown to template authors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// 1-based line number.
    pub line: u32,
    /// 1-based column, counted in characters.
    pub column: u32,
}

impl Position {
    /// Creates a position.
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Start offsets of every line in a source string.
///
/// Lookups are a binary search over line starts, so building the index once
/// per template and resolving many offsets stays cheap.
#[derive(Debug, Clone)]
pub struct LineIndex {
    line_starts: Vec<ByteOffset>,
}

impl LineIndex {
    /// Indexes the line starts of `text`.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        line_starts.extend(
            text.match_indices('\n')
                .map(|(offset, _)| TextSize::from((offset + 1) as u32)),
        );
        Self { line_starts }
    }

    /// Number of lines in the indexed text.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Resolves `offset` to a 1-based position within `text`.
    ///
    /// `text` must be the string this index was built from. Offsets past the
    /// end clamp to the end of the text.
    pub fn position(&self, text: &str, offset: usize) -> Position {
        let offset = offset.min(text.len());
        let target = TextSize::from(offset as u32);
        let line = match self.line_starts.binary_search(&target) {
            Ok(line) => line,
            Err(next) => next - 1,
        };
        let line_start = u32::from(self.line_starts[line]) as usize;
        let column = text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(0);
        Position::new(line as u32 + 1, column as u32 + 1)
    }

    /// Convenience wrapper that builds a throwaway index.
    pub fn position_of(text: &str, offset: usize) -> Position {
        Self::new(text).position(text, offset)
    }
}
