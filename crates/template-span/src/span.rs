//! Byte spans into template source text.

use text_size::{TextRange, TextSize};

/// A byte offset into a template source string.
pub type ByteOffset = TextSize;

/// A half-open byte range `[start, end)` in template source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Inclusive start offset.
    pub start: ByteOffset,
    /// Exclusive end offset.
    pub end: ByteOffset,
}

impl Span {
    /// Creates a span from start and end offsets.
    #[inline]
    pub fn new(start: impl Into<ByteOffset>, end: impl Into<ByteOffset>) -> Self {
        Self {
            start: start.into(),
            end: end.into(),
        }
    }

    /// Creates a span from `usize` offsets, as produced by string scanning.
    #[inline]
    pub fn from_usize(start: usize, end: usize) -> Self {
        Self::new(TextSize::from(start as u32), TextSize::from(end as u32))
    }

    /// Creates an empty span at `offset`.
    #[inline]
    pub fn at(offset: usize) -> Self {
        Self::from_usize(offset, offset)
    }

    /// Length in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        u32::from(self.end - self.start) as usize
    }

    /// Whether the span covers no bytes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Start offset as `usize`.
    #[inline]
    pub fn start_usize(&self) -> usize {
        u32::from(self.start) as usize
    }

    /// End offset as `usize`.
    #[inline]
    pub fn end_usize(&self) -> usize {
        u32::from(self.end) as usize
    }

    /// Returns the smallest span covering both `self` and `other`.
    #[inline]
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// Returns the slice of `source` this span covers, if it is in bounds.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start_usize()..self.end_usize())
    }
}

impl From<TextRange> for Span {
    fn from(range: TextRange) -> Self {
        Self::new(range.start(), range.end())
    }
}

impl From<Span> for TextRange {
    fn from(span: Span) -> Self {
        TextRange::new(span.start, span.end)
    }
}
