//! Cursor and scroll offset.
//!
//! The cursor addresses a character boundary as `(block, line, col)`.
//! Columns count Unicode scalar values, not bytes or display cells; the
//! view converts to screen columns when painting.
//!
//! The [`Document`](crate::document::Document) owns the only cursor and
//! keeps it inside these bounds after every operation:
//!
//! - `block < blocks.len()`
//! - `line < blocks[block].lines.len()`
//! - `col <= chars(line)`

/// A position in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Cursor {
    pub block: usize,
    pub line: usize,
    pub col: usize,
}

impl Cursor {
    /// Block 0, line 0, column 0.
    pub const ORIGIN: Self = Self::new(0, 0, 0);

    #[must_use]
    pub const fn new(block: usize, line: usize, col: usize) -> Self {
        Self { block, line, col }
    }
}

/// The first visible document row and character column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scroll {
    pub row: usize,
    pub col: usize,
}

// ---------------------------------------------------------------------------
// Character-column helpers
// ---------------------------------------------------------------------------

/// Number of characters in `line`.
#[inline]
#[must_use]
pub fn char_len(line: &str) -> usize {
    line.chars().count()
}

/// Byte offset of character column `col`, clamped to the end of `line`.
#[must_use]
pub fn byte_offset(line: &str, col: usize) -> usize {
    line.char_indices().nth(col).map_or(line.len(), |(i, _)| i)
}
