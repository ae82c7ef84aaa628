// SPDX-License-Identifier: MIT
//
// FrameBuffer: the 2D cell grid the application paints to.
//
// Flat `Vec<Cell>` in row-major order, so a row is a contiguous slice and
// the diff renderer can compare whole rows with one slice equality.
// Wide characters take two cells: the codepoint, then a continuation.

use unicode_width::UnicodeWidthChar;

use crate::cell::{Attr, Cell, CellColor};

// ─── FrameBuffer ────────────────────────────────────────────────────────────────

/// A 2D buffer of terminal cells.
///
/// ```
/// use quasar_term::buffer::FrameBuffer;
/// use quasar_term::cell::Cell;
///
/// let mut buf = FrameBuffer::new(80, 24);
/// buf.set(5, 3, Cell::new('X'));
/// assert_eq!(buf.get(5, 3).unwrap().character(), Some('X'));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    /// A buffer filled with empty cells.
    #[must_use]
    pub fn new(width: u16, height: u16) -> Self {
        let size = usize::from(width) * usize::from(height);
        Self {
            width,
            height,
            cells: vec![Cell::EMPTY; size],
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    /// Width in columns.
    #[inline]
    #[must_use]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Height in rows.
    #[inline]
    #[must_use]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Whether `(x, y)` is inside the buffer.
    #[inline]
    #[must_use]
    pub const fn in_bounds(&self, x: u16, y: u16) -> bool {
        x < self.width && y < self.height
    }

    #[inline]
    const fn index(&self, x: u16, y: u16) -> usize {
        y as usize * self.width as usize + x as usize
    }

    /// The cell at `(x, y)`, or `None` if out of bounds.
    #[inline]
    #[must_use]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        if self.in_bounds(x, y) {
            Some(&self.cells[self.index(x, y)])
        } else {
            None
        }
    }

    /// One row as a slice, or `None` if `y` is out of bounds.
    #[inline]
    #[must_use]
    pub fn row(&self, y: u16) -> Option<&[Cell]> {
        if y < self.height {
            let start = self.index(0, y);
            Some(&self.cells[start..start + usize::from(self.width)])
        } else {
            None
        }
    }

    // ─── Clear & Resize ──────────────────────────────────────────────────

    /// Reset every cell to [`Cell::EMPTY`].
    pub fn clear(&mut self) {
        self.cells.fill(Cell::EMPTY);
    }

    /// Resize, discarding all content.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        let size = usize::from(width) * usize::from(height);
        self.cells.clear();
        self.cells.resize(size, Cell::EMPTY);
    }

    /// Copy the contents of a buffer with identical dimensions.
    ///
    /// # Panics
    ///
    /// Panics if the dimensions differ.
    pub fn copy_from(&mut self, other: &Self) {
        assert!(
            self.width == other.width && self.height == other.height,
            "copy_from requires equal dimensions"
        );
        self.cells.copy_from_slice(&other.cells);
    }

    // ─── Writing ─────────────────────────────────────────────────────────

    /// Write a cell. Returns `false` if `(x, y)` is out of bounds.
    #[inline]
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) -> bool {
        if !self.in_bounds(x, y) {
            return false;
        }
        let idx = self.index(x, y);
        self.cells[idx] = cell;
        true
    }

    /// Fill `width` cells of row `y` starting at `x` with a blank styled cell.
    pub fn fill(&mut self, x: u16, y: u16, width: u16, bg: CellColor) {
        let blank = Cell::EMPTY.with_bg(bg);
        let end = x.saturating_add(width).min(self.width);
        for col in x..end {
            self.set(col, y, blank);
        }
    }

    /// Paint `text` left to right from `(x, y)`, stopping at column `limit`
    /// (exclusive, clamped to the buffer width).
    ///
    /// Wide characters get a continuation cell; one that would straddle the
    /// limit is replaced with a space. Zero-width characters are skipped.
    /// Returns the number of columns consumed.
    #[allow(clippy::too_many_arguments)]
    pub fn paint_text(
        &mut self,
        x: u16,
        y: u16,
        limit: u16,
        text: &str,
        fg: CellColor,
        bg: CellColor,
        attrs: Attr,
    ) -> u16 {
        if y >= self.height {
            return 0;
        }
        let limit = limit.min(self.width);
        let mut col = x;

        for ch in text.chars() {
            if col >= limit {
                break;
            }
            let w = char_width(ch);
            if w == 0 {
                continue;
            }
            if w == 2 {
                if col + 1 >= limit {
                    self.set(col, y, Cell::styled(' ', fg, bg, attrs));
                    col += 1;
                    break;
                }
                self.set(col, y, Cell::styled(ch, fg, bg, attrs));
                self.set(col + 1, y, Cell::continuation(fg, bg, attrs));
                col += 2;
            } else {
                self.set(col, y, Cell::styled(ch, fg, bg, attrs));
                col += 1;
            }
        }

        col - x
    }
}

// ─── Text Width Utilities ───────────────────────────────────────────────────────

/// Display width of a character in terminal columns (0, 1 or 2).
#[inline]
#[must_use]
pub fn char_width(ch: char) -> usize {
    ch.width().unwrap_or(0)
}

/// Display width of a string in terminal columns.
#[must_use]
pub fn string_width(s: &str) -> usize {
    s.chars().map(char_width).sum()
}

// ─── Tests ──────────────────────────────────────────────────────────────────────
