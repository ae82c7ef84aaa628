//! The block document and every operation that edits it.
//!
//! A [`Document`] is an ordered, never-empty list of [`Block`]s plus the
//! single [`Cursor`]. All text mutation goes through the methods here; each
//! one leaves the cursor in bounds and records the mutation on the block it
//! touched (new revision, back to `Dirty`).
//!
//! # Math detection
//!
//! Typing the second `$` of a `$$` pair inside a text block splits that
//! block in up to three: the text before the marker, a new math block
//! `["$$", "", "$$"]`, and the text after it. Empty parts are omitted, and
//! the cursor lands on the math block's empty middle line.
//!
//! # Leaving math
//!
//! Enter on a math block's closing `$$` line opens a fresh text block below
//! instead of growing the formula. Backspace on the empty last line of a
//! math block longer than two lines removes the whole block. A fresh
//! `["$$", "", "$$"]` ends on its closing delimiter, so it never matches.

use crate::block::{Block, BlockId, BlockKind, MATH_DELIMITER};
use crate::cursor::{Cursor, Scroll, byte_offset, char_len};
use unicode_width::UnicodeWidthChar;

/// Lines of a new document.
pub const WELCOME: [&str; 2] = ["Welcome to quasar notes", "Type $$ to create a math block."];

/// Size of the text area the cursor must stay visible in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
}

// ---------------------------------------------------------------------------
// Document
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Document {
    blocks: Vec<Block>,
    cursor: Cursor,
    next_id: u64,
    viewport: Viewport,
    scroll: Scroll,
}

impl Document {
    /// A document holding the welcome text.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts([(BlockKind::Text, WELCOME)])
    }

    /// A document built from `(kind, lines)` pairs, cursor at the origin.
    ///
    /// No parts gives one empty text block; math parts shorter than two
    /// lines are closed with `$$`.
    #[must_use]
    pub fn from_parts<P, L, S>(parts: P) -> Self
    where
        P: IntoIterator<Item = (BlockKind, L)>,
        L: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut doc = Self {
            blocks: Vec::new(),
            cursor: Cursor::ORIGIN,
            next_id: 0,
            viewport: Viewport::default(),
            scroll: Scroll::default(),
        };
        for (kind, lines) in parts {
            let block = doc.alloc(kind, lines.into_iter().map(Into::into).collect());
            doc.blocks.push(block);
        }
        if doc.blocks.is_empty() {
            let block = doc.alloc(BlockKind::Text, Vec::new());
            doc.blocks.push(block);
        }
        doc
    }

    fn alloc(&mut self, kind: BlockKind, mut lines: Vec<String>) -> Block {
        let id = BlockId::new(self.next_id);
        self.next_id += 1;
        if kind == BlockKind::Math {
            while lines.len() < 2 {
                lines.push(MATH_DELIMITER.to_owned());
            }
        }
        Block::new(id, kind, lines)
    }

    // --- read access --------------------------------------------------------

    #[inline]
    #[must_use]
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    #[inline]
    #[must_use]
    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub(crate) fn block_mut(&mut self, index: usize) -> Option<&mut Block> {
        self.blocks.get_mut(index)
    }

    /// Index of the block with `id`, if it still exists.
    #[must_use]
    pub fn position_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id() == id)
    }

    #[inline]
    #[must_use]
    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// The block under the cursor.
    #[must_use]
    pub fn current_block(&self) -> &Block {
        &self.blocks[self.cursor.block]
    }

    /// The line under the cursor.
    #[must_use]
    pub fn current_line(&self) -> &str {
        &self.current_block().lines()[self.cursor.line]
    }

    #[inline]
    #[must_use]
    pub const fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[inline]
    #[must_use]
    pub const fn scroll(&self) -> Scroll {
        self.scroll
    }

    /// Lines across all blocks.
    #[must_use]
    pub fn total_lines(&self) -> usize {
        self.blocks.iter().map(Block::line_count).sum()
    }

    /// Document row of the first line of block `index`.
    ///
    /// Every block occupies exactly its line count, rendered or not.
    #[must_use]
    pub fn block_start_row(&self, index: usize) -> usize {
        self.blocks[..index.min(self.blocks.len())]
            .iter()
            .map(Block::line_count)
            .sum()
    }

    /// Document row of the cursor.
    #[must_use]
    pub fn global_row(&self) -> usize {
        self.block_start_row(self.cursor.block) + self.cursor.line
    }

    // --- cursor -------------------------------------------------------------

    /// Place the cursor, clamping each coordinate into range.
    pub fn set_cursor(&mut self, cursor: Cursor) {
        let block = cursor.block.min(self.blocks.len() - 1);
        let line = cursor.line.min(self.blocks[block].line_count() - 1);
        let col = cursor.col.min(char_len(&self.blocks[block].lines()[line]));
        self.cursor = Cursor::new(block, line, col);
        self.ensure_cursor_in_view();
    }

    /// Move by whole lines, crossing block boundaries, then by columns
    /// within the resulting line. Stops at the document edges.
    pub fn move_cursor(&mut self, line_delta: isize, col_delta: isize) {
        let mut c = self.cursor;

        for _ in 0..line_delta.unsigned_abs() {
            if line_delta < 0 {
                if c.line > 0 {
                    c.line -= 1;
                } else if c.block > 0 {
                    c.block -= 1;
                    c.line = self.blocks[c.block].line_count() - 1;
                } else {
                    break;
                }
            } else if c.line + 1 < self.blocks[c.block].line_count() {
                c.line += 1;
            } else if c.block + 1 < self.blocks.len() {
                c.block += 1;
                c.line = 0;
            } else {
                break;
            }
        }

        let len = char_len(&self.blocks[c.block].lines()[c.line]);
        c.col = c.col.saturating_add_signed(col_delta).min(len);

        self.cursor = c;
        self.ensure_cursor_in_view();
    }

    /// Cursor to the end of the current line.
    pub fn end_of_line(&mut self) {
        self.cursor.col = char_len(self.current_line());
        self.ensure_cursor_in_view();
    }

    // --- editing ------------------------------------------------------------

    /// Insert `ch` at the cursor.
    ///
    /// Completing a `$$` in a text block splits out a math block instead of
    /// marking the block dirty.
    pub fn insert_char(&mut self, ch: char) {
        let Cursor { block, line, col } = self.cursor;
        let target = &mut self.blocks[block];
        let is_text = target.kind() == BlockKind::Text;
        let text = &mut target.lines_mut()[line];
        let at = byte_offset(text, col);
        text.insert(at, ch);
        self.cursor.col += 1;

        let completes_marker =
            is_text && col >= 1 && text.chars().skip(col - 1).take(2).all(|c| c == '$');
        if completes_marker && self.split_for_math() {
            return;
        }

        self.blocks[block].touch();
        self.ensure_cursor_in_view();
    }

    /// Insert pasted text. Newlines break lines; carriage returns and other
    /// control characters are dropped, tabs become a space.
    pub fn insert_str(&mut self, text: &str) {
        for ch in text.chars() {
            match ch {
                '\n' => self.insert_newline(),
                '\t' => self.insert_char(' '),
                c if c.is_control() => {}
                c => self.insert_char(c),
            }
        }
    }

    /// Split the current text block around the `$$` just before the cursor.
    ///
    /// Returns `false`, changing nothing, when the cursor is not in a text
    /// block right after a `$$`.
    pub fn split_for_math(&mut self) -> bool {
        let Cursor { block, line, col } = self.cursor;
        let original = &self.blocks[block];
        if original.kind() != BlockKind::Text
            || col < 2
            || !original.lines()[line].chars().skip(col - 2).take(2).eq("$$".chars())
        {
            return false;
        }

        let mut prior = self.blocks.remove(block).into_lines();
        let rest = prior.split_off(line + 1);
        let split_line = prior.pop().unwrap_or_default();

        let before = &split_line[..byte_offset(&split_line, col - 2)];
        let after = &split_line[byte_offset(&split_line, col)..];

        let mut leading = prior;
        if !before.is_empty() {
            leading.push(before.to_owned());
        }
        let mut trailing = Vec::with_capacity(rest.len() + 1);
        if !after.is_empty() {
            trailing.push(after.to_owned());
        }
        trailing.extend(rest);

        let mut at = block;
        if !leading.is_empty() {
            let text = self.alloc(BlockKind::Text, leading);
            self.blocks.insert(at, text);
            at += 1;
        }
        let math = self.alloc(
            BlockKind::Math,
            vec![MATH_DELIMITER.to_owned(), String::new(), MATH_DELIMITER.to_owned()],
        );
        self.blocks.insert(at, math);
        if !trailing.is_empty() {
            let text = self.alloc(BlockKind::Text, trailing);
            self.blocks.insert(at + 1, text);
        }

        tracing::debug!(block = at, "math block opened");
        self.cursor = Cursor::new(at, 1, 0);
        self.ensure_cursor_in_view();
        true
    }

    /// Delete backwards.
    ///
    /// In priority order:
    ///
    /// 1. on the empty last line of a math block with more than two
    ///    lines, remove the whole block;
    /// 2. delete the character before the cursor;
    /// 3. join the line into the previous line of the block (a math block
    ///    that would drop below two lines is removed instead);
    /// 4. merge the block into the previous block.
    pub fn backspace(&mut self) {
        let Cursor { block, line, col } = self.cursor;
        let current = &mut self.blocks[block];
        let last_line = current.line_count() - 1;

        let collapses = current.is_math()
            && line == last_line
            && current.lines()[line].is_empty()
            && current.line_count() > 2;

        if collapses {
            self.remove_block(block);
        } else if col > 0 {
            let text = &mut current.lines_mut()[line];
            let at = byte_offset(text, col - 1);
            text.remove(at);
            current.touch();
            self.cursor.col -= 1;
        } else if line > 0 {
            if current.is_math() && current.line_count() <= 2 {
                self.remove_block(block);
            } else {
                let lines = current.lines_mut();
                let tail = lines.remove(line);
                let prev = &mut lines[line - 1];
                let join = char_len(prev);
                prev.push_str(&tail);
                current.touch();
                self.cursor = Cursor::new(block, line - 1, join);
            }
        } else if block > 0 {
            let merged = self.blocks.remove(block).into_lines();
            let prev = &mut self.blocks[block - 1];
            let lines = prev.lines_mut();
            let join_line = lines.len() - 1;
            let join_col = char_len(&lines[join_line]);
            let mut incoming = merged.into_iter();
            if let Some(first) = incoming.next() {
                lines[join_line].push_str(&first);
            }
            lines.extend(incoming);
            prev.touch();
            self.cursor = Cursor::new(block - 1, join_line, join_col);
        }

        self.ensure_cursor_in_view();
    }

    /// Delete the character under the cursor. Never joins lines or blocks.
    pub fn delete_char(&mut self) {
        let Cursor { block, line, col } = self.cursor;
        let current = &mut self.blocks[block];
        let text = &mut current.lines_mut()[line];
        if col < char_len(text) {
            let at = byte_offset(text, col);
            text.remove(at);
            current.touch();
        }
    }

    /// Break the line at the cursor, or step out of a math block when the
    /// cursor is on its closing `$$` line.
    pub fn insert_newline(&mut self) {
        let Cursor { block, line, col } = self.cursor;
        let current = &self.blocks[block];

        let on_closing_line = current.is_math()
            && line + 1 == current.line_count()
            && current.lines()[line] == MATH_DELIMITER;

        if on_closing_line {
            let text = self.alloc(BlockKind::Text, Vec::new());
            self.blocks.insert(block + 1, text);
            self.cursor = Cursor::new(block + 1, 0, 0);
        } else {
            let current = &mut self.blocks[block];
            let lines = current.lines_mut();
            let at = byte_offset(&lines[line], col);
            let tail = lines[line].split_off(at);
            lines.insert(line + 1, tail);
            current.touch();
            self.cursor = Cursor::new(block, line + 1, 0);
        }

        self.ensure_cursor_in_view();
    }

    /// Remove block `index` and reposition the cursor: end of the previous
    /// block, else start of the next, else a fresh empty text block.
    fn remove_block(&mut self, index: usize) {
        let removed = self.blocks.remove(index);
        tracing::debug!(id = removed.id().get(), "block removed");

        if self.blocks.is_empty() {
            let text = self.alloc(BlockKind::Text, Vec::new());
            self.blocks.push(text);
            self.cursor = Cursor::ORIGIN;
        } else if index > 0 {
            let prev = &self.blocks[index - 1];
            let line = prev.line_count() - 1;
            self.cursor = Cursor::new(index - 1, line, char_len(&prev.lines()[line]));
        } else {
            self.cursor = Cursor::ORIGIN;
        }
    }

    // --- viewport -----------------------------------------------------------

    /// Resize the text area and re-clamp the scroll offset.
    pub fn set_size(&mut self, width: usize, height: usize) {
        self.viewport = Viewport { width, height };
        self.ensure_cursor_in_view();
    }

    fn ensure_cursor_in_view(&mut self) {
        let Viewport { width, height } = self.viewport;
        let row = self.global_row();
        let col = self.cursor.col;

        if row < self.scroll.row {
            self.scroll.row = row;
        } else if height > 0 && row >= self.scroll.row + height {
            self.scroll.row = row + 1 - height;
        }

        if col < self.scroll.col {
            self.scroll.col = col;
        } else if width > 0 {
            self.scroll.col = self.first_visible_col(width);
        }
    }

    /// Leftmost column, not before the current scroll, from which the text
    /// up to the cursor plus the cursor cell fits in `width` screen cells.
    fn first_visible_col(&self, width: usize) -> usize {
        let widths: Vec<usize> = self
            .current_line()
            .chars()
            .take(self.cursor.col)
            .map(|c| c.width().unwrap_or(0))
            .collect();

        let mut used = 1;
        let mut start = widths.len();
        while start > self.scroll.col {
            let w = widths[start - 1];
            if used + w > width {
                break;
            }
            used += w;
            start -= 1;
        }
        start
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}
