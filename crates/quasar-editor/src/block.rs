//! Blocks: the unit the document is built from.
//!
//! A block is a run of lines of one [`BlockKind`]. Math blocks keep their
//! `$$` delimiter lines as ordinary text and always hold at least two lines.
//!
//! # Identity
//!
//! Blocks are split, merged and removed while a compile for one of them
//! may be running on another thread. Each block therefore carries a
//! [`BlockId`] that is never reused within a document, and a revision that
//! increases on every text mutation. A compile result is applied only if
//! both still match.
//!
//! # Render state
//!
//! ```text
//!   Dirty ──schedule──▶ Compiling ──ok──▶ Rendered(image)
//!     ▲                     │
//!     │                     └──err──▶ Errored(message)
//!     └──────────── any edit, from every state
//! ```
//!
//! Text blocks only ever go `Dirty → Clean`.

use quasar_term::graphics::EncodedImage;

/// The math delimiter line.
pub const MATH_DELIMITER: &str = "$$";

// ---------------------------------------------------------------------------
// BlockKind / BlockId
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlockKind {
    Text,
    Math,
}

/// Stable handle for a block, unique within its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// RenderState
// ---------------------------------------------------------------------------

/// Where a block is in the compile cycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RenderState {
    /// Up to date. Text blocks end here.
    Clean,
    /// Edited since the last compile (or never compiled).
    #[default]
    Dirty,
    /// A compile for the current revision is running.
    Compiling,
    /// Compiled; the image covers exactly the block's line count.
    Rendered(EncodedImage),
    /// The last compile failed; the message is one line.
    Errored(String),
}

impl RenderState {
    #[inline]
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty)
    }

    #[inline]
    #[must_use]
    pub const fn has_error(&self) -> bool {
        matches!(self, Self::Errored(_))
    }

    #[must_use]
    pub const fn image(&self) -> Option<&EncodedImage> {
        match self {
            Self::Rendered(image) => Some(image),
            _ => None,
        }
    }

    /// Rows the rendered image covers, 0 when there is none.
    #[must_use]
    pub const fn image_height(&self) -> u16 {
        match self {
            Self::Rendered(image) => image.rows,
            _ => 0,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Errored(message) => Some(message),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Block
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    id: BlockId,
    kind: BlockKind,
    lines: Vec<String>,
    state: RenderState,
    revision: u64,
}

impl Block {
    /// A fresh, dirty block. An empty line list becomes one empty line.
    pub(crate) fn new(id: BlockId, kind: BlockKind, mut lines: Vec<String>) -> Self {
        if lines.is_empty() {
            lines.push(String::new());
        }
        Self {
            id,
            kind,
            lines,
            state: RenderState::Dirty,
            revision: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn id(&self) -> BlockId {
        self.id
    }

    #[inline]
    #[must_use]
    pub const fn kind(&self) -> BlockKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn is_math(&self) -> bool {
        self.kind == BlockKind::Math
    }

    #[inline]
    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Number of lines; never 0.
    #[inline]
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> &RenderState {
        &self.state
    }

    #[inline]
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// The LaTeX inside a math block.
    ///
    /// The `$$` lines are stripped when both are present, leading blank
    /// lines are dropped, and the rest is joined with `\n`.
    #[must_use]
    pub fn math_source(&self) -> String {
        let mut content: &[String] = &self.lines;
        if content.len() >= 2
            && content.first().is_some_and(|l| l == MATH_DELIMITER)
            && content.last().is_some_and(|l| l == MATH_DELIMITER)
        {
            content = &content[1..content.len() - 1];
        }
        let start = content
            .iter()
            .position(|l| !l.trim().is_empty())
            .unwrap_or(content.len());
        content[start..].join("\n")
    }

    // --- mutation (document and coordinator only) ---------------------------

    pub(crate) fn lines_mut(&mut self) -> &mut Vec<String> {
        &mut self.lines
    }

    pub(crate) fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Record a text mutation: bump the revision and go back to `Dirty`.
    pub(crate) fn touch(&mut self) {
        self.revision += 1;
        self.state = RenderState::Dirty;
    }

    pub(crate) fn set_state(&mut self, state: RenderState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn math(lines: &[&str]) -> Block {
        Block::new(
            BlockId::new(1),
            BlockKind::Math,
            lines.iter().map(ToString::to_string).collect(),
        )
    }

    #[test]
    fn new_block_is_dirty_at_revision_zero() {
        let block = math(&["$$", "x", "$$"]);
        assert!(block.state().is_dirty());
        assert_eq!(block.revision(), 0);
    }

    #[test]
    fn empty_lines_become_one_line() {
        let block = Block::new(BlockId::new(7), BlockKind::Text, Vec::new());
        assert_eq!(block.lines(), [String::new()]);
    }

    #[test]
    fn touch_bumps_revision_and_dirties() {
        let mut block = math(&["$$", "x", "$$"]);
        block.set_state(RenderState::Errored("bad".into()));
        block.touch();
        assert_eq!(block.revision(), 1);
        assert_eq!(*block.state(), RenderState::Dirty);
    }

    #[test]
    fn derived_flags() {
        let image = EncodedImage {
            sequence: String::new(),
            rows: 3,
        };
        let rendered = RenderState::Rendered(image);
        assert_eq!(rendered.image_height(), 3);
        assert!(!rendered.is_dirty());
        assert!(!rendered.has_error());

        let errored = RenderState::Errored("pdflatex: Undefined control sequence.".into());
        assert!(errored.has_error());
        assert_eq!(errored.image_height(), 0);
        assert_eq!(errored.error(), Some("pdflatex: Undefined control sequence."));
        assert!(errored.image().is_none());
    }

    // --- math_source ---

    #[test]
    fn math_source_strips_delimiters() {
        assert_eq!(math(&["$$", "a + b", "c", "$$"]).math_source(), "a + b\nc");
    }

    #[test]
    fn math_source_drops_leading_blank_lines() {
        assert_eq!(math(&["$$", "", "  ", "x^2", "$$"]).math_source(), "x^2");
    }

    #[test]
    fn math_source_keeps_unbalanced_delimiters() {
        assert_eq!(math(&["$$", "x", "y"]).math_source(), "$$\nx\ny");
    }

    #[test]
    fn math_source_of_empty_block_is_empty() {
        assert_eq!(math(&["$$", "", "$$"]).math_source(), "");
        assert_eq!(math(&["$$", "$$"]).math_source(), "");
    }
}
