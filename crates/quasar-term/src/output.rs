// SPDX-License-Identifier: MIT
//
// Stateful cell output.
//
// A `Pen` remembers where the terminal cursor is after its last write and
// which colours and attributes are active, and only emits the escapes that
// change something. Frames are accumulated in a plain `Vec<u8>` so they
// reach the terminal in one write() syscall.

use std::io::Write;

use crate::ansi;
use crate::buffer::char_width;
use crate::cell::{Attr, Cell, CellColor};

/// Reserved up front for one frame's bytes.
pub const FRAME_CAPACITY: usize = 16_384;

/// Append a codepoint as UTF-8. Invalid codepoints (and 0) become `?`.
pub fn push_codepoint(out: &mut Vec<u8>, cp: u32) {
    match char::from_u32(cp).filter(|&ch| ch != '\0') {
        Some(ch) => {
            let mut enc = [0u8; 4];
            out.extend_from_slice(ch.encode_utf8(&mut enc).as_bytes());
        }
        None => out.push(b'?'),
    }
}

// ─── Pen ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Style {
    fg: CellColor,
    bg: CellColor,
    attrs: Attr,
}

impl Style {
    const fn of(cell: &Cell) -> Self {
        Self {
            fg: cell.fg,
            bg: cell.bg,
            attrs: cell.attrs,
        }
    }
}

/// Terminal cursor and SGR state as last written.
///
/// - No cursor move when the cell is where the terminal cursor already is.
/// - An attribute change resets SGR and re-emits both colours.
/// - A colour is emitted only when it differs from the active one.
/// - A continuation cell right after its wide character writes nothing.
#[derive(Debug, Clone, Default)]
pub struct Pen {
    /// Where the next byte would land, if known.
    at: Option<(u16, u16)>,
    /// Active style, if known.
    style: Option<Style>,
}

impl Pen {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            at: None,
            style: None,
        }
    }

    /// Forget everything. Call whenever other code may have moved the
    /// cursor or changed SGR state.
    pub const fn forget(&mut self) {
        self.at = None;
        self.style = None;
    }

    /// Draw `cell` at `(x, y)`.
    pub fn put(&mut self, out: &mut Vec<u8>, x: u16, y: u16, cell: &Cell) {
        if cell.is_continuation() {
            // The wide character before it already covered this column.
            if self.at == Some((x.saturating_add(1), y)) {
                return;
            }
            self.move_to(out, x, y);
            self.apply(out, Style::of(cell));
            out.push(b' ');
            self.at = Some((x.saturating_add(1), y));
            return;
        }

        self.move_to(out, x, y);
        self.apply(out, Style::of(cell));
        push_codepoint(out, cell.ch);

        let width = char::from_u32(cell.ch).map_or(1, char_width).max(1);
        let advance = u16::try_from(width).unwrap_or(1);
        self.at = Some((x.saturating_add(advance), y));
    }

    fn move_to(&mut self, out: &mut Vec<u8>, x: u16, y: u16) {
        if self.at != Some((x, y)) {
            let _ = ansi::cursor_to(out, x, y);
            self.at = Some((x, y));
        }
    }

    fn apply(&mut self, out: &mut Vec<u8>, next: Style) {
        let current = match self.style {
            Some(current) if current.attrs == next.attrs => Some(current),
            Some(_) => {
                let _ = ansi::reset(out);
                let _ = ansi::attrs(out, next.attrs);
                None
            }
            None => {
                if !next.attrs.is_empty() {
                    let _ = ansi::reset(out);
                    let _ = ansi::attrs(out, next.attrs);
                }
                None
            }
        };

        if current.is_none_or(|c| c.fg != next.fg) {
            let _ = ansi::fg(out, next.fg);
        }
        if current.is_none_or(|c| c.bg != next.bg) {
            let _ = ansi::bg(out, next.bg);
        }
        self.style = Some(next);
    }
}

/// Write `bytes` to `w` and flush.
///
/// # Errors
///
/// Returns an error if writing to `w` fails.
pub fn write_frame(w: &mut impl Write, bytes: &[u8]) -> std::io::Result<()> {
    if bytes.is_empty() {
        return Ok(());
    }
    w.write_all(bytes)?;
    w.flush()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn render(cells: &[(u16, u16, Cell)]) -> String {
        let mut out = Vec::new();
        let mut pen = Pen::new();
        for &(x, y, ref cell) in cells {
            pen.put(&mut out, x, y, cell);
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn codepoints() {
        let mut out = Vec::new();
        push_codepoint(&mut out, u32::from('∑'));
        push_codepoint(&mut out, 0);
        push_codepoint(&mut out, 0xD800);
        assert_eq!(out, "∑??".as_bytes());
    }

    #[test]
    fn adjacent_cells_share_one_move() {
        let out = render(&[
            (0, 0, Cell::new('A')),
            (1, 0, Cell::new('B')),
            (2, 0, Cell::new('C')),
        ]);
        assert_eq!(out.matches('H').count(), 1);
        assert!(out.ends_with("ABC"));
    }

    #[test]
    fn gap_and_new_row_move_the_cursor() {
        let out = render(&[
            (0, 0, Cell::new('A')),
            (5, 0, Cell::new('B')),
            (6, 1, Cell::new('C')),
        ]);
        assert_eq!(out.matches('H').count(), 3);
        assert!(out.contains("\x1b[1;6HB"));
        assert!(out.contains("\x1b[2;7HC"));
    }

    #[test]
    fn unchanged_colour_is_not_repeated() {
        let red = Cell::new('x').with_fg(CellColor::Ansi256(196));
        let out = render(&[(0, 0, red), (1, 0, red)]);
        assert_eq!(out.matches("38;5;196").count(), 1);
    }

    #[test]
    fn attribute_change_resets_and_reemits_colours() {
        let bold = Cell::new('a').with_attrs(Attr::BOLD).with_fg(CellColor::Ansi256(69));
        let plain = Cell::new('b').with_fg(CellColor::Ansi256(69));
        let out = render(&[(0, 0, bold), (1, 0, plain)]);
        assert!(out.contains("\x1b[1m"));
        assert!(out.contains("\x1b[0m"));
        assert_eq!(out.matches("38;5;69").count(), 2);
    }

    #[test]
    fn continuation_after_wide_char_is_silent() {
        let cont = Cell::continuation(CellColor::Default, CellColor::Default, Attr::empty());
        let out = render(&[(0, 0, Cell::new('中')), (1, 0, cont), (2, 0, Cell::new('a'))]);
        assert!(out.ends_with("中a"));
        assert_eq!(out.matches('H').count(), 1);
    }

    #[test]
    fn orphan_continuation_is_a_space() {
        let cont = Cell::continuation(CellColor::Default, CellColor::Default, Attr::empty());
        let out = render(&[(3, 0, cont)]);
        assert!(out.ends_with("\x1b[1;4H\x1b[39m\x1b[49m "), "{out:?}");
    }

    #[test]
    fn forget_forces_move_and_colours() {
        let mut out = Vec::new();
        let mut pen = Pen::new();
        pen.put(&mut out, 0, 0, &Cell::new('a'));
        pen.forget();
        out.clear();
        pen.put(&mut out, 1, 0, &Cell::new('b'));
        assert_eq!(String::from_utf8(out).unwrap(), "\x1b[1;2H\x1b[39m\x1b[49mb");
    }

    #[test]
    fn write_frame_skips_empty() {
        let mut sink = Vec::new();
        write_frame(&mut sink, b"").unwrap();
        assert!(sink.is_empty());
        write_frame(&mut sink, b"frame").unwrap();
        assert_eq!(sink, b"frame");
    }
}
