// SPDX-License-Identifier: MIT
//
// ANSI escape sequences.
//
// Pure functions that write control sequences to any `impl Write`. The
// renderer decides when to emit; this module only knows the bytes. Kitty
// graphics commands live in `graphics`: they carry payloads and are never
// part of a diffed frame.
//
// Positions are 0-based here and converted to the terminal's 1-based
// coordinates on the way out.

use std::io::{self, Write};

use crate::cell::{Attr, CellColor};

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// CUP: move the cursor to column `x`, row `y`.
#[inline]
pub fn cursor_to(w: &mut impl Write, x: u16, y: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(y) + 1, u32::from(x) + 1)
}

/// SCOSC. Paired with [`restore_cursor`] around image placement so the
/// hardware cursor ends where the frame left it.
#[inline]
pub fn save_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[s")
}

/// SCORC.
#[inline]
pub fn restore_cursor(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[u")
}

/// Terminal cursor shape (DECSCUSR).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    /// Whatever the user configured.
    #[default]
    Default,
    SteadyBlock,
    /// I-beam, for text entry.
    SteadyBar,
}

impl CursorShape {
    const fn param(self) -> u8 {
        match self {
            Self::Default => 0,
            Self::SteadyBlock => 2,
            Self::SteadyBar => 6,
        }
    }
}

#[inline]
pub fn set_cursor_shape(w: &mut impl Write, shape: CursorShape) -> io::Result<()> {
    write!(w, "\x1b[{} q", shape.param())
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// ED 2.
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// SGR 0. Any tracked pen state is stale afterwards.
#[inline]
pub fn reset(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[0m")
}

// ─── DEC Private Modes ───────────────────────────────────────────────────────

/// The DEC private modes a session toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecMode {
    /// DECTCEM (25).
    CursorVisible,
    /// Alternate screen with saved cursor (1049).
    AltScreen,
    /// Bracketed paste (2004).
    BracketedPaste,
    /// Synchronized output (2026): the terminal holds the frame until reset.
    SyncUpdate,
}

impl DecMode {
    const fn number(self) -> u16 {
        match self {
            Self::CursorVisible => 25,
            Self::AltScreen => 1049,
            Self::BracketedPaste => 2004,
            Self::SyncUpdate => 2026,
        }
    }
}

/// DECSET (`on`) or DECRST.
#[inline]
pub fn set_mode(w: &mut impl Write, mode: DecMode, on: bool) -> io::Result<()> {
    let action = if on { 'h' } else { 'l' };
    write!(w, "\x1b[?{}{action}", mode.number())
}

// ─── Kitty Keyboard Protocol ────────────────────────────────────────────────

/// Push enhancement flags. Flag `1` (disambiguate) lets a bare Escape be
/// told apart from the start of a sequence without a timeout.
#[inline]
pub fn push_keyboard_flags(w: &mut impl Write, flags: u8) -> io::Result<()> {
    write!(w, "\x1b[>{flags}u")
}

/// Pop the flags pushed by [`push_keyboard_flags`].
#[inline]
pub fn pop_keyboard_flags(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[<u")
}

// ─── Colors ──────────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Layer {
    Fg,
    Bg,
}

impl Layer {
    /// SGR parameters: (standard base, bright base, extended introducer,
    /// default).
    const fn codes(self) -> (u16, u16, u16, u16) {
        match self {
            Self::Fg => (30, 90, 38, 39),
            Self::Bg => (40, 100, 48, 49),
        }
    }
}

/// The shortest SGR for `color`: 3x/4x and 9x/10x for the 16 base colours,
/// `;5;N` for the rest of the palette, `;2;R;G;B` for true colour.
fn sgr_color(w: &mut impl Write, layer: Layer, color: CellColor) -> io::Result<()> {
    let (standard, bright, extended, default) = layer.codes();
    match color {
        CellColor::Default => write!(w, "\x1b[{default}m"),
        CellColor::Ansi256(n @ 0..=7) => write!(w, "\x1b[{}m", standard + u16::from(n)),
        CellColor::Ansi256(n @ 8..=15) => write!(w, "\x1b[{}m", bright + u16::from(n - 8)),
        CellColor::Ansi256(n) => write!(w, "\x1b[{extended};5;{n}m"),
        CellColor::Rgb(r, g, b) => write!(w, "\x1b[{extended};2;{r};{g};{b}m"),
    }
}

#[inline]
pub fn fg(w: &mut impl Write, color: CellColor) -> io::Result<()> {
    sgr_color(w, Layer::Fg, color)
}

#[inline]
pub fn bg(w: &mut impl Write, color: CellColor) -> io::Result<()> {
    sgr_color(w, Layer::Bg, color)
}

// ─── Text Attributes ─────────────────────────────────────────────────────────

const ATTR_CODES: [(Attr, u8); 4] = [
    (Attr::BOLD, 1),
    (Attr::DIM, 2),
    (Attr::ITALIC, 3),
    (Attr::INVERSE, 7),
];

/// All set attributes as one SGR. Writes nothing for an empty set.
pub fn attrs(w: &mut impl Write, attr: Attr) -> io::Result<()> {
    let mut codes = ATTR_CODES
        .iter()
        .filter(|(flag, _)| attr.contains(*flag))
        .map(|(_, code)| code);

    let Some(first) = codes.next() else {
        return Ok(());
    };
    write!(w, "\x1b[{first}")?;
    for code in codes {
        write!(w, ";{code}")?;
    }
    w.write_all(b"m")
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn emit<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> io::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    // ── Cursor ──────────────────────────────────────────────────────────

    #[test]
    fn cursor_to_is_one_based() {
        assert_eq!(emit(|w| cursor_to(w, 0, 0)), "\x1b[1;1H");
        assert_eq!(emit(|w| cursor_to(w, 10, 20)), "\x1b[21;11H");
    }

    #[test]
    fn cursor_to_max_does_not_overflow() {
        assert_eq!(emit(|w| cursor_to(w, u16::MAX, u16::MAX)), "\x1b[65536;65536H");
    }

    #[test]
    fn save_and_restore() {
        assert_eq!(emit(|w| save_cursor(w)), "\x1b[s");
        assert_eq!(emit(|w| restore_cursor(w)), "\x1b[u");
    }

    #[test]
    fn cursor_shapes() {
        assert_eq!(emit(|w| set_cursor_shape(w, CursorShape::Default)), "\x1b[0 q");
        assert_eq!(emit(|w| set_cursor_shape(w, CursorShape::SteadyBlock)), "\x1b[2 q");
        assert_eq!(emit(|w| set_cursor_shape(w, CursorShape::SteadyBar)), "\x1b[6 q");
    }

    // ── Modes ───────────────────────────────────────────────────────────

    #[test]
    fn dec_modes() {
        assert_eq!(emit(|w| set_mode(w, DecMode::CursorVisible, false)), "\x1b[?25l");
        assert_eq!(emit(|w| set_mode(w, DecMode::CursorVisible, true)), "\x1b[?25h");
        assert_eq!(emit(|w| set_mode(w, DecMode::AltScreen, true)), "\x1b[?1049h");
        assert_eq!(emit(|w| set_mode(w, DecMode::BracketedPaste, false)), "\x1b[?2004l");
        assert_eq!(emit(|w| set_mode(w, DecMode::SyncUpdate, true)), "\x1b[?2026h");
    }

    #[test]
    fn keyboard_flags() {
        assert_eq!(emit(|w| push_keyboard_flags(w, 1)), "\x1b[>1u");
        assert_eq!(emit(|w| pop_keyboard_flags(w)), "\x1b[<u");
    }

    // ── Colors ──────────────────────────────────────────────────────────

    #[test]
    fn fg_encodings() {
        assert_eq!(emit(|w| fg(w, CellColor::Default)), "\x1b[39m");
        assert_eq!(emit(|w| fg(w, CellColor::Ansi256(1))), "\x1b[31m");
        assert_eq!(emit(|w| fg(w, CellColor::Ansi256(9))), "\x1b[91m");
        assert_eq!(emit(|w| fg(w, CellColor::Ansi256(240))), "\x1b[38;5;240m");
        assert_eq!(emit(|w| fg(w, CellColor::Rgb(255, 95, 135))), "\x1b[38;2;255;95;135m");
    }

    #[test]
    fn bg_encodings() {
        assert_eq!(emit(|w| bg(w, CellColor::Default)), "\x1b[49m");
        assert_eq!(emit(|w| bg(w, CellColor::Ansi256(2))), "\x1b[42m");
        assert_eq!(emit(|w| bg(w, CellColor::Ansi256(10))), "\x1b[102m");
        assert_eq!(emit(|w| bg(w, CellColor::Ansi256(69))), "\x1b[48;5;69m");
        assert_eq!(emit(|w| bg(w, CellColor::Rgb(1, 2, 3))), "\x1b[48;2;1;2;3m");
    }

    // ── Attributes ──────────────────────────────────────────────────────

    #[test]
    fn attrs_join_into_one_sequence() {
        assert_eq!(emit(|w| attrs(w, Attr::empty())), "");
        assert_eq!(emit(|w| attrs(w, Attr::BOLD)), "\x1b[1m");
        assert_eq!(emit(|w| attrs(w, Attr::BOLD | Attr::INVERSE)), "\x1b[1;7m");
        assert_eq!(emit(|w| attrs(w, Attr::all())), "\x1b[1;2;3;7m");
    }
}
