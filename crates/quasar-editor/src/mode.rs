//! Modal editing.
//!
//! | Mode   | Cursor shape | Keys                    |
//! |--------|--------------|-------------------------|
//! | Normal | Block        | Movement and commands   |
//! | Insert | Bar          | Text entry              |

use std::fmt;

use quasar_term::ansi::CursorShape;

/// The current editing mode. A pure state flag; key dispatch lives in the
/// binary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Normal,
    Insert,
}

impl Mode {
    /// Name for the status line.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Normal => "NORMAL",
            Self::Insert => "INSERT",
        }
    }

    #[must_use]
    pub const fn cursor_shape(self) -> CursorShape {
        match self {
            Self::Normal => CursorShape::SteadyBlock,
            Self::Insert => CursorShape::SteadyBar,
        }
    }

    /// True if keys produce text.
    #[inline]
    #[must_use]
    pub const fn is_input(self) -> bool {
        matches!(self, Self::Insert)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
