// SPDX-License-Identifier: MIT
//
// Terminal session: raw mode, alternate screen, and everything that must be
// undone on the way out.
//
// Uses `unsafe` for termios (tcgetattr, cfmakeraw, tcsetattr), ioctl
// (TIOCGWINSZ), isatty, and raw fd writes. Each unsafe block is minimal.
#![allow(unsafe_code)]
//
// The setup and teardown bytes are built by one pair of functions so the
// normal exit and the panic path can never drift apart. Teardown deletes
// every Kitty image placement before leaving the alternate screen, so
// rendered formulas never linger over the user's shell.
//
// The panic hook writes its copy of the teardown straight to fd 1,
// bypassing the stdout lock in case the panic happened mid-frame.

use std::io::{self, Write};
use std::sync::{Mutex, Once};

use crate::ansi::{self, CursorShape, DecMode};
use crate::graphics;

// ─── Size ───────────────────────────────────────────────────────────────────

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub cols: u16,
    pub rows: u16,
}

impl Size {
    /// Used when the size cannot be queried (pipes, tests).
    pub const FALLBACK: Self = Self { cols: 80, rows: 24 };
}

/// Ask the kernel for the size of the terminal on stdout.
#[cfg(unix)]
#[must_use]
pub fn get_size() -> Option<Size> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    if unsafe { libc::ioctl(libc::STDOUT_FILENO, libc::TIOCGWINSZ, &raw mut ws) } != 0 {
        return None;
    }
    let size = Size {
        cols: ws.ws_col,
        rows: ws.ws_row,
    };
    (size.cols > 0 && size.rows > 0).then_some(size)
}

#[cfg(not(unix))]
#[must_use]
pub fn get_size() -> Option<Size> {
    None
}

/// Whether stdin is attached to a terminal.
#[cfg(unix)]
#[must_use]
pub fn is_tty() -> bool {
    unsafe { libc::isatty(libc::STDIN_FILENO) == 1 }
}

#[cfg(not(unix))]
#[must_use]
pub fn is_tty() -> bool {
    false
}

// ─── Session Sequences ──────────────────────────────────────────────────────

/// Kitty keyboard flags pushed on entry: disambiguate escape codes.
const KITTY_KEYBOARD_FLAGS: u8 = 1;

/// Alternate screen, hidden cursor, cleared screen, Kitty keyboard,
/// bracketed paste.
fn write_setup(w: &mut impl Write) -> io::Result<()> {
    ansi::set_mode(w, DecMode::AltScreen, true)?;
    ansi::set_mode(w, DecMode::CursorVisible, false)?;
    ansi::clear_screen(w)?;
    ansi::push_keyboard_flags(w, KITTY_KEYBOARD_FLAGS)?;
    ansi::set_mode(w, DecMode::BracketedPaste, true)
}

/// Undo [`write_setup`] and anything a frame may have left behind: an open
/// synchronized update, images, SGR state, cursor shape. Leaving the
/// alternate screen comes last.
fn write_teardown(w: &mut impl Write) -> io::Result<()> {
    ansi::set_mode(w, DecMode::SyncUpdate, false)?;
    graphics::delete_all(w)?;
    ansi::set_mode(w, DecMode::BracketedPaste, false)?;
    ansi::pop_keyboard_flags(w)?;
    ansi::reset(w)?;
    ansi::set_cursor_shape(w, CursorShape::Default)?;
    ansi::set_mode(w, DecMode::CursorVisible, true)?;
    ansi::set_mode(w, DecMode::AltScreen, false)
}

fn teardown_bytes() -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    // Writing into a Vec cannot fail.
    let _ = write_teardown(&mut buf);
    buf
}

// ─── Raw Mode ───────────────────────────────────────────────────────────────

/// Termios as it was before raw mode, shared with the panic hook.
#[cfg(unix)]
static SAVED_TERMIOS: Mutex<Option<libc::termios>> = Mutex::new(None);

/// Raw mode on stdin, restored by [`RawMode::restore`].
#[cfg(unix)]
struct RawMode {
    original: libc::termios,
}

#[cfg(unix)]
impl RawMode {
    /// Switch stdin to raw mode. `None` when stdin is not a terminal.
    fn enable() -> io::Result<Option<Self>> {
        if !is_tty() {
            return Ok(None);
        }

        let mut original: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(libc::STDIN_FILENO, &raw mut original) } != 0 {
            return Err(io::Error::last_os_error());
        }

        let mut raw = original;
        unsafe { libc::cfmakeraw(&raw mut raw) };
        raw.c_cc[libc::VMIN] = 1;
        raw.c_cc[libc::VTIME] = 0;
        apply_termios(&raw, libc::TCSAFLUSH)?;

        if let Ok(mut saved) = SAVED_TERMIOS.lock() {
            *saved = Some(original);
        }
        Ok(Some(Self { original }))
    }

    fn restore(self) -> io::Result<()> {
        if let Ok(mut saved) = SAVED_TERMIOS.lock() {
            *saved = None;
        }
        apply_termios(&self.original, libc::TCSAFLUSH)
    }
}

#[cfg(unix)]
fn apply_termios(termios: &libc::termios, when: libc::c_int) -> io::Result<()> {
    if unsafe { libc::tcsetattr(libc::STDIN_FILENO, when, termios) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(not(unix))]
struct RawMode;

#[cfg(not(unix))]
impl RawMode {
    #[allow(clippy::unnecessary_wraps)]
    fn enable() -> io::Result<Option<Self>> {
        Ok(None)
    }

    #[allow(clippy::unnecessary_wraps)]
    fn restore(self) -> io::Result<()> {
        Ok(())
    }
}

// ─── Panic Hook ─────────────────────────────────────────────────────────────

static PANIC_HOOK: Once = Once::new();

/// Restore the terminal before the default hook prints the panic.
fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        let teardown = teardown_bytes();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            write_to_fd1(&teardown);

            #[cfg(unix)]
            if let Ok(saved) = SAVED_TERMIOS.lock() {
                if let Some(original) = saved.as_ref() {
                    let _ = apply_termios(original, libc::TCSANOW);
                }
            }

            previous(info);
        }));
    });
}

fn write_to_fd1(bytes: &[u8]) {
    #[cfg(unix)]
    unsafe {
        let _ = libc::write(libc::STDOUT_FILENO, bytes.as_ptr().cast::<libc::c_void>(), bytes.len());
    }

    #[cfg(not(unix))]
    {
        let mut out = io::stdout();
        let _ = out.write_all(bytes);
        let _ = out.flush();
    }
}

// ─── Terminal ───────────────────────────────────────────────────────────────

/// An editing session on the controlling terminal.
///
/// [`enter`](Self::enter) starts the session; [`leave`](Self::leave) or
/// dropping the handle ends it.
pub struct Terminal {
    raw: Option<RawMode>,
    size: Size,
    active: bool,
}

impl Terminal {
    /// A handle sized to the current terminal (80×24 if unknown). Does not
    /// touch the terminal yet.
    ///
    /// # Errors
    ///
    /// Currently infallible.
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            raw: None,
            size: get_size().unwrap_or(Size::FALLBACK),
            active: false,
        })
    }

    /// Last known size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.size
    }

    /// Query the size again. The previous value is kept if the query fails.
    pub fn refresh_size(&mut self) -> Size {
        self.size = get_size().unwrap_or(self.size);
        self.size
    }

    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Start the session. Calling it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be set or the setup sequence
    /// cannot be written.
    pub fn enter(&mut self) -> io::Result<()> {
        if self.active {
            return Ok(());
        }
        install_panic_hook();
        self.raw = RawMode::enable()?;

        let mut out = io::stdout().lock();
        write_setup(&mut out)?;
        out.flush()?;

        self.active = true;
        tracing::debug!(cols = self.size.cols, rows = self.size.rows, "terminal session started");
        Ok(())
    }

    /// End the session. Calling it twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the teardown sequence cannot be written or the
    /// original termios cannot be restored.
    pub fn leave(&mut self) -> io::Result<()> {
        if !self.active {
            return Ok(());
        }
        self.active = false;

        {
            let mut out = io::stdout().lock();
            write_teardown(&mut out)?;
            out.flush()?;
        }

        match self.raw.take() {
            Some(raw) => raw.restore(),
            None => Ok(()),
        }
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let _ = self.leave();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
