// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Event loop.
//
// Stdin bytes from the background reader and messages the application
// posts from its own worker threads arrive on one channel. The loop blocks
// on it with an 8.3ms timeout (120 Hz): input is handled immediately, an
// idle screen costs nothing, and the timeout doubles as the escape
// sequence timeout that turns a lone ESC into an Escape key.
//
// When something changed the loop paints a fresh frame, diffs it against
// the previous one, flushes, then hands the raw terminal stream to the
// application's `overlay` hook for anything that is not cells (Kitty
// images), and finally positions the hardware cursor.
//
// Terminal resize is detected via a SIGWINCH handler that sets an
// `AtomicBool`, checked once per iteration.

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

use crate::ansi::{self, CursorShape, DecMode};
use crate::buffer::FrameBuffer;
use crate::diff::DiffRenderer;
use crate::input::{Event, Parser};
use crate::reader::StdinReader;
use crate::terminal::{Size, Terminal};

// ─── SIGWINCH ────────────────────────────────────────────────────────────────

static SIGWINCH_RECEIVED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
fn install_sigwinch_handler() {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    }
}

#[cfg(unix)]
extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    SIGWINCH_RECEIVED.store(true, Ordering::Relaxed);
}

#[cfg(not(unix))]
fn install_sigwinch_handler() {}

// ─── Channel ─────────────────────────────────────────────────────────────────

/// Everything the loop can wake up for.
#[derive(Debug)]
pub enum Incoming<M> {
    /// Raw bytes from stdin.
    Input(Vec<u8>),
    /// A message posted through a [`Mailbox`].
    Message(M),
}

/// Handle for posting application messages into the running loop.
///
/// Cheap to clone and `Send`, so worker threads can each own one.
#[derive(Debug)]
pub struct Mailbox<M> {
    tx: Sender<Incoming<M>>,
}

impl<M> Mailbox<M> {
    /// Deliver `msg` to [`App::on_message`]. Returns `false` once the loop
    /// has exited and nobody is listening.
    pub fn post(&self, msg: M) -> bool {
        self.tx.send(Incoming::Message(msg)).is_ok()
    }
}

impl<M> Clone for Mailbox<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

// ─── App Trait ───────────────────────────────────────────────────────────────

/// What the application tells the loop after handling something.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Continue,
    Quit,
}

/// Application interface for the event loop.
///
/// Per iteration the loop calls, as applicable:
///
/// 1. [`on_event`](App::on_event) for each parsed input event, or
///    [`on_message`](App::on_message) for a posted message
/// 2. [`on_resize`](App::on_resize) when the terminal size changed
/// 3. [`on_tick`](App::on_tick)
/// 4. [`paint`](App::paint), then [`overlay`](App::overlay), then
///    [`cursor`](App::cursor), when anything above made the frame dirty
///
/// [`on_start`](App::on_start) and one `on_resize` with the initial size
/// run before the first frame.
pub trait App {
    /// Type of the messages worker threads post back to the loop.
    type Message: Send + 'static;

    /// Receive the mailbox before the first frame.
    fn on_start(&mut self, _mailbox: Mailbox<Self::Message>) {}

    /// Handle a parsed input event.
    fn on_event(&mut self, _event: &Event) -> Action {
        Action::Continue
    }

    /// Handle a message posted through the [`Mailbox`].
    fn on_message(&mut self, _message: Self::Message) -> Action {
        Action::Continue
    }

    /// The terminal now has `size`. The frame buffer is already resized
    /// and the next render redraws every cell.
    fn on_resize(&mut self, _size: Size) {}

    /// Called every iteration. Return `true` to request a repaint.
    fn on_tick(&mut self) -> bool {
        false
    }

    /// Paint the application into a cleared frame buffer.
    fn paint(&mut self, buf: &mut FrameBuffer);

    /// Write out-of-band output after the frame reached the terminal.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails; the loop stops with it.
    fn overlay(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    /// Where to show the hardware cursor, or `None` to hide it.
    fn cursor(&self) -> Option<(u16, u16, CursorShape)> {
        None
    }
}

// ─── Frame Loop Config ───────────────────────────────────────────────────────

/// Event loop timing.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// Channel receive timeout in microseconds. Also the escape timeout.
    pub tick_interval_us: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_interval_us: 8333, // 120 Hz
        }
    }
}

// ─── EventLoop ───────────────────────────────────────────────────────────────

/// The terminal event loop.
///
/// Owns the terminal, parser, and renderer. [`run`](Self::run) returns when
/// the application answers [`Action::Quit`] or stdin closes.
pub struct EventLoop {
    terminal: Terminal,
    parser: Parser,
    renderer: DiffRenderer,
    config: LoopConfig,
}

impl EventLoop {
    /// An event loop with default timing.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be initialized.
    pub fn new() -> io::Result<Self> {
        Self::with_config(LoopConfig::default())
    }

    /// An event loop with custom timing.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal cannot be initialized.
    pub fn with_config(config: LoopConfig) -> io::Result<Self> {
        Ok(Self {
            terminal: Terminal::new()?,
            parser: Parser::new(),
            renderer: DiffRenderer::new(),
            config,
        })
    }

    /// The current terminal size.
    #[inline]
    #[must_use]
    pub const fn size(&self) -> Size {
        self.terminal.size()
    }

    /// Enter TUI mode and run until the application quits.
    ///
    /// The terminal is restored on every exit path.
    ///
    /// # Errors
    ///
    /// Returns an error if terminal setup, rendering, or restore fails.
    pub fn run<A: App>(&mut self, app: &mut A) -> io::Result<()> {
        self.terminal.enter()?;
        install_sigwinch_handler();

        let (tx, rx) = mpsc::channel::<Incoming<A::Message>>();
        let mut reader = match StdinReader::spawn(tx.clone()) {
            Ok(reader) => reader,
            Err(e) => {
                self.terminal.leave()?;
                return Err(e);
            }
        };
        app.on_start(Mailbox { tx });

        let result = self.run_inner(app, &rx);

        reader.stop();
        self.terminal.leave()?;
        result
    }

    fn run_inner<A: App>(&mut self, app: &mut A, rx: &Receiver<Incoming<A::Message>>) -> io::Result<()> {
        let size = self.terminal.size();
        let mut frame = FrameBuffer::new(size.cols, size.rows);
        app.on_resize(size);

        let mut dirty = true;
        let timeout = Duration::from_micros(self.config.tick_interval_us);

        loop {
            // ── Receive ──────────────────────────────────────────
            let events = match rx.recv_timeout(timeout) {
                Ok(Incoming::Input(bytes)) => self.parser.advance(&bytes),
                Ok(Incoming::Message(message)) => {
                    if app.on_message(message) == Action::Quit {
                        return Ok(());
                    }
                    dirty = true;
                    Vec::new()
                }
                Err(RecvTimeoutError::Timeout) if self.parser.has_pending() => self.parser.flush(),
                Err(RecvTimeoutError::Timeout) => Vec::new(),
                Err(RecvTimeoutError::Disconnected) => return Ok(()),
            };
            for event in &events {
                if app.on_event(event) == Action::Quit {
                    return Ok(());
                }
            }
            dirty |= !events.is_empty();

            // ── Resize ───────────────────────────────────────────
            if SIGWINCH_RECEIVED.swap(false, Ordering::Relaxed) {
                let new_size = self.terminal.refresh_size();
                tracing::debug!(cols = new_size.cols, rows = new_size.rows, "terminal resized");
                frame.resize(new_size.cols, new_size.rows);
                self.renderer.force_redraw();
                app.on_resize(new_size);
                dirty = true;
            }

            // ── Tick ─────────────────────────────────────────────
            dirty |= app.on_tick();

            // ── Render ───────────────────────────────────────────
            if dirty {
                frame.clear();
                app.paint(&mut frame);
                self.renderer.render(&frame);

                let stdout = io::stdout();
                let mut lock = stdout.lock();
                self.renderer.flush_to(&mut lock)?;
                app.overlay(&mut lock)?;
                match app.cursor() {
                    Some((x, y, shape)) => {
                        ansi::cursor_to(&mut lock, x, y)?;
                        ansi::set_cursor_shape(&mut lock, shape)?;
                        ansi::set_mode(&mut lock, DecMode::CursorVisible, true)?;
                    }
                    None => ansi::set_mode(&mut lock, DecMode::CursorVisible, false)?,
                }
                lock.flush()?;

                dirty = false;
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
