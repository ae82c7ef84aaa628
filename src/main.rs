// SPDX-License-Identifier: MIT
//
// quasar: a terminal note editor with inline LaTeX math.
//
// This is the main binary that wires the crates together:
//
//   quasar-term   → terminal control, rendering, input parsing, event loop,
//                   Kitty image encoding
//   quasar-editor → block document, cursor, modes, view, render coordinator
//   quasar-tex    → LaTeX → cropped PNG compiler with a content-hashed cache
//
// The Editor struct implements quasar-term's App trait. Each keypress flows
// through:
//
//   stdin → parser → on_event → mode dispatch → document mutation → pump
//   paint → view::paint → framebuffer → diff renderer → terminal
//   overlay → coordinator → Kitty placements written after the frame
//
// and each finished compile comes back as:
//
//   worker thread → mailbox → on_message → coordinator.complete → pump
//
// Layout:
//
//   ┌──────────────────────────────┐
//   │ gutter │ text / images       │  ← h - 1 rows
//   ├──────────────────────────────┤
//   │ status line                  │  ← 1 row
//   └──────────────────────────────┘

mod config;
mod logging;

use std::io::{self, Write};

use anyhow::{Context, Result};

use quasar_editor::document::Document;
use quasar_editor::mode::Mode;
use quasar_editor::render::{CompileOutcome, Coordinator};
use quasar_editor::view::{self, Layout};
use quasar_tex::Compiler;

use quasar_term::ansi::CursorShape;
use quasar_term::buffer::FrameBuffer;
use quasar_term::event_loop::{Action, App, EventLoop, Mailbox};
use quasar_term::input::{Event, KeyCode, KeyEvent, KeyEventKind, Modifiers};
use quasar_term::terminal::Size;

use crate::config::Config;

// ─── Editor ─────────────────────────────────────────────────────────────────

/// The editor application state.
struct Editor {
    doc: Document,
    mode: Mode,
    coordinator: Coordinator,

    /// Where compile workers post results. `None` until the loop starts;
    /// nothing is compiled without it.
    mailbox: Option<Mailbox<CompileOutcome>>,

    /// Geometry of the last painted frame, shared by overlay and cursor.
    layout: Layout,
}

impl Editor {
    fn new(coordinator: Coordinator) -> Self {
        Self {
            doc: Document::new(),
            mode: Mode::Normal,
            coordinator,
            mailbox: None,
            layout: Layout::default(),
        }
    }

    /// Start the next compile, if any block is waiting and none is running.
    fn pump(&mut self) {
        let Some(mailbox) = self.mailbox.clone() else {
            return;
        };
        self.coordinator.pump(&mut self.doc, move |outcome| {
            if !mailbox.post(outcome) {
                tracing::debug!("compile finished after the loop exited");
            }
        });
    }

    // ── Normal mode ─────────────────────────────────────────────────────

    fn handle_normal(&mut self, key: &KeyEvent) -> Action {
        if is_ctrl_c(key) {
            return Action::Quit;
        }
        match key.code {
            KeyCode::Char('q') => return Action::Quit,
            KeyCode::Char('h') | KeyCode::Left => self.doc.move_cursor(0, -1),
            KeyCode::Char('l') | KeyCode::Right => self.doc.move_cursor(0, 1),
            KeyCode::Char('j') | KeyCode::Down => self.doc.move_cursor(1, 0),
            KeyCode::Char('k') | KeyCode::Up => self.doc.move_cursor(-1, 0),
            KeyCode::Char('$') => self.doc.end_of_line(),
            KeyCode::Char('d') => self.doc.delete_char(),
            KeyCode::Char('i') => self.mode = Mode::Insert,
            KeyCode::Char('a') => {
                self.doc.move_cursor(0, 1);
                self.mode = Mode::Insert;
            }
            KeyCode::Char('A') => {
                self.doc.end_of_line();
                self.mode = Mode::Insert;
            }
            KeyCode::Char('o') => {
                self.doc.end_of_line();
                self.doc.insert_newline();
                self.mode = Mode::Insert;
            }
            _ => {}
        }
        Action::Continue
    }

    // ── Insert mode ─────────────────────────────────────────────────────

    fn handle_insert(&mut self, key: &KeyEvent) -> Action {
        if is_ctrl_c(key) {
            return Action::Quit;
        }
        match key.code {
            KeyCode::Escape => self.mode = Mode::Normal,
            KeyCode::Enter => self.doc.insert_newline(),
            KeyCode::Backspace | KeyCode::Delete => self.doc.backspace(),
            KeyCode::Tab => self.doc.insert_str("\t"),
            KeyCode::Left => self.doc.move_cursor(0, -1),
            KeyCode::Right => self.doc.move_cursor(0, 1),
            KeyCode::Down => self.doc.move_cursor(1, 0),
            KeyCode::Up => self.doc.move_cursor(-1, 0),
            KeyCode::Char(ch) if !key.modifiers.intersects(Modifiers::CTRL | Modifiers::ALT) => {
                self.doc.insert_char(ch);
            }
            _ => {}
        }
        Action::Continue
    }
}

fn is_ctrl_c(key: &KeyEvent) -> bool {
    key.code == KeyCode::Char('c') && key.modifiers.contains(Modifiers::CTRL)
}

// ─── App ────────────────────────────────────────────────────────────────────

impl App for Editor {
    type Message = CompileOutcome;

    fn on_start(&mut self, mailbox: Mailbox<CompileOutcome>) {
        self.mailbox = Some(mailbox);
        self.pump();
    }

    fn on_event(&mut self, event: &Event) -> Action {
        let action = match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => match self.mode {
                Mode::Normal => self.handle_normal(key),
                Mode::Insert => self.handle_insert(key),
            },
            Event::Paste(text) if self.mode.is_input() => {
                self.doc.insert_str(text);
                Action::Continue
            }
            _ => Action::Continue,
        };
        if action == Action::Continue {
            self.pump();
        }
        action
    }

    fn on_message(&mut self, outcome: CompileOutcome) -> Action {
        self.coordinator.complete(&mut self.doc, outcome);
        self.pump();
        Action::Continue
    }

    fn on_resize(&mut self, _size: Size) {
        // Every cell is redrawn after a resize; images must follow.
        self.coordinator.invalidate();
    }

    fn paint(&mut self, frame: &mut FrameBuffer) {
        let layout = Layout::new(&self.doc, frame.width(), frame.height());
        self.doc
            .set_size(usize::from(layout.text_width), usize::from(layout.text_height));
        view::paint(frame, &self.doc, &layout, self.mode, self.coordinator.is_busy());
        self.layout = layout;
    }

    fn overlay(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.coordinator.overlay(&self.doc, &self.layout, out)
    }

    fn cursor(&self) -> Option<(u16, u16, CursorShape)> {
        view::cursor_position(&self.doc, &self.layout).map(|(x, y)| (x, y, self.mode.cursor_shape()))
    }
}

// ─── Entry Point ────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let config = Config::load();
    config.prepare()?;
    logging::init(&config)?;
    for warning in &config.warnings {
        tracing::warn!("{warning}");
    }
    tracing::info!(cache = %config.cache_dir.display(), latex = %config.tex.latex, "starting");

    let compiler = Compiler::new(config.cache_dir.clone(), config.tex.clone());
    let mut editor = Editor::new(Coordinator::new(compiler));

    let mut event_loop = EventLoop::new().context("initializing terminal")?;
    event_loop.run(&mut editor).context("running editor")?;

    tracing::info!("exiting");
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
