// SPDX-License-Identifier: MIT
//
// Differential renderer.
//
// Compares the frame just painted with the one on screen and emits output
// only for cells that changed. Identical rows cost one slice comparison.
// The frame is wrapped in synchronized output and leaves the terminal with
// one write.
//
// Kitty images are not cells and nothing here knows about them. Rows the
// editor reserves for an image are painted blank; the overlay pass in the
// event loop draws the image over them once the frame is flushed.

use std::io::{self, Write};

use crate::ansi::{self, DecMode};
use crate::buffer::FrameBuffer;
use crate::output::{FRAME_CAPACITY, Pen, write_frame};

/// Counters from one render pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderStats {
    pub cells_rendered: usize,
    pub cells_skipped: usize,
    pub bytes_written: usize,
}

/// Turns successive frames into minimal terminal output.
pub struct DiffRenderer {
    out: Vec<u8>,
    pen: Pen,
    /// What the terminal shows. `None` means unknown: redraw everything.
    on_screen: Option<FrameBuffer>,
}

impl DiffRenderer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            out: Vec::with_capacity(FRAME_CAPACITY),
            pen: Pen::new(),
            on_screen: None,
        }
    }

    /// Encode the difference between `frame` and the screen.
    pub fn render(&mut self, frame: &FrameBuffer) -> RenderStats {
        self.out.clear();
        self.pen.forget();

        let mut stats = RenderStats::default();
        if frame.width() == 0 || frame.height() == 0 {
            self.remember(frame);
            return stats;
        }

        let _ = ansi::set_mode(&mut self.out, DecMode::SyncUpdate, true);

        let screen = self
            .on_screen
            .as_ref()
            .filter(|s| s.width() == frame.width() && s.height() == frame.height());
        if screen.is_none() {
            let _ = ansi::clear_screen(&mut self.out);
        }

        for y in 0..frame.height() {
            let Some(row) = frame.row(y) else {
                continue;
            };
            let old = screen.and_then(|s| s.row(y));
            if old == Some(row) {
                stats.cells_skipped += row.len();
                continue;
            }

            for (x, cell) in (0..frame.width()).zip(row) {
                let unchanged = old.is_some_and(|old| old[usize::from(x)] == *cell);
                if unchanged {
                    stats.cells_skipped += 1;
                } else {
                    self.pen.put(&mut self.out, x, y, cell);
                    stats.cells_rendered += 1;
                }
            }
        }

        let _ = ansi::reset(&mut self.out);
        let _ = ansi::set_mode(&mut self.out, DecMode::SyncUpdate, false);

        stats.bytes_written = self.out.len();
        self.remember(frame);
        stats
    }

    /// Bytes produced by the last [`render`](Self::render).
    #[must_use]
    pub fn output_bytes(&self) -> &[u8] {
        &self.out
    }

    /// Write the last render to `w` and drop it.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `w` fails.
    pub fn flush_to(&mut self, w: &mut impl Write) -> io::Result<()> {
        write_frame(w, &self.out)?;
        self.out.clear();
        Ok(())
    }

    /// Treat the screen as unknown; the next render redraws every cell.
    pub fn force_redraw(&mut self) {
        self.on_screen = None;
    }

    fn remember(&mut self, frame: &FrameBuffer) {
        match &mut self.on_screen {
            Some(s) if s.width() == frame.width() && s.height() == frame.height() => s.copy_from(frame),
            _ => self.on_screen = Some(frame.clone()),
        }
    }
}

impl Default for DiffRenderer {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
