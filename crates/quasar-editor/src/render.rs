//! Render coordination: compile dirty math blocks in the background and place
//! the resulting images over the text area.
//!
//! The coordinator runs on the event-loop thread and owns no document state.
//! Each turn the binary calls [`Coordinator::pump`], which picks at most one
//! dirty math block and hands a [`CompileJob`] to a worker thread. The worker
//! delivers a [`CompileOutcome`] back through the loop's mailbox and
//! [`Coordinator::complete`] applies it, unless the block has since been
//! removed or edited.
//!
//! Images are not cells. After each flushed frame [`Coordinator::overlay`]
//! recomputes where every visible image belongs and, when that set differs
//! from what is on screen, redraws all of them through a [`Compositor`].

use std::io::{self, Write};
use std::sync::Arc;
use std::thread;

use quasar_term::graphics::{self, Compositor, EncodedImage, KittyCompositor, Placement};
use quasar_tex::Compiler;

use crate::block::{BlockId, RenderState};
use crate::document::Document;
use crate::view::{self, Layout};

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Everything a worker needs to compile one block, detached from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileJob {
    pub id: BlockId,
    /// Index at dispatch time. Only a hint; the id is authoritative.
    pub index: usize,
    pub revision: u64,
    pub source: String,
    /// Rows the image must cover: the block's line count.
    pub rows: u16,
}

/// Result of a [`CompileJob`], tagged with the block it was for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOutcome {
    pub id: BlockId,
    pub index: usize,
    pub revision: u64,
    /// The image, or a one-line message for the status bar.
    pub result: Result<EncodedImage, String>,
}

impl CompileJob {
    /// Compile and encode. Blocking; runs on a worker thread.
    #[must_use]
    pub fn run(self, compiler: &Compiler) -> CompileOutcome {
        let result = compiler
            .compile(&self.source)
            .map_err(|e| {
                tracing::warn!(block = self.id.get(), error = %e, "compile failed");
                e.summary()
            })
            .and_then(|path| {
                graphics::encode(&path, self.rows).map_err(|e| {
                    tracing::warn!(block = self.id.get(), error = %e, "encode failed");
                    e.to_string()
                })
            });

        CompileOutcome {
            id: self.id,
            index: self.index,
            revision: self.revision,
            result,
        }
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// On-screen identity of one placement.
type PlacementKey = (BlockId, u64, u16, u16);

pub struct Coordinator {
    compiler: Arc<Compiler>,
    in_flight: Option<BlockId>,
    /// What the compositor last drew. `None` forces the next overlay.
    shown: Option<Vec<PlacementKey>>,
    compositor: Box<dyn Compositor>,
}

impl Coordinator {
    /// A coordinator drawing with the Kitty graphics protocol.
    #[must_use]
    pub fn new(compiler: Compiler) -> Self {
        Self::with_compositor(compiler, Box::new(KittyCompositor))
    }

    #[must_use]
    pub fn with_compositor(compiler: Compiler, compositor: Box<dyn Compositor>) -> Self {
        Self {
            compiler: Arc::new(compiler),
            in_flight: None,
            shown: None,
            compositor,
        }
    }

    /// True while a compile is running.
    #[inline]
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Forget what is on screen so the next overlay redraws every image.
    pub fn invalidate(&mut self) {
        self.shown = None;
    }

    // --- scheduling ---------------------------------------------------------

    /// Pick the next block to compile.
    ///
    /// Dirty text blocks away from the cursor are marked clean. If nothing
    /// is in flight, the first dirty math block away from the cursor becomes
    /// `Compiling` and its job is returned.
    pub fn schedule(&mut self, doc: &mut Document) -> Option<CompileJob> {
        let cursor_block = doc.cursor().block;

        for index in 0..doc.blocks().len() {
            if index == cursor_block {
                continue;
            }
            if let Some(block) = doc.block_mut(index) {
                if !block.is_math() && block.state().is_dirty() {
                    block.set_state(RenderState::Clean);
                }
            }
        }

        if self.in_flight.is_some() {
            return None;
        }

        let index = doc
            .blocks()
            .iter()
            .enumerate()
            .position(|(i, b)| i != cursor_block && b.is_math() && b.state().is_dirty())?;
        let block = doc.block_mut(index)?;
        block.set_state(RenderState::Compiling);

        let job = CompileJob {
            id: block.id(),
            index,
            revision: block.revision(),
            source: block.math_source(),
            rows: u16::try_from(block.line_count()).unwrap_or(u16::MAX),
        };
        tracing::debug!(block = job.id.get(), index, revision = job.revision, "scheduling compile");
        self.in_flight = Some(job.id);
        Some(job)
    }

    /// Run `job` on a background thread and pass its outcome to `deliver`.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn spawn<F>(&self, job: CompileJob, deliver: F) -> io::Result<()>
    where
        F: FnOnce(CompileOutcome) + Send + 'static,
    {
        let compiler = Arc::clone(&self.compiler);
        thread::Builder::new()
            .name("quasar-compile".into())
            .spawn(move || deliver(job.run(&compiler)))?;
        Ok(())
    }

    /// Schedule and spawn in one step.
    ///
    /// A failed spawn completes the job immediately with an error so the
    /// block does not stay `Compiling` forever.
    pub fn pump<F>(&mut self, doc: &mut Document, deliver: F)
    where
        F: FnOnce(CompileOutcome) + Send + 'static,
    {
        let Some(job) = self.schedule(doc) else {
            return;
        };
        let (id, index, revision) = (job.id, job.index, job.revision);
        if let Err(e) = self.spawn(job, deliver) {
            tracing::error!(error = %e, "cannot spawn compile thread");
            self.complete(
                doc,
                CompileOutcome {
                    id,
                    index,
                    revision,
                    result: Err(format!("cannot start compile: {e}")),
                },
            );
        }
    }

    /// Apply a finished compile. Returns `true` if the document changed.
    pub fn complete(&mut self, doc: &mut Document, outcome: CompileOutcome) -> bool {
        self.in_flight = None;

        let index = match doc.block(outcome.index) {
            Some(block) if block.id() == outcome.id => Some(outcome.index),
            _ => doc.position_of(outcome.id),
        };
        let Some(block) = index.and_then(|i| doc.block_mut(i)) else {
            tracing::debug!(block = outcome.id.get(), "discarding result for removed block");
            return false;
        };
        if block.revision() != outcome.revision || *block.state() != RenderState::Compiling {
            tracing::debug!(
                block = outcome.id.get(),
                dispatched = outcome.revision,
                current = block.revision(),
                "discarding stale result"
            );
            return false;
        }

        match outcome.result {
            Ok(image) => block.set_state(RenderState::Rendered(image)),
            Err(message) => block.set_state(RenderState::Errored(message)),
        }
        true
    }

    // --- overlay ------------------------------------------------------------

    /// Images to draw this frame: rendered math blocks away from the cursor
    /// that fit entirely inside the text area.
    #[must_use]
    pub fn placements<'d>(doc: &'d Document, layout: &Layout) -> Vec<Placement<'d>> {
        visible_images(doc, layout).into_iter().map(|(_, p)| p).collect()
    }

    /// Redraw images if the placement set changed since the last call.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    pub fn overlay(&mut self, doc: &Document, layout: &Layout, out: &mut dyn Write) -> io::Result<()> {
        let (keys, placements): (Vec<PlacementKey>, Vec<Placement<'_>>) =
            visible_images(doc, layout).into_iter().unzip();

        if self.shown.as_ref() == Some(&keys) {
            return Ok(());
        }
        tracing::trace!(images = placements.len(), "composing overlay");
        self.compositor.compose(out, &placements)?;
        self.shown = Some(keys);
        Ok(())
    }
}

fn visible_images<'d>(doc: &'d Document, layout: &Layout) -> Vec<(PlacementKey, Placement<'d>)> {
    let mut visible = Vec::new();
    if layout.text_width == 0 {
        return visible;
    }
    let top = doc.scroll().row;
    let bottom = top + usize::from(layout.text_height);
    let mut row = 0usize;

    for (index, block) in doc.blocks().iter().enumerate() {
        let start = row;
        row += block.line_count();
        if start >= bottom {
            break;
        }
        if !view::shows_image(doc, index, block) || start < top || row > bottom {
            continue;
        }
        if let (Some(image), Some(y)) = (block.state().image(), layout.screen_row(doc, start)) {
            let x = layout.text_left;
            visible.push(((block.id(), block.revision(), x, y), Placement { x, y, image }));
        }
    }
    visible
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("compiler", &self.compiler)
            .field("in_flight", &self.in_flight)
            .field("shown", &self.shown)
            .finish_non_exhaustive()
    }
}
