//! View: turns a [`Document`] into cells.
//!
//! Every screen row of the text area looks like
//!
//! ```text
//!   │ 12 text of the line
//! ^^ ^^^^^
//! pad bar + right-aligned line number, padded by one space each side
//! ```
//!
//! and the last row is the status line. Each block occupies exactly as many
//! rows as it has lines. A math block that is rendered and not under the
//! cursor keeps its gutter but leaves its text cells blank; the render
//! coordinator draws the image over them.

use quasar_term::buffer::{FrameBuffer, string_width};
use quasar_term::cell::{Attr, CellColor};
use unicode_width::UnicodeWidthChar;

use crate::block::Block;
use crate::document::Document;
use crate::mode::Mode;

const LEFT_PAD: u16 = 2;

const PINK: CellColor = CellColor::Rgb(0xFF, 0x5F, 0x87);
const WHITE: CellColor = CellColor::Rgb(0xFF, 0xFF, 0xFF);
const GREY: CellColor = CellColor::Ansi256(240);
const BLUE: CellColor = CellColor::Ansi256(69);
const RED: CellColor = CellColor::Ansi256(196);

// ---------------------------------------------------------------------------
// Layout
// ---------------------------------------------------------------------------

/// Screen geometry for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Layout {
    /// Digits in the largest line number.
    pub gutter_digits: u16,
    /// Screen column where line text (and images) start.
    pub text_left: u16,
    pub text_width: u16,
    /// Rows available for the document; the status line is below them.
    pub text_height: u16,
    pub cols: u16,
    pub rows: u16,
}

impl Layout {
    #[must_use]
    pub fn new(doc: &Document, cols: u16, rows: u16) -> Self {
        let gutter_digits = u16::try_from(doc.total_lines().max(1).to_string().len()).unwrap_or(u16::MAX);
        // pad, bar, space, digits, space
        let text_left = (LEFT_PAD + 2).saturating_add(gutter_digits).saturating_add(1);
        Self {
            gutter_digits,
            text_left,
            text_width: cols.saturating_sub(text_left),
            text_height: rows.saturating_sub(1),
            cols,
            rows,
        }
    }

    /// Screen row of document row `row`, if it is visible.
    #[must_use]
    pub fn screen_row(&self, doc: &Document, row: usize) -> Option<u16> {
        let y = row.checked_sub(doc.scroll().row)?;
        u16::try_from(y).ok().filter(|&y| y < self.text_height)
    }
}

/// Whether the block's text is hidden behind its image.
#[must_use]
pub fn shows_image(doc: &Document, index: usize, block: &Block) -> bool {
    block.is_math() && block.state().image().is_some() && index != doc.cursor().block
}

// ---------------------------------------------------------------------------
// Painting
// ---------------------------------------------------------------------------

/// Paint the document and status line.
///
/// `busy` adds a compiling indicator to the status line.
pub fn paint(buf: &mut FrameBuffer, doc: &Document, layout: &Layout, mode: Mode, busy: bool) {
    paint_text_area(buf, doc, layout);
    paint_status(buf, doc, layout, mode, busy);
}

fn paint_text_area(buf: &mut FrameBuffer, doc: &Document, layout: &Layout) {
    let cursor = doc.cursor();
    let scroll_col = doc.scroll().col;
    let digits = usize::from(layout.gutter_digits);
    let mut row = 0usize;

    for (index, block) in doc.blocks().iter().enumerate() {
        let bar = if block.state().has_error() {
            RED
        } else if block.is_math() {
            BLUE
        } else {
            GREY
        };
        let hidden = shows_image(doc, index, block);

        for (line_idx, line) in block.lines().iter().enumerate() {
            let doc_row = row + line_idx;
            let Some(y) = layout.screen_row(doc, doc_row) else {
                continue;
            };

            buf.paint_text(LEFT_PAD, y, layout.cols, "│", bar, CellColor::Default, Attr::empty());

            let is_cursor_line = index == cursor.block && line_idx == cursor.line;
            let (fg, attrs) = if is_cursor_line {
                (PINK, Attr::BOLD)
            } else {
                (GREY, Attr::empty())
            };
            let number = format!(" {:>digits$} ", doc_row + 1);
            buf.paint_text(LEFT_PAD + 1, y, layout.cols, &number, fg, CellColor::Default, attrs);

            if !hidden {
                let visible: String = line.chars().skip(scroll_col).collect();
                buf.paint_text(
                    layout.text_left,
                    y,
                    layout.cols,
                    &visible,
                    CellColor::Default,
                    CellColor::Default,
                    Attr::empty(),
                );
            }
        }
        row += block.line_count();
    }
}

fn paint_status(buf: &mut FrameBuffer, doc: &Document, layout: &Layout, mode: Mode, busy: bool) {
    if layout.rows == 0 {
        return;
    }
    let y = layout.rows - 1;
    let limit = layout.cols;

    let badge = format!(" {} ", mode.display_name());
    let mut x = buf.paint_text(0, y, limit, &badge, WHITE, PINK, Attr::BOLD);
    x += 1;

    if let Some(error) = doc.current_block().state().error() {
        x += buf.paint_text(x, y, limit, error, RED, CellColor::Default, Attr::empty());
        x += 1;
    }
    if busy {
        buf.paint_text(x, y, limit, "compiling…", GREY, CellColor::Default, Attr::ITALIC);
    }

    let cursor = doc.cursor();
    let position = format!("{}:{} ", doc.global_row() + 1, cursor.col + 1);
    let width = u16::try_from(string_width(&position)).unwrap_or(limit);
    buf.paint_text(limit.saturating_sub(width), y, limit, &position, GREY, CellColor::Default, Attr::empty());
}

/// Screen position of the cursor, if it falls inside the text area.
#[must_use]
pub fn cursor_position(doc: &Document, layout: &Layout) -> Option<(u16, u16)> {
    let y = layout.screen_row(doc, doc.global_row())?;
    let scroll_col = doc.scroll().col;
    let cols: usize = doc
        .current_line()
        .chars()
        .skip(scroll_col)
        .take(doc.cursor().col.saturating_sub(scroll_col))
        .map(|c| c.width().unwrap_or(0))
        .sum();
    let x = usize::from(layout.text_left) + cols;
    u16::try_from(x).ok().filter(|&x| x < layout.cols).map(|x| (x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockKind, RenderState};
    use crate::cursor::Cursor;
    use pretty_assertions::assert_eq;
    use quasar_term::graphics::EncodedImage;

    fn row_text(buf: &FrameBuffer, y: u16) -> String {
        buf.row(y)
            .unwrap()
            .iter()
            .filter_map(|c| c.character())
            .collect::<String>()
            .trim_end()
            .to_owned()
    }

    fn rendered(rows: u16) -> RenderState {
        RenderState::Rendered(EncodedImage {
            sequence: "img".into(),
            rows,
        })
    }

    fn sample() -> Document {
        Document::from_parts([
            (BlockKind::Text, vec!["hello"]),
            (BlockKind::Math, vec!["$$", "x^2", "$$"]),
            (BlockKind::Text, vec!["bye"]),
        ])
    }

    fn frame(doc: &Document, mode: Mode) -> FrameBuffer {
        let layout = Layout::new(doc, 48, 8);
        let mut buf = FrameBuffer::new(48, 8);
        paint(&mut buf, doc, &layout, mode, false);
        buf
    }

    #[test]
    fn layout_for_single_digit_gutter() {
        let layout = Layout::new(&sample(), 30, 8);
        assert_eq!(layout.gutter_digits, 1);
        assert_eq!(layout.text_left, 6);
        assert_eq!(layout.text_width, 24);
        assert_eq!(layout.text_height, 7);
    }

    #[test]
    fn layout_widens_with_line_count() {
        let lines: Vec<String> = (0..120).map(|i| i.to_string()).collect();
        let doc = Document::from_parts([(BlockKind::Text, lines)]);
        let layout = Layout::new(&doc, 80, 24);
        assert_eq!(layout.gutter_digits, 3);
        assert_eq!(layout.text_left, 8);
    }

    #[test]
    fn rows_show_bar_number_and_text() {
        let buf = frame(&sample(), Mode::Normal);
        assert_eq!(row_text(&buf, 0), "  │ 1 hello");
        assert_eq!(row_text(&buf, 2), "  │ 3 x^2");
        assert_eq!(row_text(&buf, 4), "  │ 5 bye");
    }

    #[test]
    fn bar_colour_follows_kind_and_error() {
        let mut doc = sample();
        doc.block_mut(2).unwrap().set_state(RenderState::Errored("boom".into()));
        let buf = frame(&doc, Mode::Normal);
        assert_eq!(buf.get(2, 0).unwrap().fg, GREY);
        assert_eq!(buf.get(2, 1).unwrap().fg, BLUE);
        assert_eq!(buf.get(2, 4).unwrap().fg, RED);
    }

    #[test]
    fn cursor_line_number_is_highlighted() {
        let mut doc = sample();
        doc.set_cursor(Cursor::new(2, 0, 0));
        let buf = frame(&doc, Mode::Normal);
        assert_eq!(buf.get(4, 4).unwrap().fg, PINK);
        assert_eq!(buf.get(4, 4).unwrap().attrs, Attr::BOLD);
        assert_eq!(buf.get(4, 0).unwrap().fg, GREY);
    }

    #[test]
    fn inactive_rendered_math_is_blank_but_keeps_gutter() {
        let mut doc = sample();
        doc.block_mut(1).unwrap().set_state(rendered(3));
        let buf = frame(&doc, Mode::Normal);
        assert_eq!(row_text(&buf, 1), "  │ 2");
        assert_eq!(row_text(&buf, 2), "  │ 3");
        assert_eq!(row_text(&buf, 3), "  │ 4");
        assert_eq!(row_text(&buf, 4), "  │ 5 bye");
    }

    #[test]
    fn active_rendered_math_shows_source() {
        let mut doc = sample();
        doc.block_mut(1).unwrap().set_state(rendered(3));
        doc.set_cursor(Cursor::new(1, 1, 0));
        let buf = frame(&doc, Mode::Insert);
        assert_eq!(row_text(&buf, 2), "  │ 3 x^2");
    }

    #[test]
    fn status_line_shows_mode_error_and_position() {
        let mut doc = sample();
        doc.block_mut(1).unwrap().set_state(RenderState::Errored("pdflatex: Missing $ inserted.".into()));
        doc.set_cursor(Cursor::new(1, 1, 2));
        let buf = frame(&doc, Mode::Insert);
        let status = row_text(&buf, 7);
        assert!(status.starts_with(" INSERT  pdflatex: Missing $ inserted."), "{status:?}");
        assert!(status.ends_with("3:3"), "{status:?}");
    }

    #[test]
    fn busy_indicator() {
        let doc = sample();
        let layout = Layout::new(&doc, 40, 8);
        let mut buf = FrameBuffer::new(40, 8);
        paint(&mut buf, &doc, &layout, Mode::Normal, true);
        assert!(row_text(&buf, 7).contains("compiling…"));
    }

    #[test]
    fn cursor_position_maps_to_text_area() {
        let mut doc = sample();
        doc.set_cursor(Cursor::new(1, 1, 2));
        let layout = Layout::new(&doc, 30, 8);
        assert_eq!(cursor_position(&doc, &layout), Some((8, 2)));
    }

    #[test]
    fn cursor_position_counts_wide_chars() {
        let mut doc = Document::from_parts([(BlockKind::Text, vec!["中a"])]);
        doc.set_cursor(Cursor::new(0, 0, 1));
        let layout = Layout::new(&doc, 30, 8);
        assert_eq!(cursor_position(&doc, &layout), Some((8, 0)));
    }

    #[test]
    fn cursor_stays_on_screen_at_end_of_wide_line() {
        let mut doc = Document::from_parts([(BlockKind::Text, vec!["中中中中中"])]);
        let layout = Layout::new(&doc, 12, 4);
        doc.set_size(usize::from(layout.text_width), usize::from(layout.text_height));
        doc.end_of_line();
        assert_eq!(doc.scroll().col, 3);
        assert_eq!(cursor_position(&doc, &layout), Some((10, 0)));
    }

    #[test]
    fn scrolled_rows_start_at_offset() {
        let lines: Vec<String> = (1..=10).map(|i| format!("line {i}")).collect();
        let mut doc = Document::from_parts([(BlockKind::Text, lines)]);
        let layout = Layout::new(&doc, 30, 4);
        doc.set_size(usize::from(layout.text_width), usize::from(layout.text_height));
        doc.set_cursor(Cursor::new(0, 9, 0));

        let mut buf = FrameBuffer::new(30, 4);
        paint(&mut buf, &doc, &layout, Mode::Normal, false);

        assert_eq!(row_text(&buf, 0), "  │  8 line 8");
        assert_eq!(row_text(&buf, 2), "  │ 10 line 10");
        assert_eq!(cursor_position(&doc, &layout), Some((7, 2)));
    }
}
