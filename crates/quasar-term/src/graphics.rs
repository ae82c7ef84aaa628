// SPDX-License-Identifier: MIT
//
// Kitty graphics protocol.
//
// Images never enter the frame buffer. `encode` turns a PNG into a single
// transmit-and-display APC sequence, and a `Compositor` writes a set of
// placements straight to the terminal after the diffed frame has been
// flushed: delete every image, then for each placement save the cursor,
// move, emit the image, restore the cursor.
//
// Sequences use `q=2` so the terminal sends no replies into stdin, and
// `C=1` so drawing an image does not move the cursor.

use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ImageReader;

use crate::ansi;

/// Base64 payload bytes per APC chunk.
const CHUNK_SIZE: usize = 4096;

const DELETE_ALL: &str = "\x1b_Ga=d,d=A,q=2\x1b\\";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Failure to turn a file into an image sequence.
#[derive(Debug, thiserror::Error)]
pub enum GraphicsError {
    #[error("reading {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not a readable image", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

// ─── Encoding ────────────────────────────────────────────────────────────────

/// A ready-to-write Kitty sequence and the number of rows it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub sequence: String,
    pub rows: u16,
}

/// Encode the PNG at `path` to be drawn exactly `target_rows` cells tall.
///
/// Zero rows is raised to one. The file is only read.
///
/// # Errors
///
/// [`GraphicsError::Io`] if the file cannot be read,
/// [`GraphicsError::Decode`] if it is not an image.
pub fn encode(path: &Path, target_rows: u16) -> Result<EncodedImage, GraphicsError> {
    let data = std::fs::read(path).map_err(|source| GraphicsError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let decode_err = |source| GraphicsError::Decode {
        path: path.to_path_buf(),
        source,
    };
    ImageReader::new(Cursor::new(&data))
        .with_guessed_format()
        .map_err(|e| decode_err(image::ImageError::IoError(e)))?
        .into_dimensions()
        .map_err(decode_err)?;

    let rows = target_rows.max(1);
    Ok(EncodedImage {
        sequence: kitty_sequence(&data, rows),
        rows,
    })
}

fn kitty_sequence(png: &[u8], rows: u16) -> String {
    let encoded = BASE64.encode(png);
    let total = encoded.len().div_ceil(CHUNK_SIZE).max(1);
    let mut seq = String::with_capacity(encoded.len() + total * 32);

    // Base64 is ASCII, so byte offsets are char boundaries.
    for i in 0..total {
        let start = i * CHUNK_SIZE;
        let end = (start + CHUNK_SIZE).min(encoded.len());
        let chunk = &encoded[start..end];
        let more = u8::from(i + 1 < total);
        if i == 0 {
            seq.push_str(&format!("\x1b_Ga=T,f=100,r={rows},C=1,q=2,m={more};{chunk}\x1b\\"));
        } else {
            seq.push_str(&format!("\x1b_Gm={more};{chunk}\x1b\\"));
        }
    }
    seq
}

/// Delete every image placement on screen.
///
/// # Errors
///
/// Returns an error if writing to `w` fails.
pub fn delete_all(w: &mut impl Write) -> io::Result<()> {
    w.write_all(DELETE_ALL.as_bytes())
}

// ─── Compositing ─────────────────────────────────────────────────────────────

/// An image drawn with its top-left corner at cell `(x, y)` (0-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement<'a> {
    pub x: u16,
    pub y: u16,
    pub image: &'a EncodedImage,
}

/// Writes a complete set of image placements to the terminal.
///
/// Each call replaces whatever the previous call drew.
pub trait Compositor {
    /// Draw `placements`, removing every image drawn before.
    ///
    /// # Errors
    ///
    /// Returns an error if writing to `out` fails.
    fn compose(&mut self, out: &mut dyn Write, placements: &[Placement<'_>]) -> io::Result<()>;
}

/// [`Compositor`] for terminals speaking the Kitty graphics protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct KittyCompositor;

impl Compositor for KittyCompositor {
    fn compose(&mut self, mut out: &mut dyn Write, placements: &[Placement<'_>]) -> io::Result<()> {
        delete_all(&mut out)?;
        for placement in placements {
            ansi::save_cursor(&mut out)?;
            ansi::cursor_to(&mut out, placement.x, placement.y)?;
            out.write_all(placement.image.sequence.as_bytes())?;
            ansi::restore_cursor(&mut out)?;
        }
        out.flush()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn write_png(dir: &Path, name: &str, w: u32, h: u32) -> PathBuf {
        let path = dir.join(name);
        image::RgbaImage::new(w, h).save(&path).unwrap();
        path
    }

    fn chunk_count(seq: &str) -> usize {
        seq.matches("\x1b_G").count()
    }

    // ── encode ──────────────────────────────────────────────────────

    #[test]
    fn encode_uses_target_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 16, 8);
        let img = encode(&path, 3).unwrap();
        assert_eq!(img.rows, 3);
        assert!(img.sequence.starts_with("\x1b_Ga=T,f=100,r=3,C=1,q=2,m=0;"));
        assert!(img.sequence.ends_with("\x1b\\"));
    }

    #[test]
    fn encode_zero_rows_becomes_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 4, 4);
        let img = encode(&path, 0).unwrap();
        assert_eq!(img.rows, 1);
        assert!(img.sequence.contains("r=1,"));
    }

    #[test]
    fn encode_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 4, 4);
        let before = std::fs::read(&path).unwrap();
        encode(&path, 2).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }

    #[test]
    fn encode_payload_is_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "a.png", 4, 4);
        let img = encode(&path, 1).unwrap();
        let payload = img
            .sequence
            .split_once(';')
            .and_then(|(_, rest)| rest.strip_suffix("\x1b\\"))
            .unwrap();
        assert_eq!(BASE64.decode(payload).unwrap(), std::fs::read(&path).unwrap());
    }

    #[test]
    fn encode_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = encode(&dir.path().join("nope.png"), 1).unwrap_err();
        assert!(matches!(err, GraphicsError::Io { .. }));
    }

    #[test]
    fn encode_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = encode(&path, 1).unwrap_err();
        assert!(matches!(err, GraphicsError::Decode { .. }));
    }

    // ── chunking ────────────────────────────────────────────────────

    #[test]
    fn large_payload_is_chunked() {
        let data = vec![0xAB; CHUNK_SIZE * 2];
        let seq = kitty_sequence(&data, 2);
        let encoded_len = BASE64.encode(&data).len();
        assert_eq!(chunk_count(&seq), encoded_len.div_ceil(CHUNK_SIZE));
        assert!(seq.starts_with("\x1b_Ga=T,f=100,r=2,C=1,q=2,m=1;"));
        assert!(seq.contains("\x1b_Gm=1;"));
        assert!(seq.contains("\x1b_Gm=0;"));
    }

    #[test]
    fn small_payload_is_one_chunk() {
        let seq = kitty_sequence(b"png", 1);
        assert_eq!(chunk_count(&seq), 1);
        assert!(seq.contains("m=0;"));
    }

    // ── compose ─────────────────────────────────────────────────────

    #[test]
    fn compose_without_placements_only_deletes() {
        let mut out = Vec::new();
        KittyCompositor.compose(&mut out, &[]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), DELETE_ALL);
    }

    #[test]
    fn compose_wraps_each_placement() {
        let img = EncodedImage {
            sequence: "<img>".into(),
            rows: 3,
        };
        let placements = [
            Placement { x: 7, y: 0, image: &img },
            Placement { x: 7, y: 5, image: &img },
        ];
        let mut out = Vec::new();
        KittyCompositor.compose(&mut out, &placements).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            format!("{DELETE_ALL}\x1b[s\x1b[1;8H<img>\x1b[u\x1b[s\x1b[6;8H<img>\x1b[u")
        );
    }
}
