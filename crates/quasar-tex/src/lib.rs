// SPDX-License-Identifier: MIT
//
// quasar-tex: LaTeX math compiler for quasar.
//
// Turns the raw source of a math block into a PNG on disk. The pipeline:
//
//   source → normalize (wrap in gather* unless it brings its own
//   environment) → SHA-256 content key → cache lookup → standalone
//   document → pdflatex → pdfcrop (best effort) → magick → <key>.png
//
// The cache directory is the memo table: a key that already has a PNG
// never touches the toolchain again, across sessions. External programs
// sit behind the `Toolchain` trait so the pipeline can be exercised
// without a TeX installation.

pub mod compiler;
pub mod error;
pub mod normalize;
pub mod toolchain;

pub use compiler::Compiler;
pub use error::CompileError;
pub use toolchain::{SystemToolchain, TexConfig, Toolchain};
