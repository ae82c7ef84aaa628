// SPDX-License-Identifier: MIT
//
// External programs used by the compiler.
//
// The compiler never calls `std::process::Command` directly. It describes
// each step as a program name plus arguments and hands it to a
// `Toolchain`. `SystemToolchain` runs the real binaries; tests substitute
// a stub that fabricates the expected files and counts invocations.

use std::ffi::OsString;
use std::process::Command;

use crate::error::CompileError;

// ─── Configuration ──────────────────────────────────────────────────────────

/// Program names and rasterization settings for the TeX pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TexConfig {
    /// LaTeX engine producing the PDF. Default: `pdflatex`.
    pub latex: String,
    /// PDF cropper. Failure is tolerated. Default: `pdfcrop`.
    pub pdfcrop: String,
    /// ImageMagick entry point. Default: `magick`.
    pub magick: String,
    /// Rasterization density in DPI. Default: 1800.
    pub density: u32,
    /// Margin in points passed to `pdfcrop --margins`. Default: 10.
    pub crop_margin: u32,
    /// Colour the black glyphs are repainted with. Default: `white`.
    pub foreground: String,
}

impl Default for TexConfig {
    fn default() -> Self {
        Self {
            latex: "pdflatex".into(),
            pdfcrop: "pdfcrop".into(),
            magick: "magick".into(),
            density: 1800,
            crop_margin: 10,
            foreground: "white".into(),
        }
    }
}

// ─── Toolchain ──────────────────────────────────────────────────────────────

/// Result of running one external program to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    /// Whether the program exited successfully.
    pub success: bool,
    /// Human-readable exit status (`exit status: 1`, `signal: 9`, ...).
    pub status: String,
    /// Combined stdout and stderr, lossily decoded.
    pub output: String,
}

impl ToolOutput {
    /// A successful run with no output.
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            status: "exit status: 0".into(),
            output: String::new(),
        }
    }
}

/// Runs external programs on behalf of the compiler.
///
/// Implementations must be shareable across the background compile
/// thread and the event loop.
pub trait Toolchain: Send + Sync {
    /// Run `program` with `args` and wait for it to finish.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::Spawn`] when the program cannot be started.
    /// A program that starts and fails is *not* an error here; it is
    /// reported through [`ToolOutput::success`].
    fn run(&self, program: &str, args: &[OsString]) -> Result<ToolOutput, CompileError>;
}

/// Runs the real binaries found on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn run(&self, program: &str, args: &[OsString]) -> Result<ToolOutput, CompileError> {
        tracing::debug!(program, ?args, "running");
        let out = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| CompileError::Spawn {
                program: program.to_owned(),
                source,
            })?;

        let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
        output.push_str(&String::from_utf8_lossy(&out.stderr));

        Ok(ToolOutput {
            success: out.status.success(),
            status: out.status.to_string(),
            output,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
