// SPDX-License-Identifier: MIT
//
// Compile failures.
//
// Every way a compile attempt can fail lands here. None of them are
// fatal to the editor: the render coordinator turns the message into a
// block error and keeps the raw text on screen.

use std::io;
use std::path::PathBuf;

/// A failed attempt to turn math source into a cached PNG.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Filesystem work (scratch directory, `.tex` write, cache rename) failed.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },

    /// An external program could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// An external program ran and reported failure.
    ///
    /// `output` holds the combined stdout/stderr, followed by the TeX log
    /// when one was produced.
    #[error("{program} failed ({status})\n{output}")]
    Tool {
        program: String,
        status: String,
        output: String,
    },

    /// A step reported success but its artifact is missing.
    #[error("{step} produced no output at {}", path.display())]
    MissingOutput { step: &'static str, path: PathBuf },
}

impl CompileError {
    /// Wrap an I/O error with a short description of what was being done.
    #[must_use]
    pub const fn io(context: &'static str, source: io::Error) -> Self {
        Self::Io { context, source }
    }

    /// One line suitable for a status bar.
    ///
    /// For a failed TeX run this is the first `! ...` diagnostic from the
    /// output or log; otherwise the first line of the message.
    #[must_use]
    pub fn summary(&self) -> String {
        if let Self::Tool { program, output, .. } = self {
            if let Some(line) = output.lines().find(|l| l.starts_with("! ")) {
                return format!("{program}: {}", line.trim_start_matches("! "));
            }
        }
        let text = self.to_string();
        text.lines().next().unwrap_or_default().to_owned()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_error_includes_output() {
        let err = CompileError::Tool {
            program: "pdflatex".into(),
            status: "exit status: 1".into(),
            output: "! Undefined control sequence.".into(),
        };
        let text = err.to_string();
        assert!(text.starts_with("pdflatex failed (exit status: 1)"));
        assert!(text.contains("Undefined control sequence"));
    }

    #[test]
    fn summary_is_first_line() {
        let err = CompileError::Tool {
            program: "magick".into(),
            status: "exit status: 2".into(),
            output: "line one\nline two".into(),
        };
        assert_eq!(err.summary(), "magick failed (exit status: 2)");
    }

    #[test]
    fn summary_prefers_tex_diagnostic() {
        let err = CompileError::Tool {
            program: "pdflatex".into(),
            status: "exit status: 1".into(),
            output: "This is pdfTeX\n! Undefined control sequence.\nl.9 \\bogus".into(),
        };
        assert_eq!(err.summary(), "pdflatex: Undefined control sequence.");
    }

    #[test]
    fn io_error_carries_context() {
        let err = CompileError::io(
            "creating scratch directory",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.to_string(), "creating scratch directory: denied");
    }

    #[test]
    fn missing_output_names_path() {
        let err = CompileError::MissingOutput {
            step: "pdflatex",
            path: PathBuf::from("/tmp/x.pdf"),
        };
        assert_eq!(err.to_string(), "pdflatex produced no output at /tmp/x.pdf");
    }
}
