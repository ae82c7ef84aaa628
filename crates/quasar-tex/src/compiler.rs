// SPDX-License-Identifier: MIT
//
// The compile pipeline.
//
// One call to `Compiler::compile` either finds `<key>.png` in the cache
// directory or produces it. All intermediate files live in a scratch
// directory (`compile-*`) created inside the cache directory and removed
// when the attempt ends, successful or not. The finished PNG is renamed
// into place, so a reader never observes a half-written cache entry and
// two racing compiles of the same key both end with a complete file.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::CompileError;
use crate::normalize::{cache_key, document, normalize};
use crate::toolchain::{SystemToolchain, TexConfig, Toolchain};

/// Compiles math source to cached PNG files.
///
/// Cheap to share: wrap it in an `Arc` and hand clones to worker threads.
pub struct Compiler {
    cache_dir: PathBuf,
    config: TexConfig,
    toolchain: Arc<dyn Toolchain>,
}

impl Compiler {
    /// A compiler that runs the real TeX and ImageMagick binaries.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, config: TexConfig) -> Self {
        Self::with_toolchain(cache_dir, config, Arc::new(SystemToolchain))
    }

    /// A compiler with a custom toolchain.
    #[must_use]
    pub fn with_toolchain(
        cache_dir: impl Into<PathBuf>,
        config: TexConfig,
        toolchain: Arc<dyn Toolchain>,
    ) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            config,
            toolchain,
        }
    }

    /// The directory holding `<key>.png` entries.
    #[inline]
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Where the PNG for a cache key lives (whether or not it exists yet).
    #[must_use]
    pub fn cache_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{key}.png"))
    }

    /// Compile `source` and return the path of its PNG.
    ///
    /// A cache hit returns immediately without invoking any external
    /// program.
    ///
    /// # Errors
    ///
    /// Fails when the scratch directory or `.tex` file cannot be written,
    /// when `pdflatex` or `magick` fail or cannot be started, when an
    /// expected artifact is missing, or when the PNG cannot be moved into
    /// the cache. A failing `pdfcrop` is not an error.
    pub fn compile(&self, source: &str) -> Result<PathBuf, CompileError> {
        let normalized = normalize(source);
        let key = cache_key(&normalized);
        let png = self.cache_path(&key);

        if png.is_file() {
            tracing::debug!(%key, "cache hit");
            return Ok(png);
        }

        tracing::info!(%key, "compiling");

        let scratch = tempfile::Builder::new()
            .prefix("compile-")
            .tempdir_in(&self.cache_dir)
            .map_err(|e| CompileError::io("creating scratch directory", e))?;
        let dir = scratch.path();

        let tex = dir.join(format!("{key}.tex"));
        fs::write(&tex, document(&normalized))
            .map_err(|e| CompileError::io("writing .tex source", e))?;

        let pdf = self.typeset(dir, &tex, &key)?;
        let pdf = self.crop(dir, pdf, &key);

        let staged = dir.join(format!("{key}.png"));
        self.rasterize(&pdf, &staged)?;

        fs::rename(&staged, &png).map_err(|e| CompileError::io("moving image into cache", e))?;

        tracing::info!(%key, path = %png.display(), "compiled");
        Ok(png)
    }

    // ── Pipeline steps ──────────────────────────────────────────────────

    /// `pdflatex` → `<dir>/<key>.pdf`. The TeX log is attached on failure.
    fn typeset(&self, dir: &Path, tex: &Path, key: &str) -> Result<PathBuf, CompileError> {
        let mut out_dir = OsString::from("-output-directory=");
        out_dir.push(dir);
        let args = [
            OsString::from("-interaction=nonstopmode"),
            out_dir,
            tex.as_os_str().to_owned(),
        ];

        let program = self.config.latex.as_str();
        let run = self.toolchain.run(program, &args)?;
        if !run.success {
            let log = fs::read_to_string(dir.join(format!("{key}.log"))).unwrap_or_default();
            tracing::warn!(%key, status = %run.status, "latex failed");
            let mut output = run.output;
            if !log.is_empty() {
                output.push_str("\n--- log ---\n");
                output.push_str(&log);
            }
            return Err(CompileError::Tool {
                program: program.to_owned(),
                status: run.status,
                output,
            });
        }

        let pdf = dir.join(format!("{key}.pdf"));
        if !pdf.is_file() {
            return Err(CompileError::MissingOutput {
                step: "latex",
                path: pdf,
            });
        }
        Ok(pdf)
    }

    /// `pdfcrop` → `<dir>/<key>-crop.pdf`, falling back to the input.
    fn crop(&self, dir: &Path, pdf: PathBuf, key: &str) -> PathBuf {
        let cropped = dir.join(format!("{key}-crop.pdf"));
        let args = [
            OsString::from("--margins"),
            OsString::from(self.config.crop_margin.to_string()),
            pdf.as_os_str().to_owned(),
            cropped.as_os_str().to_owned(),
        ];

        match self.toolchain.run(&self.config.pdfcrop, &args) {
            Ok(run) if run.success && cropped.is_file() => cropped,
            Ok(run) => {
                tracing::debug!(%key, status = %run.status, "crop skipped");
                pdf
            }
            Err(e) => {
                tracing::debug!(%key, error = %e, "crop unavailable");
                pdf
            }
        }
    }

    /// `magick` → transparent PNG with the glyphs repainted.
    fn rasterize(&self, pdf: &Path, png: &Path) -> Result<(), CompileError> {
        let args = [
            OsString::from("-density"),
            OsString::from(self.config.density.to_string()),
            pdf.as_os_str().to_owned(),
            OsString::from("-background"),
            OsString::from("transparent"),
            OsString::from("-fill"),
            OsString::from(&self.config.foreground),
            OsString::from("-opaque"),
            OsString::from("black"),
            png.as_os_str().to_owned(),
        ];

        let program = self.config.magick.as_str();
        let run = self.toolchain.run(program, &args)?;
        if !run.success {
            tracing::warn!(status = %run.status, "rasterize failed");
            return Err(CompileError::Tool {
                program: program.to_owned(),
                status: run.status,
                output: run.output,
            });
        }
        if !png.is_file() {
            return Err(CompileError::MissingOutput {
                step: "rasterize",
                path: png.to_path_buf(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for Compiler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compiler")
            .field("cache_dir", &self.cache_dir)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::ToolOutput;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    /// Fabricates the files each real tool would produce and records every
    /// invocation.
    #[derive(Default)]
    struct StubToolchain {
        calls: Mutex<Vec<(String, Vec<OsString>)>>,
        fail: Option<&'static str>,
        skip_pdf: bool,
        crop_fails: bool,
    }

    impl StubToolchain {
        fn programs(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
        }

        fn args_of(&self, program: &str) -> Vec<OsString> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .find(|(p, _)| p == program)
                .map(|(_, a)| a.clone())
                .unwrap()
        }
    }

    impl Toolchain for StubToolchain {
        fn run(&self, program: &str, args: &[OsString]) -> Result<ToolOutput, CompileError> {
            self.calls
                .lock()
                .unwrap()
                .push((program.to_owned(), args.to_vec()));

            let last = PathBuf::from(args.last().unwrap());
            if self.fail == Some(program) {
                if program == "pdflatex" {
                    fs::write(last.with_extension("log"), "! Missing $ inserted.").unwrap();
                }
                return Ok(ToolOutput {
                    success: false,
                    status: "exit status: 1".into(),
                    output: format!("{program} exploded"),
                });
            }

            match program {
                "pdflatex" if !self.skip_pdf => fs::write(last.with_extension("pdf"), b"%PDF").unwrap(),
                "pdfcrop" if !self.crop_fails => fs::write(&last, b"%PDF cropped").unwrap(),
                "pdfcrop" => {
                    return Ok(ToolOutput {
                        success: false,
                        status: "exit status: 2".into(),
                        output: String::new(),
                    });
                }
                "magick" => image::RgbaImage::new(8, 4).save(&last).unwrap(),
                _ => {}
            }
            Ok(ToolOutput::ok())
        }
    }

    fn compiler_with(stub: StubToolchain) -> (tempfile::TempDir, Compiler, Arc<StubToolchain>) {
        let dir = tempfile::tempdir().unwrap();
        let stub = Arc::new(stub);
        let toolchain: Arc<dyn Toolchain> = stub.clone();
        let compiler = Compiler::with_toolchain(dir.path(), TexConfig::default(), toolchain);
        (dir, compiler, stub)
    }

    fn scratch_dirs(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with("compile-"))
            .count()
    }

    // ── Happy path ──────────────────────────────────────────────────────

    #[test]
    fn compile_produces_cached_png() {
        let (dir, compiler, stub) = compiler_with(StubToolchain::default());

        let png = compiler.compile("x^2").unwrap();

        let key = cache_key(&normalize("x^2"));
        assert_eq!(png, dir.path().join(format!("{key}.png")));
        assert!(png.is_file());
        assert_eq!(stub.programs(), vec!["pdflatex", "pdfcrop", "magick"]);
    }

    #[test]
    fn second_compile_is_a_cache_hit() {
        let (_dir, compiler, stub) = compiler_with(StubToolchain::default());

        let first = compiler.compile("\\frac{a}{b}").unwrap();
        let calls = stub.programs().len();
        let second = compiler.compile("\\frac{a}{b}").unwrap();

        assert_eq!(first, second);
        assert_eq!(stub.programs().len(), calls);
    }

    #[test]
    fn whitespace_variant_is_a_cache_hit() {
        let (_dir, compiler, stub) = compiler_with(StubToolchain::default());

        compiler.compile("a+b").unwrap();
        compiler.compile("\n  a+b  \n").unwrap();

        assert_eq!(stub.programs().len(), 3);
    }

    #[test]
    fn scratch_directory_is_removed() {
        let (dir, compiler, _stub) = compiler_with(StubToolchain::default());
        compiler.compile("y").unwrap();
        assert_eq!(scratch_dirs(dir.path()), 0);
    }

    #[test]
    fn latex_runs_in_scratch_directory() {
        let (dir, compiler, stub) = compiler_with(StubToolchain::default());
        compiler.compile("z").unwrap();

        let args = stub.args_of("pdflatex");
        assert_eq!(args[0], "-interaction=nonstopmode");
        let out_dir = args[1].to_string_lossy().into_owned();
        assert!(out_dir.starts_with("-output-directory="));
        assert!(out_dir.contains(&*dir.path().join("compile-").to_string_lossy()));
    }

    #[test]
    fn rasterize_uses_configured_density_and_colour() {
        let (_dir, compiler, stub) = compiler_with(StubToolchain::default());
        compiler.compile("w").unwrap();

        let args = stub.args_of("magick");
        assert_eq!(args[0], "-density");
        assert_eq!(args[1], "1800");
        assert!(args[2].to_string_lossy().ends_with("-crop.pdf"));
        assert_eq!(&args[3..9], ["-background", "transparent", "-fill", "white", "-opaque", "black"]);
    }

    // ── Crop fallback ───────────────────────────────────────────────────

    #[test]
    fn failed_crop_falls_back_to_uncropped_pdf() {
        let (_dir, compiler, stub) = compiler_with(StubToolchain {
            crop_fails: true,
            ..StubToolchain::default()
        });

        let png = compiler.compile("q").unwrap();

        assert!(png.is_file());
        let pdf = stub.args_of("magick")[2].to_string_lossy().into_owned();
        assert!(pdf.ends_with(".pdf"));
        assert!(!pdf.ends_with("-crop.pdf"));
    }

    // ── Failures ────────────────────────────────────────────────────────

    #[test]
    fn latex_failure_carries_output_and_log() {
        let (dir, compiler, stub) = compiler_with(StubToolchain {
            fail: Some("pdflatex"),
            ..StubToolchain::default()
        });

        let err = compiler.compile("\\bogus").unwrap_err();

        let CompileError::Tool { program, output, .. } = &err else {
            panic!("expected tool error, got {err:?}");
        };
        assert_eq!(program, "pdflatex");
        assert!(output.contains("pdflatex exploded"));
        assert!(output.contains("! Missing $ inserted."));
        assert_eq!(stub.programs(), vec!["pdflatex"]);
        assert_eq!(scratch_dirs(dir.path()), 0);
    }

    #[test]
    fn failed_compile_leaves_no_cache_entry() {
        let (_dir, compiler, _stub) = compiler_with(StubToolchain {
            fail: Some("magick"),
            ..StubToolchain::default()
        });

        let err = compiler.compile("v").unwrap_err();

        assert!(matches!(err, CompileError::Tool { .. }));
        let key = cache_key(&normalize("v"));
        assert!(!compiler.cache_path(&key).exists());
    }

    #[test]
    fn missing_pdf_is_reported() {
        let (_dir, compiler, _stub) = compiler_with(StubToolchain {
            skip_pdf: true,
            ..StubToolchain::default()
        });

        let err = compiler.compile("u").unwrap_err();
        assert!(matches!(err, CompileError::MissingOutput { step: "latex", .. }));
    }

    #[test]
    fn failure_is_retried_on_next_compile() {
        let (_dir, compiler, stub) = compiler_with(StubToolchain {
            fail: Some("pdflatex"),
            ..StubToolchain::default()
        });

        assert!(compiler.compile("t").is_err());
        assert!(compiler.compile("t").is_err());
        assert_eq!(stub.programs().len(), 2);
    }

    #[test]
    fn unwritable_cache_dir_is_io_error() {
        let compiler = Compiler::with_toolchain(
            "/nonexistent/quasar-cache",
            TexConfig::default(),
            Arc::new(StubToolchain::default()),
        );
        let err = compiler.compile("s").unwrap_err();
        assert!(matches!(err, CompileError::Io { .. }));
    }
}
