// SPDX-License-Identifier: MIT
//
// Runtime configuration.
//
// Everything comes from the environment; there is no config file. Unset or
// empty variables mean "use the default". A value that does not parse is
// ignored with a warning, and the warnings are kept until logging is up
// (logging itself needs the cache directory resolved here).
//
//   QUASAR_CACHE_DIR   PNG cache, scratch dirs and quasar.log
//   QUASAR_LOG         tracing filter, default "info"
//   QUASAR_LATEX       LaTeX engine, default "pdflatex"
//   QUASAR_PDFCROP     cropper, default "pdfcrop"
//   QUASAR_MAGICK      ImageMagick entry point, default "magick"
//   QUASAR_DENSITY     rasterization DPI, default 1800

use std::env;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use quasar_tex::TexConfig;

const LOG_FILE: &str = "quasar.log";
const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub cache_dir: PathBuf,
    pub log_filter: String,
    pub tex: TexConfig,
    /// Problems found while loading, to be logged once logging is ready.
    pub warnings: Vec<String>,
}

impl Config {
    /// Resolve the configuration from the process environment.
    pub fn load() -> Self {
        Self::from_lookup(|key| env::var(key).ok(), default_cache_dir())
    }

    /// Resolve from an arbitrary variable source. `fallback_cache` is used
    /// when `QUASAR_CACHE_DIR` is unset.
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>, fallback_cache: PathBuf) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut warnings = Vec::new();
        let mut tex = TexConfig::default();

        if let Some(latex) = var("QUASAR_LATEX") {
            tex.latex = latex;
        }
        if let Some(pdfcrop) = var("QUASAR_PDFCROP") {
            tex.pdfcrop = pdfcrop;
        }
        if let Some(magick) = var("QUASAR_MAGICK") {
            tex.magick = magick;
        }
        if let Some(raw) = var("QUASAR_DENSITY") {
            match raw.trim().parse::<u32>() {
                Ok(density) if density > 0 => tex.density = density,
                _ => warnings.push(format!(
                    "QUASAR_DENSITY={raw:?} is not a positive integer, using {}",
                    tex.density
                )),
            }
        }

        Self {
            cache_dir: var("QUASAR_CACHE_DIR").map_or(fallback_cache, PathBuf::from),
            log_filter: var("QUASAR_LOG").unwrap_or_else(|| DEFAULT_FILTER.to_owned()),
            tex,
            warnings,
        }
    }

    /// Create the cache directory.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn prepare(&self) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("creating cache directory {}", self.cache_dir.display()))
    }

    pub fn log_path(&self) -> PathBuf {
        self.cache_dir.join(LOG_FILE)
    }
}

/// The platform cache directory for quasar, or a temp dir fallback when no
/// home directory is known.
fn default_cache_dir() -> PathBuf {
    ProjectDirs::from("", "", "quasar")
        .map_or_else(|| env::temp_dir().join("quasar"), |dirs| dirs.cache_dir().to_path_buf())
}

// ─── Tests ──────────────────────────────────────────────────────────────────
