// SPDX-License-Identifier: MIT
//
// Source normalization and content keys.
//
// Math blocks hold bare LaTeX. Before typesetting, the source is trimmed
// and, unless it already opens one of the display environments that
// provide their own math mode, wrapped in `gather*`. The cache key is the
// SHA-256 of that normalized text, so `x^2` and ` x^2 ` share one PNG.

use std::sync::LazyLock;

use regex::Regex;
use sha2::{Digest, Sha256};

/// Display environments that enter math mode on their own.
///
/// Matches `\begin{align}`, `\begin{equation*}` and friends at the very
/// start of the trimmed source.
static MATH_ENVIRONMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\\begin\{(?:align|equation|gather|multline)\*?\}")
        .expect("math environment pattern is valid")
});

/// Preamble and wrapper for a single standalone equation.
///
/// `preview` plus a small border keeps the PDF page tight around the
/// math; zeroed display skips stop amsmath adding vertical padding.
const DOCUMENT_HEAD: &str = "\
\\documentclass[preview,border=2pt]{standalone}
\\usepackage[T1]{fontenc}
\\usepackage{lmodern}
\\usepackage{amsmath}
\\usepackage{amssymb}
\\setlength{\\abovedisplayskip}{0pt}
\\setlength{\\belowdisplayskip}{0pt}
\\begin{document}
";

const DOCUMENT_TAIL: &str = "\n\\end{document}\n";

/// Whether `source` already opens a math-mode environment.
#[must_use]
pub fn is_math_environment(source: &str) -> bool {
    MATH_ENVIRONMENT.is_match(source)
}

/// Trim and, when needed, wrap the source in `gather*`.
#[must_use]
pub fn normalize(source: &str) -> String {
    let trimmed = source.trim();
    if is_math_environment(trimmed) {
        trimmed.to_owned()
    } else {
        format!("\\begin{{gather*}}{trimmed}\\end{{gather*}}")
    }
}

/// Hex SHA-256 of the normalized source. Used as the cache file stem.
#[must_use]
pub fn cache_key(normalized: &str) -> String {
    hex::encode(Sha256::digest(normalized.as_bytes()))
}

/// The complete `.tex` document for a normalized source.
#[must_use]
pub fn document(normalized: &str) -> String {
    let mut tex = String::with_capacity(DOCUMENT_HEAD.len() + normalized.len() + DOCUMENT_TAIL.len());
    tex.push_str(DOCUMENT_HEAD);
    tex.push_str(normalized);
    tex.push_str(DOCUMENT_TAIL);
    tex
}

// ─── Tests ───────────────────────────────────────────────────────────────────
