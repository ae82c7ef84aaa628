// SPDX-License-Identifier: MIT
//
// Log setup.
//
// The terminal belongs to the UI, so records go to `<cache>/quasar.log`,
// appended across runs, without ANSI colours.

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Install the global subscriber and record a panic before it unwinds.
///
/// # Errors
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(config: &Config) -> Result<()> {
    let path = config.log_path();
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|e| {
        eprintln!("quasar: ignoring log filter {:?}: {e}", config.log_filter);
        EnvFilter::new("info")
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .with_thread_names(true)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))?;

    install_panic_hook();
    Ok(())
}

/// Log panics, then defer to whatever hook was installed before.
fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map_or_else(|| "<unknown>".to_owned(), |l| format!("{}:{}", l.file(), l.line()));
        tracing::error!(%location, "panic: {info}");
        previous(info);
    }));
}
