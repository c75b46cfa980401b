//! Tracing setup for the binary.

use std::{fs::OpenOptions, path::Path, sync::Mutex};

use anyhow::Context;
use shared_utils::env::env_flag;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setting this to `1`/`true`/`yes` has the same effect as `--debug`.
pub const DEBUG_ENV: &str = "HISTORY_BUILDER_DEBUG";

/// Default filter directive when `RUST_LOG` is not set.
pub fn default_directive(debug: bool) -> &'static str {
    if debug || env_flag(DEBUG_ENV) {
        "debug"
    } else {
        "info"
    }
}

/// Installs the global subscriber: stderr always, plus `log_file` (appended, no ANSI) when given.
///
/// `RUST_LOG` overrides the level picked from `debug`.
pub fn init_tracing(debug: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init()
        .context("install tracing subscriber")?;
    Ok(())
}
