//! Tracing subscriber setup for the CLI.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Level used when neither `log_level` nor `RUST_LOG` is set.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Map common level spellings (`WARNING`, `CRITICAL`, ...) onto tracing levels.
/// Anything else is handed to `EnvFilter` unchanged, so full directives work.
pub fn level_directive(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "notset" => "trace".to_string(),
        other => other.to_string(),
    }
}

/// Install the global subscriber. Logs go to `log_file` (appended) or stderr.
///
/// Installing twice is not an error; the first subscriber stays active.
pub fn init(log_level: Option<&str>, log_file: Option<&Path>) -> Result<()> {
    let filter = match log_level {
        Some(level) => EnvFilter::try_new(level_directive(level))
            .with_context(|| format!("invalid log_level `{level}`"))?,
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL)),
    };

    let installed = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
    Ok(())
}
