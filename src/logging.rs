//! Logging initialization for depot.
//!
//! The filter comes from [`LoggingConfig::level`], which accepts either a
//! bare level or full per-target directives; output goes to the console,
//! optionally teed into a log file.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{DepotError, Result};

/// Build the log filter from the configured directive string.
///
/// Accepts a bare level ("debug") or per-target directives
/// ("depot=debug,sqlx=warn"); an unparsable string falls back to `info`.
fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber described by `config`.
///
/// With a configured file, log lines go to both the console and the file
/// (parent directories are created as needed); without one, console only.
/// Fails with `Config` if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let writer = match &config.file {
        Some(file) => {
            let path = Path::new(file);
            if let Some(parent) = path.parent() {
                if !parent.exists() {
                    fs::create_dir_all(parent)?;
                }
            }
            let log_file = Arc::new(File::create(path)?);
            BoxMakeWriter::new(std::io::stdout.and(log_file))
        }
        None => BoxMakeWriter::new(std::io::stdout),
    };

    tracing_subscriber::fmt()
        .with_env_filter(build_filter(&config.level))
        .with_writer(writer)
        .with_ansi(config.file.is_none())
        .with_target(true)
        .try_init()
        .map_err(|e| DepotError::Config(format!("failed to install log subscriber: {e}")))
}
