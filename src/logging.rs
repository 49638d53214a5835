//! Log output of the binaries.
//!
//! Everything down to TRACE goes to a file in the temporary directory so a
//! failed installation can be diagnosed afterwards. The console only gets
//! what the user asked for.
use std::{fs::File, path::PathBuf};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use crate::error::{InstallerError, InstallerErrorKind};

/// Returns the log file of a program for the current user.
pub fn log_file_path(program: &str) -> PathBuf {
    tempfile::env::temp_dir().join(format!("{program}_{}.log", whoami::username()))
}

/// Console level for the `--verbose` flag.
pub fn console_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Installs the global subscriber and returns the log file path.
///
/// Pass `None` as `console_level` while a TUI owns the terminal.
pub fn init_logging(
    program: &str,
    console_level: Option<LevelFilter>,
) -> Result<PathBuf, InstallerError> {
    let path = log_file_path(program);
    let log_file = File::options()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|error| InstallerError::from(error).with_context(path.to_string_lossy()))?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(LevelFilter::TRACE);

    let console_layer = console_level.map(|level| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .with_filter(level)
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|error| InstallerError::new(InstallerErrorKind::Other).with_source(error))?;

    tracing::debug!(?path, "logging initialized");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_path() {
        let path = log_file_path("grars-setup");
        let name = path.file_name().unwrap().to_string_lossy().into_owned();

        assert!(name.starts_with("grars-setup_"));
        assert!(name.ends_with(".log"));
        assert_eq!(path.parent().unwrap(), tempfile::env::temp_dir());
    }

    #[test]
    fn test_console_level() {
        assert_eq!(console_level(false), LevelFilter::INFO);
        assert_eq!(console_level(true), LevelFilter::DEBUG);
    }
}
