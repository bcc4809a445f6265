use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::EnvFilter;

pub const TRACKER_PREFIX: &str = "tracker";

/// Builds the filter for this crate's events. An explicit level wins over `RUST_LOG`.
fn crate_filter(log_level: Option<LevelFilter>, default_level: &str) -> EnvFilter {
    let level = log_level
        .map(|v| v.to_string())
        .unwrap_or_else(|| std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.into()));
    EnvFilter::new(format!(
        "{}={level}",
        env!("CARGO_PKG_NAME").replace("-", "_"),
    ))
}

/// Sets up logging into daily rotated files inside `application_state_path/logs`.
///
/// Used by the tracker, which owns the terminal, so nothing is written to stdout or stderr.
pub fn enable_file_logging(
    prefix: &str,
    application_state_path: &Path,
    log_level: Option<LevelFilter>,
) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(5)
        .filename_prefix(prefix)
        .build(application_state_path.join("logs"))?;

    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(log_level, "info"))
        .with_ansi(false)
        .with_writer(appender)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;
    Ok(())
}

/// Sets up logging to stderr only. Used by `init`, `install` and `uninstall`, which must not
/// touch anything outside the paths they were given.
pub fn enable_console_logging(log_level: Option<LevelFilter>) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(crate_filter(log_level, "warn"))
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install logger: {e}"))?;
    Ok(())
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});
