//! Tracing subscriber setup.
//!
//! Logs always go to stdout. With `global.log_path` set, two rolling files
//! are written as well: `sqlgauge.<date>.log` with everything that passes
//! the filter, and `sqlgauge.<date>.err` with ERROR events only.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::error::StartupError;

/// Prefix of every log file.
pub const LOG_FILE_PREFIX: &str = "sqlgauge";

/// Rotated files kept per log kind.
const MAX_LOG_FILES: usize = 5;

/// Flushes the file writers when dropped; hold it for the process lifetime.
pub struct LogGuards {
    _guards: Vec<WorkerGuard>,
}

/// Filter directives for the exporter's own crates at `level`.
pub fn default_directives(level: &str) -> String {
    format!("sqlgauge={level},sqlgauge_exporter={level},sqlgauge_core={level},tower_http=info")
}

fn filter(directives: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| directives.into())
}

/// Daily-rotated appender in `dir`, creating the directory if needed.
pub fn file_appender(dir: &Path, suffix: &str) -> Result<RollingFileAppender, StartupError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| StartupError::Logging(format!("cannot create {}: {}", dir.display(), e)))?;

    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix(suffix)
        .max_log_files(MAX_LOG_FILES)
        .build(dir)
        .map_err(|e| StartupError::Logging(e.to_string()))
}

/// Install the global subscriber. `RUST_LOG` overrides `level`.
pub fn init(level: &str, log_path: Option<&Path>) -> Result<LogGuards, StartupError> {
    let directives = default_directives(level);
    let mut guards = Vec::new();

    let (main_file, error_file) = match log_path {
        Some(dir) => {
            let (main_writer, guard) = tracing_appender::non_blocking(file_appender(dir, "log")?);
            guards.push(guard);
            let (error_writer, guard) = tracing_appender::non_blocking(file_appender(dir, "err")?);
            guards.push(guard);
            (
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(main_writer)
                        .with_filter(filter(&directives)),
                ),
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_writer(error_writer)
                        .with_filter(LevelFilter::ERROR),
                ),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_filter(filter(&directives)))
        .with(main_file)
        .with(error_file)
        .try_init()
        .map_err(|e| StartupError::Logging(e.to_string()))?;

    Ok(LogGuards { _guards: guards })
}
