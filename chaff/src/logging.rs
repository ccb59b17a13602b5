//! Logging infrastructure.
//!
//! Diagnostics go to stderr, never stdout: the host binary speaks its framed
//! protocol on stdout and a stray log line there would corrupt a frame. An
//! optional rolling file layer is added when a log directory is configured.
//! Verbosity follows the RUST_LOG environment variable, defaulting to INFO.

use std::fs;
use std::io;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Base name for the rolling daily log file.
pub fn default_log_file() -> &'static str {
    "chaff.log"
}

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard flushes and closes the log file writer.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize the global subscriber.
///
/// # Errors
///
/// Returns an error if the log directory cannot be created.
pub fn init_logging(log_dir: Option<&Path>) -> Result<LoggingGuard, io::Error> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(false);

    let mut file_guard = None;
    let file_layer = if let Some(dir) = log_dir {
        fs::create_dir_all(dir)?;
        let appender = tracing_appender::rolling::daily(dir, default_log_file());
        let (writer, guard) = tracing_appender::non_blocking(appender);
        file_guard = Some(guard);
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}
