//! Global tracing subscriber for the rtbeat binary
//!
//! Log lines go to stderr and optionally to a per-session file. stdout is
//! left to the device list and the verbose beat lines.

use anyhow::{Context, Result};
use rtbeat_core::LogConfig;
use std::fs::File;
use std::path::PathBuf;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the session file writer alive; drop it last
pub struct LogGuard {
    _guard: WorkerGuard,
}

/// Non-blocking writer for this session's log file
struct SessionFile {
    path: PathBuf,
    writer: NonBlocking,
    guard: WorkerGuard,
}

fn open_session_file(config: &LogConfig) -> Result<SessionFile> {
    let path = config.current_log_path();
    let file = File::create(&path)
        .with_context(|| format!("Failed to create log file: {:?}", path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok(SessionFile {
        path,
        writer,
        guard,
    })
}

/// Install the global subscriber.
///
/// Returns a guard only when file output is enabled.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    // 1. Session directory
    config
        .ensure_log_directory()
        .context("Failed to create log directory")?;

    // 2. Old sessions, reported once the subscriber is up
    let removed = config.cleanup_old_logs();

    // 3. Level from --log-level, RUST_LOG wins
    let filter = EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy();

    // 4. stderr
    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(filter.clone())
    });

    // 5. Session file, no colors
    let session = if config.file_output {
        Some(open_session_file(config)?)
    } else {
        None
    };
    let mut log_path = None;
    let mut guard = None;
    let file_layer = session.map(|session| {
        log_path = Some(session.path);
        guard = Some(LogGuard {
            _guard: session.guard,
        });
        fmt::layer()
            .with_writer(session.writer)
            .with_ansi(false)
            .with_filter(filter)
    });

    // 6. Install
    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install log subscriber")?;

    tracing::debug!("Logging initialized at level: {}", config.level);
    if let Some(path) = log_path {
        tracing::info!("Logging to {:?}", path);
    }
    match removed {
        Ok(0) => {}
        Ok(n) => tracing::debug!("Removed {} old session log(s)", n),
        Err(e) => tracing::warn!("Failed to clean up old log files: {}", e),
    }

    Ok(guard)
}
