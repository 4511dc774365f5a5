//! Logging configuration
//!
//! The subscriber itself is installed by the binary; this type only carries
//! the settings and the log-file housekeeping.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::level_filters::LevelFilter;

/// Prefix of session log files
const LOG_FILE_PREFIX: &str = "rtbeat_";
/// Extension of session log files
const LOG_FILE_EXTENSION: &str = "log";

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Level name (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
    /// Write to stderr
    pub console_output: bool,
    /// Write to a session file in `log_directory`
    pub file_output: bool,
    pub log_directory: PathBuf,
    /// Session files kept after cleanup, including the current one
    pub max_log_files: usize,
    /// Timestamp that names this session's log file
    session: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            console_output: true,
            file_output: false,
            log_directory: PathBuf::from("logs"),
            max_log_files: 10,
            session: chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string(),
        }
    }
}

impl LogConfig {
    /// Console-only logging at `level`
    pub fn console(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// Add file output to `dir`
    pub fn with_file_output(mut self, dir: impl Into<PathBuf>) -> Self {
        self.file_output = true;
        self.log_directory = dir.into();
        self
    }

    /// Parsed level, `INFO` if the name is not recognised
    pub fn parse_level(&self) -> LevelFilter {
        self.level.parse().unwrap_or(LevelFilter::INFO)
    }

    /// Path of this session's log file
    pub fn current_log_path(&self) -> PathBuf {
        self.log_directory.join(format!(
            "{}{}.{}",
            LOG_FILE_PREFIX, self.session, LOG_FILE_EXTENSION
        ))
    }

    /// Create the log directory if file output is enabled
    pub fn ensure_log_directory(&self) -> io::Result<()> {
        if self.file_output {
            fs::create_dir_all(&self.log_directory)?;
        }
        Ok(())
    }

    /// Delete the oldest session logs so that at most `max_log_files - 1`
    /// remain before the current session starts writing.
    ///
    /// Returns the number of files removed.
    pub fn cleanup_old_logs(&self) -> io::Result<usize> {
        if !self.file_output || !self.log_directory.exists() {
            return Ok(0);
        }

        let mut logs: Vec<PathBuf> = fs::read_dir(&self.log_directory)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| is_session_log(path))
            .collect();

        // Session names embed a sortable timestamp
        logs.sort();

        let keep = self.max_log_files.saturating_sub(1);
        let excess = logs.len().saturating_sub(keep);
        let mut removed = 0;
        for path in logs.into_iter().take(excess) {
            fs::remove_file(&path)?;
            removed += 1;
        }
        Ok(removed)
    }
}

fn is_session_log(path: &Path) -> bool {
    let name_matches = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with(LOG_FILE_PREFIX))
        .unwrap_or(false);
    let ext_matches = path
        .extension()
        .map(|e| e == LOG_FILE_EXTENSION)
        .unwrap_or(false);
    name_matches && ext_matches
}
