//! Pipeline configuration
//!
//! Built once from the command line and handed to the pipeline by value. The
//! capture callback only ever sees this struct, never parsed arguments.

use crate::error::{CoreError, Result};
use rtbeat_control::{BodyEncoding, DispatchTarget, SinkOptions};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Capture sample rate in Hz
pub const SAMPLE_RATE: u32 = 44100;
/// Default capture buffer size in samples
pub const DEFAULT_BUFFER_SIZE: usize = 512;
/// Default HTTP request timeout in milliseconds
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 2000;

/// Immutable configuration of one beat pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatConfig {
    /// Samples per frame
    pub buffer_size: usize,
    /// Input device index, `None` for the system default
    pub device: Option<usize>,
    /// Print a progress line on every detected beat
    pub verbose: bool,
    /// Where tempo changes are sent
    pub targets: Vec<DispatchTarget>,
    /// HTTP request timeout in milliseconds
    pub http_timeout_ms: u64,
    /// HTTP body encoding
    pub body_encoding: BodyEncoding,
}

impl Default for BeatConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            device: None,
            verbose: false,
            targets: Vec::new(),
            http_timeout_ms: DEFAULT_HTTP_TIMEOUT_MS,
            body_encoding: BodyEncoding::default(),
        }
    }
}

impl BeatConfig {
    /// Analysis window of the tempo estimator
    pub fn window_size(&self) -> usize {
        self.buffer_size * 2
    }

    pub fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    /// Options for building dispatch sinks
    pub fn sink_options(&self) -> SinkOptions {
        SinkOptions {
            http_timeout: Duration::from_millis(self.http_timeout_ms),
            body_encoding: self.body_encoding,
        }
    }

    /// Check the configuration before any device or socket is opened
    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(CoreError::InvalidConfig(
                "Buffer size must be greater than zero".to_string(),
            ));
        }
        if self.http_timeout_ms == 0 {
            return Err(CoreError::InvalidConfig(
                "HTTP timeout must be greater than zero".to_string(),
            ));
        }
        if self.targets.is_empty() {
            return Err(CoreError::InvalidConfig(
                "At least one dispatch target is required".to_string(),
            ));
        }
        for target in &self.targets {
            target.validate().map_err(CoreError::InvalidConfig)?;
        }
        Ok(())
    }
}
