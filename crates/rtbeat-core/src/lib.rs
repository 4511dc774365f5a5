//! rtbeat Core - capture, tempo estimation and pipeline lifecycle
//!
//! This crate turns live audio into tempo changes:
//! - Audio capture in fixed-size mono frames
//! - Onset-based tempo estimation
//! - Debouncing of the rounded BPM
//! - Pipeline state shared with the capture thread
//! - Ordered, idempotent teardown and the shutdown wait

pub mod audio;
pub mod config;
pub mod debounce;
pub mod error;
pub mod lifecycle;
pub mod logging;
pub mod pipeline;
pub mod shutdown;
pub mod tempo;

// --- Re-exports grouped by category ---

// Audio
pub use audio::{AudioFrame, CaptureFlow, FrameAssembler, InputDeviceInfo};
#[cfg(feature = "audio")]
pub use audio::{list_input_devices, AudioFrameSource};

// Tempo
pub use debounce::BeatDebouncer;
pub use tempo::{db_spl, BeatEvent, OnsetTempoEstimator, TempoEstimator, TempoEstimatorConfig};

// Pipeline & Lifecycle
#[cfg(feature = "audio")]
pub use lifecycle::start_capture;
pub use lifecycle::{CaptureHandle, LifecycleController};
pub use pipeline::{BeatPipeline, BeatPrinter, PipelineState, PipelineStats, PipelineStatus};
pub use shutdown::{ShutdownReason, ShutdownTrigger, ShutdownWait};

// Configuration & Errors
pub use config::{BeatConfig, DEFAULT_BUFFER_SIZE, DEFAULT_HTTP_TIMEOUT_MS, SAMPLE_RATE};
pub use error::{CaptureError, CoreError, Result, TempoError};
pub use logging::LogConfig;
