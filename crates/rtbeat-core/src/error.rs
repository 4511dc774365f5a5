//! Error types for capture, tempo estimation and lifecycle

use thiserror::Error;

use crate::pipeline::PipelineState;

/// Audio capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Requested device or stream parameters are unavailable
    #[error("Audio device error: {0}")]
    Device(String),

    /// Stream could not be stopped cleanly
    #[error("Audio stream error: {0}")]
    Stream(String),
}

/// Tempo estimator errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TempoError {
    /// Frame length does not match the configured hop size.
    ///
    /// This is a contract violation inside the pipeline, not a runtime condition.
    #[error("Frame has {actual} samples, estimator expects exactly {expected}")]
    Precision { expected: usize, actual: usize },
}

/// Core errors
#[derive(Error, Debug)]
pub enum CoreError {
    /// Capture failed
    #[error(transparent)]
    Capture(#[from] CaptureError),

    /// Dispatch setup failed
    #[error(transparent)]
    Dispatch(#[from] rtbeat_control::DispatchError),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Lifecycle operation called in the wrong pipeline state
    #[error("Operation not allowed in pipeline state {0:?}")]
    InvalidState(PipelineState),

    /// Waiting for the shutdown signal failed
    #[error("Shutdown wait failed: {0}")]
    Shutdown(String),

    /// I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
