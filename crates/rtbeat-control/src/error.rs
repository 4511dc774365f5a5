//! Error types for the dispatch side
use crate::transform::TransformMode;
use thiserror::Error;

/// A transform produced a value that must not be transmitted
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{mode} transform is undefined for {bpm} BPM")]
pub struct InvalidValueError {
    /// Mode that rejected the value
    pub mode: TransformMode,
    /// Raw BPM handed to the transform
    pub bpm: f32,
}

/// Dispatch errors
#[derive(Error, Debug)]
pub enum DispatchError {
    /// HTTP 401, still unauthorized after the single retry
    #[error("HTTP 401: API key was not accepted")]
    Unauthorized,

    /// Any other non-204 response
    #[error("Could not set BPM: [HTTP {0}]")]
    Rejected(u16),

    /// Connection, timeout or encoding failure before a status was received
    #[error("Transport error: {0}")]
    Transport(String),

    /// Transform output was undefined, target skipped
    #[error("Invalid value: {0}")]
    InvalidValue(#[from] InvalidValueError),

    /// Target configuration could not be turned into a sink
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// I/O error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;
