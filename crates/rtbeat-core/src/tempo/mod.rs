//! Tempo estimation
//!
//! The pipeline treats tempo estimation as a black box behind
//! [`TempoEstimator`]. [`OnsetTempoEstimator`] is the stock implementation.

pub mod analyzer;
pub mod loudness;

pub use analyzer::{OnsetTempoEstimator, TempoEstimatorConfig};
pub use loudness::db_spl;

use crate::error::TempoError;

/// Result of analysing one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BeatEvent {
    /// A beat falls inside this frame
    pub occurred: bool,
    /// Current tempo estimate, only meaningful when `occurred`
    pub bpm: f32,
    /// Frame loudness in dB SPL, only meaningful when `occurred`
    pub loudness_db: f32,
}

impl BeatEvent {
    /// A frame without a beat
    pub fn none() -> Self {
        Self {
            occurred: false,
            bpm: 0.0,
            loudness_db: 0.0,
        }
    }

    /// A frame with a beat
    pub fn beat(bpm: f32, loudness_db: f32) -> Self {
        Self {
            occurred: true,
            bpm,
            loudness_db,
        }
    }
}

/// Stateful beat/tempo detector fed one frame at a time
pub trait TempoEstimator: Send {
    /// Analyse the next frame. Frames must have exactly the configured hop size.
    fn process(&mut self, frame: &[f32]) -> Result<BeatEvent, TempoError>;

    /// Loudness of a frame in dB, independent of beat detection
    fn loudness(&self, frame: &[f32]) -> f32 {
        db_spl(frame)
    }
}

impl<T: TempoEstimator + ?Sized> TempoEstimator for Box<T> {
    fn process(&mut self, frame: &[f32]) -> Result<BeatEvent, TempoError> {
        (**self).process(frame)
    }

    fn loudness(&self, frame: &[f32]) -> f32 {
        (**self).loudness(frame)
    }
}
