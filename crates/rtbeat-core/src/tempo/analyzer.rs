//! Onset-based tempo estimator
//!
//! Sliding-window FFT analysis with one FFT per frame:
//! 1. the new frame is appended to a window of `2 * hop` samples,
//! 2. the Hann-windowed magnitude spectrum is compared with the previous one
//!    (spectral flux, log-compressed),
//! 3. a beat is reported when the flux rises above an adaptive threshold and
//!    the refractory period has passed,
//! 4. BPM comes from the trimmed mean of recent inter-beat intervals.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, trace};

use super::{BeatEvent, TempoEstimator};
use crate::error::TempoError;

/// Flux values kept for the adaptive threshold
const FLUX_HISTORY_LEN: usize = 32;
/// Flux values needed before any beat is reported
const MIN_FLUX_HISTORY: usize = 4;
/// Beat timestamps kept for the tempo estimate
const BEAT_HISTORY_LEN: usize = 16;
/// Beats needed before a tempo is reported
const MIN_BEATS_FOR_TEMPO: usize = 4;

/// Configuration for [`OnsetTempoEstimator`]
#[derive(Debug, Clone, PartialEq)]
pub struct TempoEstimatorConfig {
    /// Sample rate of the incoming frames
    pub sample_rate: u32,
    /// Analysis window (FFT size)
    pub window_size: usize,
    /// Samples per frame
    pub hop_size: usize,
    /// Threshold is `mean(history) * sensitivity + flux_floor`
    pub sensitivity: f32,
    pub flux_floor: f32,
    /// Refractory period in seconds (0.2 s = 300 BPM max)
    pub min_beat_interval: f64,
}

impl TempoEstimatorConfig {
    /// Window of twice the buffer size, hop of one buffer
    pub fn for_buffer(buffer_size: usize, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            window_size: buffer_size * 2,
            hop_size: buffer_size,
            ..Default::default()
        }
    }
}

impl Default for TempoEstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            window_size: 1024,
            hop_size: 512,
            sensitivity: 1.5,
            flux_floor: 0.05,
            min_beat_interval: 0.2,
        }
    }
}

/// Default [`TempoEstimator`]
pub struct OnsetTempoEstimator {
    /// FFT instance
    fft: Arc<dyn Fft<f32>>,

    config: TempoEstimatorConfig,

    /// Sliding analysis window, oldest sample first
    input_buffer: Vec<f32>,

    /// FFT complex buffer
    fft_buffer: Vec<Complex<f32>>,

    /// FFT scratch buffer
    scratch_buffer: Vec<Complex<f32>>,

    /// Hann window coefficients
    window: Vec<f32>,

    /// Log-compressed magnitudes of the previous frame
    previous_magnitudes: Vec<f32>,

    /// Recent flux values (threshold baseline)
    flux_history: VecDeque<f32>,

    /// Frames analysed so far
    frames_processed: u64,

    /// Timestamps of detected beats in seconds
    beat_timestamps: VecDeque<f64>,

    /// Current estimated BPM
    estimated_bpm: Option<f32>,
}

impl OnsetTempoEstimator {
    pub fn new(config: TempoEstimatorConfig) -> Self {
        let fft_size = config.window_size.max(config.hop_size).max(2);

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        // Pre-compute Hann window
        let window: Vec<f32> = (0..fft_size)
            .map(|i| {
                let t = i as f32 / (fft_size - 1) as f32;
                0.5 * (1.0 - (2.0 * std::f32::consts::PI * t).cos())
            })
            .collect();

        debug!(
            "OnsetTempoEstimator created: sample_rate={}, window={}, hop={}",
            config.sample_rate, fft_size, config.hop_size
        );

        Self {
            fft,
            input_buffer: vec![0.0; fft_size],
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            window,
            previous_magnitudes: vec![0.0; fft_size / 2],
            flux_history: VecDeque::with_capacity(FLUX_HISTORY_LEN),
            frames_processed: 0,
            beat_timestamps: VecDeque::with_capacity(BEAT_HISTORY_LEN),
            estimated_bpm: None,
            config,
        }
    }

    /// Estimator for `buffer_size` frames at `sample_rate`
    pub fn for_buffer(buffer_size: usize, sample_rate: u32) -> Self {
        Self::new(TempoEstimatorConfig::for_buffer(buffer_size, sample_rate))
    }

    pub fn config(&self) -> &TempoEstimatorConfig {
        &self.config
    }

    /// Current tempo estimate
    pub fn bpm(&self) -> Option<f32> {
        self.estimated_bpm
    }

    /// Reset all analysis state
    pub fn reset(&mut self) {
        self.input_buffer.fill(0.0);
        self.previous_magnitudes.fill(0.0);
        self.flux_history.clear();
        self.frames_processed = 0;
        self.beat_timestamps.clear();
        self.estimated_bpm = None;

        debug!("OnsetTempoEstimator reset");
    }

    /// Slide the window by one hop and append the frame
    fn push_frame(&mut self, frame: &[f32]) {
        let hop = frame.len();
        let len = self.input_buffer.len();
        if hop >= len {
            for (dst, &src) in self.input_buffer.iter_mut().zip(&frame[hop - len..]) {
                *dst = if src.is_finite() { src } else { 0.0 };
            }
            return;
        }

        self.input_buffer.copy_within(hop.., 0);
        for (dst, &src) in self.input_buffer[len - hop..].iter_mut().zip(frame) {
            // Sanitize: NaN/Inf would poison every later spectrum
            *dst = if src.is_finite() { src } else { 0.0 };
        }
    }

    /// Positive spectral flux between this window and the previous one
    fn spectral_flux(&mut self) -> f32 {
        for (i, slot) in self.fft_buffer.iter_mut().enumerate() {
            *slot = Complex::new(self.input_buffer[i] * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch_buffer);

        let norm_factor = 1.0 / (self.fft_buffer.len() as f32).sqrt();
        let mut flux = 0.0;
        for (i, previous) in self.previous_magnitudes.iter_mut().enumerate() {
            let magnitude = (1.0 + 10.0 * self.fft_buffer[i].norm() * norm_factor).ln();
            let rise = magnitude - *previous;
            if rise > 0.0 {
                flux += rise;
            }
            *previous = magnitude;
        }
        flux
    }

    /// Threshold check against the recent flux history
    fn detect_beat(&mut self, flux: f32, timestamp: f64) -> bool {
        let ready = self.flux_history.len() >= MIN_FLUX_HISTORY;
        let average = if self.flux_history.is_empty() {
            0.0
        } else {
            self.flux_history.iter().sum::<f32>() / self.flux_history.len() as f32
        };

        self.flux_history.push_back(flux);
        if self.flux_history.len() > FLUX_HISTORY_LEN {
            self.flux_history.pop_front();
        }

        if !ready {
            return false;
        }

        let cooled_down = self
            .beat_timestamps
            .back()
            .map(|last| timestamp - last >= self.config.min_beat_interval)
            .unwrap_or(true);

        let threshold = average * self.config.sensitivity + self.config.flux_floor;
        let is_beat = flux > threshold && cooled_down;

        if is_beat {
            self.beat_timestamps.push_back(timestamp);
            if self.beat_timestamps.len() > BEAT_HISTORY_LEN {
                self.beat_timestamps.pop_front();
            }
            self.estimated_bpm = self.calculate_bpm().or(self.estimated_bpm);
            trace!(
                "Onset at {:.3}s: flux={:.3} avg={:.3} bpm={:?}",
                timestamp,
                flux,
                average,
                self.estimated_bpm
            );
        }

        is_beat
    }

    /// Calculate BPM from recent beat timestamps
    fn calculate_bpm(&self) -> Option<f32> {
        if self.beat_timestamps.len() < MIN_BEATS_FOR_TEMPO {
            return None;
        }

        let mut intervals: Vec<f64> = self
            .beat_timestamps
            .iter()
            .zip(self.beat_timestamps.iter().skip(1))
            .map(|(a, b)| b - a)
            .collect();

        intervals.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        // Drop the outer quartiles once there are enough intervals
        let valid_intervals = if intervals.len() >= 4 {
            let start = intervals.len() / 4;
            let end = intervals.len() - start;
            &intervals[start..end]
        } else {
            &intervals[..]
        };

        if valid_intervals.is_empty() {
            return None;
        }

        let avg_interval: f64 = valid_intervals.iter().sum::<f64>() / valid_intervals.len() as f64;
        if avg_interval <= 0.001 {
            return None;
        }

        let bpm = (60.0 / avg_interval) as f32;

        // Fold into 60-200 BPM
        let bpm = if (60.0..=200.0).contains(&bpm) {
            bpm
        } else if (200.0..=400.0).contains(&bpm) {
            bpm / 2.0
        } else if (30.0..60.0).contains(&bpm) {
            bpm * 2.0
        } else {
            return None;
        };

        // One decimal is plenty for display and rounding downstream
        Some((bpm * 10.0).round() / 10.0)
    }
}

impl TempoEstimator for OnsetTempoEstimator {
    fn process(&mut self, frame: &[f32]) -> Result<BeatEvent, TempoError> {
        if frame.len() != self.config.hop_size {
            return Err(TempoError::Precision {
                expected: self.config.hop_size,
                actual: frame.len(),
            });
        }

        self.push_frame(frame);
        self.frames_processed += 1;
        let timestamp = (self.frames_processed * self.config.hop_size as u64) as f64
            / self.config.sample_rate as f64;

        let flux = self.spectral_flux();
        if self.detect_beat(flux, timestamp) {
            Ok(BeatEvent::beat(
                self.estimated_bpm.unwrap_or(0.0),
                self.loudness(frame),
            ))
        } else {
            Ok(BeatEvent::none())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 44100.0;

    /// Click track: a short 60 Hz burst every beat
    fn click_track(bpm: f32, seconds: f32) -> Vec<f32> {
        let beat_interval = (SAMPLE_RATE * 60.0 / bpm) as usize;
        let kick_duration = 2000;
        (0..(SAMPLE_RATE * seconds) as usize)
            .map(|i| {
                let position = i % beat_interval;
                if position < kick_duration {
                    (2.0 * std::f32::consts::PI * 60.0 * position as f32 / SAMPLE_RATE).sin()
                } else {
                    0.0
                }
            })
            .collect()
    }

    #[test]
    fn test_config_for_buffer() {
        let config = TempoEstimatorConfig::for_buffer(512, 44100);
        assert_eq!(config.window_size, 1024);
        assert_eq!(config.hop_size, 512);
    }

    #[test]
    fn test_wrong_frame_size_is_precision_error() {
        let mut estimator = OnsetTempoEstimator::for_buffer(512, 44100);
        let err = estimator.process(&[0.0; 256]).unwrap_err();
        assert_eq!(
            err,
            TempoError::Precision {
                expected: 512,
                actual: 256
            }
        );
    }

    #[test]
    fn test_silence_has_no_beats() {
        let mut estimator = OnsetTempoEstimator::for_buffer(512, 44100);
        let silence = vec![0.0f32; 512];
        for _ in 0..200 {
            let event = estimator.process(&silence).unwrap();
            assert!(!event.occurred);
        }
        assert_eq!(estimator.bpm(), None);
    }

    #[test]
    fn test_click_after_silence_is_a_beat() {
        let mut estimator = OnsetTempoEstimator::for_buffer(512, 44100);
        let silence = vec![0.0f32; 512];
        for _ in 0..20 {
            assert!(!estimator.process(&silence).unwrap().occurred);
        }

        let kick: Vec<f32> = (0..512)
            .map(|i| (2.0 * std::f32::consts::PI * 60.0 * i as f32 / SAMPLE_RATE).sin())
            .collect();
        let event = estimator.process(&kick).unwrap();
        assert!(event.occurred);
        // No tempo yet after a single beat
        assert_eq!(event.bpm, 0.0);
        assert!(event.loudness_db > -10.0 && event.loudness_db < 0.0);
    }

    #[test]
    fn test_tempo_of_click_track() {
        let mut estimator = OnsetTempoEstimator::for_buffer(512, 44100);
        let track = click_track(120.0, 12.0);

        let mut beats = 0;
        let mut last_bpm = 0.0;
        for frame in track.chunks_exact(512) {
            let event = estimator.process(frame).unwrap();
            if event.occurred {
                beats += 1;
                last_bpm = event.bpm;
            }
        }

        // 24 kicks in 12 s; the very first has no flux history yet
        assert!((20..=24).contains(&beats), "detected {} beats", beats);
        assert!(
            (last_bpm - 120.0).abs() < 3.0,
            "expected ~120 BPM, got {}",
            last_bpm
        );
    }

    #[test]
    fn test_refractory_period_limits_rate() {
        let mut estimator = OnsetTempoEstimator::for_buffer(512, 44100);
        // Alternating loud/silent frames would be ~43 onsets per second
        let loud = vec![0.8f32; 512];
        let silent = vec![0.0f32; 512];
        let mut beats = 0;
        for i in 0..430 {
            let frame = if i % 2 == 0 { &loud } else { &silent };
            if estimator.process(frame).unwrap().occurred {
                beats += 1;
            }
        }
        // 5 s of audio, at most 5 beats per second
        assert!(beats <= 26, "detected {} beats", beats);
    }

    #[test]
    fn test_resilience_to_bad_input() {
        let mut estimator = OnsetTempoEstimator::for_buffer(4, 44100);
        let bad = [f32::NAN, f32::INFINITY, f32::NEG_INFINITY, 0.0];
        for _ in 0..10 {
            let event = estimator.process(&bad).unwrap();
            assert!(!event.occurred);
        }
        assert!(estimator.input_buffer.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_reset() {
        let mut estimator = OnsetTempoEstimator::for_buffer(512, 44100);
        for frame in click_track(120.0, 6.0).chunks_exact(512) {
            estimator.process(frame).unwrap();
        }
        assert!(estimator.bpm().is_some());

        estimator.reset();
        assert_eq!(estimator.bpm(), None);
        assert_eq!(estimator.frames_processed, 0);
    }
}
