//! Frame loudness

/// Reported for silent or empty frames
pub const SILENCE_DB: f32 = -120.0;

/// Sound-pressure level of a frame in dB: `10 * log10(mean(x^2))`.
///
/// Full-scale DC reads 0 dB, silence is clamped to [`SILENCE_DB`]. Non-finite
/// samples count as silence.
pub fn db_spl(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return SILENCE_DB;
    }

    let energy: f32 = frame
        .iter()
        .map(|&s| if s.is_finite() { s * s } else { 0.0 })
        .sum();
    let mean = energy / frame.len() as f32;

    (10.0 * mean.log10()).max(SILENCE_DB)
}
