//! BPM change filter
//!
//! Estimators report a tempo on every beat, usually the same one. Only a
//! change of the rounded value is worth sending to the targets.

use tracing::trace;

/// Remembers the last dispatched integer BPM
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BeatDebouncer {
    /// 0 until the first dispatch
    last_dispatched: i64,
}

impl BeatDebouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Round `raw_bpm` half away from zero and return it if it differs from
    /// the last dispatched value, recording it as dispatched.
    ///
    /// Non-finite input returns `None` and leaves the state untouched. Since
    /// the initial value is 0, a tempo that rounds to 0 is never dispatched.
    pub fn should_dispatch(&mut self, raw_bpm: f32) -> Option<i64> {
        if !raw_bpm.is_finite() {
            return None;
        }

        let rounded = raw_bpm.round() as i64;
        if rounded == self.last_dispatched {
            return None;
        }

        trace!("BPM changed: {} -> {}", self.last_dispatched, rounded);
        self.last_dispatched = rounded;
        Some(rounded)
    }

    /// Last dispatched BPM, `None` before the first dispatch
    pub fn last_dispatched(&self) -> Option<i64> {
        (self.last_dispatched != 0).then_some(self.last_dispatched)
    }
}
