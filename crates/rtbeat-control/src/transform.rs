//! Per-target value transforms
//!
//! Every dispatch target maps the debounced BPM through one of these modes
//! before sending. The mapping is pure and stateless.

use crate::error::InvalidValueError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// BPM at which the GMA3 mapping reaches 100 percent
pub const GMA3_FULL_SCALE_BPM: f32 = 240.0;

/// How a raw BPM is turned into the value a target receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransformMode {
    /// Identity
    #[default]
    Plain,
    /// Half tempo
    Half,
    /// Speed-master fader percentage: `100 * sqrt(bpm / 240)`
    Gma3,
}

impl TransformMode {
    /// All modes, in CLI order
    pub const ALL: [TransformMode; 3] = [TransformMode::Plain, TransformMode::Half, TransformMode::Gma3];

    /// Map a BPM value to the output for this mode.
    ///
    /// GMA3 rejects non-positive input instead of producing NaN.
    pub fn apply(self, bpm: f32) -> Result<f32, InvalidValueError> {
        if !bpm.is_finite() {
            return Err(InvalidValueError { mode: self, bpm });
        }

        match self {
            TransformMode::Plain => Ok(bpm),
            TransformMode::Half => Ok(bpm / 2.0),
            TransformMode::Gma3 => {
                if bpm <= 0.0 {
                    return Err(InvalidValueError { mode: self, bpm });
                }
                Ok(100.0 * (bpm / GMA3_FULL_SCALE_BPM).sqrt())
            }
        }
    }

    /// Upper-case name as accepted on the command line
    pub fn as_str(self) -> &'static str {
        match self {
            TransformMode::Plain => "PLAIN",
            TransformMode::Half => "HALF",
            TransformMode::Gma3 => "GMA3",
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransformMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransformMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown mode '{}', expected one of PLAIN, HALF, GMA3", s))
    }
}
