//! Audio capture
//!
//! - [`frame`] - fixed-size frame assembly
//! - `source` - cpal input stream and device listing (requires `audio` feature)

pub mod frame;
#[cfg(feature = "audio")]
pub mod source;

pub use frame::FrameAssembler;
#[cfg(feature = "audio")]
pub use source::{list_input_devices, AudioFrameSource};

/// One buffer of mono f32 samples, borrowed for the duration of a callback
#[derive(Debug, Clone, Copy)]
pub struct AudioFrame<'a> {
    /// Zero-based position of this frame in the capture
    pub index: u64,
    pub samples: &'a [f32],
}

impl<'a> AudioFrame<'a> {
    pub fn new(index: u64, samples: &'a [f32]) -> Self {
        Self { index, samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Returned by a frame callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFlow {
    /// Keep delivering frames
    Continue,
    /// Deliver no further frames
    Complete,
}

/// An input-capable device as shown by `list`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
}

impl std::fmt::Display for InputDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.index, self.name)
    }
}
