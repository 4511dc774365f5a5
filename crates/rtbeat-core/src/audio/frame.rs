//! Fixed-size frame assembly
//!
//! Audio hosts do not always honour the requested buffer size, but the tempo
//! estimator requires frames of exactly that size. The assembler re-blocks
//! whatever chunks the host delivers and calls back once per full frame.

use super::{AudioFrame, CaptureFlow};

/// Re-blocks incoming chunks into frames of `frame_size` samples
#[derive(Debug)]
pub struct FrameAssembler {
    frame_size: usize,
    pending: Vec<f32>,
    next_index: u64,
    complete: bool,
}

impl FrameAssembler {
    /// `frame_size` must be non-zero
    pub fn new(frame_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        Self {
            frame_size,
            pending: Vec::with_capacity(frame_size),
            next_index: 0,
            complete: false,
        }
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Frames delivered so far
    pub fn frames_delivered(&self) -> u64 {
        self.next_index
    }

    /// Samples waiting for the next full frame
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// True once a callback returned [`CaptureFlow::Complete`]
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Feed a chunk of samples, invoking `on_frame` for every completed frame.
    ///
    /// Once `on_frame` returns `Complete`, remaining samples are dropped and
    /// every later call returns `Complete` without invoking the callback.
    pub fn push<F>(&mut self, mut samples: &[f32], mut on_frame: F) -> CaptureFlow
    where
        F: FnMut(AudioFrame<'_>) -> CaptureFlow,
    {
        if self.complete {
            return CaptureFlow::Complete;
        }

        while !samples.is_empty() {
            // Whole frames straight from the host buffer, no copy
            if self.pending.is_empty() && samples.len() >= self.frame_size {
                let (frame, rest) = samples.split_at(self.frame_size);
                samples = rest;
                let flow = on_frame(AudioFrame::new(self.next_index, frame));
                self.next_index += 1;
                if flow == CaptureFlow::Complete {
                    self.complete = true;
                    return flow;
                }
                continue;
            }

            let take = (self.frame_size - self.pending.len()).min(samples.len());
            self.pending.extend_from_slice(&samples[..take]);
            samples = &samples[take..];

            if self.pending.len() == self.frame_size {
                let flow = on_frame(AudioFrame::new(self.next_index, &self.pending));
                self.next_index += 1;
                self.pending.clear();
                if flow == CaptureFlow::Complete {
                    self.complete = true;
                    return flow;
                }
            }
        }

        CaptureFlow::Continue
    }
}
