//! Capture lifecycle
//!
//! [`LifecycleController`] owns the capture resources and tears them down in
//! a fixed order exactly once, whether shutdown is requested explicitly or
//! the controller is dropped on an error path.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::{CaptureError, CoreError, Result};
use crate::pipeline::{PipelineState, PipelineStatus};
use crate::shutdown::{ShutdownReason, ShutdownTrigger, ShutdownWait};

/// Capture resources as seen by the controller
pub trait CaptureHandle {
    /// Begin delivering frames
    fn start(&mut self) -> std::result::Result<(), CaptureError>;
    /// Stop delivering frames
    fn stop(&mut self) -> std::result::Result<(), CaptureError>;
    /// Close the stream
    fn close(&mut self);
    /// Release the audio backend
    fn release(&mut self);
}

/// Drives a capture handle through `Idle -> Capturing -> Stopping -> Stopped`
pub struct LifecycleController<H: CaptureHandle> {
    handle: H,
    status: Arc<PipelineStatus>,
}

impl<H: CaptureHandle> LifecycleController<H> {
    /// `status` must be the one shared with the pipeline feeding on `handle`
    pub fn new(handle: H, status: Arc<PipelineStatus>) -> Self {
        Self { handle, status }
    }

    pub fn state(&self) -> PipelineState {
        self.status.state()
    }

    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Mark the pipeline as capturing, then start the stream.
    ///
    /// If the stream fails to start, the controller shuts down before
    /// returning the error.
    pub fn start(&mut self) -> Result<()> {
        if !self.status.begin_capture() {
            return Err(CoreError::InvalidState(self.status.state()));
        }

        if let Err(e) = self.handle.start() {
            self.shutdown();
            return Err(e.into());
        }
        info!("Capture started");
        Ok(())
    }

    /// Stop, close and release, in that order. Idempotent.
    ///
    /// Returns true if this call performed the teardown.
    pub fn shutdown(&mut self) -> bool {
        if !self.status.begin_stop() {
            return false;
        }

        if let Err(e) = self.handle.stop() {
            // Closing still releases the stream
            warn!("{}", e);
        }
        self.handle.close();
        self.handle.release();
        self.status.mark_stopped();
        info!("Capture stopped");
        true
    }

    /// Block until ctrl-c or `trigger`, then shut down
    pub fn run_until_shutdown(
        &mut self,
        wait: ShutdownWait,
        trigger: &ShutdownTrigger,
    ) -> Result<ShutdownReason> {
        let outcome = wait.wait(trigger);
        if let Err(e) = &outcome {
            error!("{}", e);
        }
        self.shutdown();
        outcome
    }
}

impl<H: CaptureHandle> Drop for LifecycleController<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<H: CaptureHandle> std::fmt::Debug for LifecycleController<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleController")
            .field("state", &self.status.state())
            .finish_non_exhaustive()
    }
}

/// Open the configured input device with `pipeline` as frame handler and
/// start capturing.
#[cfg(feature = "audio")]
pub fn start_capture(
    config: &crate::config::BeatConfig,
    pipeline: crate::pipeline::BeatPipeline,
) -> Result<LifecycleController<crate::audio::AudioFrameSource>> {
    let status = pipeline.status().clone();
    let source =
        crate::audio::AudioFrameSource::open(config.device, config.buffer_size, pipeline.into_callback())?;

    let mut controller = LifecycleController::new(source, status);
    controller.start()?;
    Ok(controller)
}
