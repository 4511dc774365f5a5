//! Beat pipeline
//!
//! Per frame: estimate, debounce, fan out. The pipeline is owned by the
//! capture callback; the only state it shares with the control thread is
//! [`PipelineStatus`].

use std::io::Write;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

use crate::audio::{AudioFrame, CaptureFlow};
use crate::config::BeatConfig;
use crate::debounce::BeatDebouncer;
use crate::error::Result;
use crate::tempo::{OnsetTempoEstimator, TempoEstimator};
use rtbeat_control::{DispatchReport, Dispatcher};

/// Spinner shown in verbose beat lines
const SPINNER: [char; 4] = ['¼', '▚', '▞', '▚'];

/// Pipeline lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Capturing = 1,
    Stopping = 2,
    Stopped = 3,
}

impl PipelineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Capturing,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// State shared between the capture callback and the control thread
#[derive(Debug)]
pub struct PipelineStatus {
    state: AtomicU8,
}

impl Default for PipelineStatus {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(PipelineState::Idle as u8),
        }
    }
}

impl PipelineStatus {
    /// New shared status in `Idle`
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Idle -> Capturing`. Returns false from any other state.
    pub fn begin_capture(&self) -> bool {
        self.state
            .compare_exchange(
                PipelineState::Idle as u8,
                PipelineState::Capturing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    /// `Idle | Capturing -> Stopping`. Returns false if already stopping or stopped.
    pub fn begin_stop(&self) -> bool {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            if current >= PipelineState::Stopping as u8 {
                return false;
            }
            match self.state.compare_exchange(
                current,
                PipelineState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    /// Final state, set after all capture resources are released
    pub fn mark_stopped(&self) {
        self.state
            .store(PipelineState::Stopped as u8, Ordering::Release);
    }
}

/// Formats the verbose beat line
#[derive(Debug, Default)]
pub struct BeatPrinter {
    position: usize,
}

impl BeatPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next line, advancing the spinner
    pub fn line(&mut self, bpm: f32, loudness_db: f32) -> String {
        let spinner = SPINNER[self.position % SPINNER.len()];
        self.position = self.position.wrapping_add(1);
        format!("{}\t{:.1} BPM\t{:.1} dB", spinner, bpm, loudness_db)
    }
}

/// Counters for logging and tests
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Frames analysed while capturing
    pub frames: u64,
    /// Frames with a beat
    pub beats: u64,
    /// Tempo changes sent to the dispatcher
    pub dispatches: u64,
    /// Frames dropped because of a size mismatch
    pub dropped_frames: u64,
}

/// Frame handler: tempo estimator, debouncer and dispatcher
pub struct BeatPipeline {
    estimator: Box<dyn TempoEstimator>,
    debouncer: BeatDebouncer,
    dispatcher: Dispatcher,
    status: Arc<PipelineStatus>,
    printer: Option<BeatPrinter>,
    stats: PipelineStats,
    last_report: Option<DispatchReport>,
}

impl BeatPipeline {
    pub fn new(
        estimator: Box<dyn TempoEstimator>,
        dispatcher: Dispatcher,
        status: Arc<PipelineStatus>,
    ) -> Self {
        Self {
            estimator,
            debouncer: BeatDebouncer::new(),
            dispatcher,
            status,
            printer: None,
            stats: PipelineStats::default(),
            last_report: None,
        }
    }

    /// Stock estimator and one sink per configured target
    pub fn from_config(config: &BeatConfig, status: Arc<PipelineStatus>) -> Result<Self> {
        config.validate()?;

        let estimator = OnsetTempoEstimator::for_buffer(config.buffer_size, config.sample_rate());
        let dispatcher = Dispatcher::from_targets(&config.targets, &config.sink_options())?;
        for route in dispatcher.routes() {
            info!("Dispatch target: {}", route.target.name());
        }

        Ok(Self::new(Box::new(estimator), dispatcher, status).verbose(config.verbose))
    }

    /// Print a line to stdout on every beat
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.printer = verbose.then(BeatPrinter::new);
        self
    }

    pub fn status(&self) -> &Arc<PipelineStatus> {
        &self.status
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Outcome of the most recent fan-out
    pub fn last_report(&self) -> Option<DispatchReport> {
        self.last_report
    }

    pub fn last_dispatched(&self) -> Option<i64> {
        self.debouncer.last_dispatched()
    }

    /// Handle one frame from the capture thread
    pub fn process_frame(&mut self, frame: AudioFrame<'_>) -> CaptureFlow {
        match self.status.state() {
            PipelineState::Capturing => {}
            PipelineState::Idle => return CaptureFlow::Continue,
            PipelineState::Stopping | PipelineState::Stopped => return CaptureFlow::Complete,
        }

        self.stats.frames += 1;

        let event = match self.estimator.process(frame.samples) {
            Ok(event) => event,
            Err(e) => {
                error!("Dropping frame {}: {}", frame.index, e);
                self.stats.dropped_frames += 1;
                return CaptureFlow::Continue;
            }
        };

        if !event.occurred {
            return CaptureFlow::Continue;
        }

        self.stats.beats += 1;
        trace!(
            "Beat in frame {}: {:.1} BPM, {:.1} dB",
            frame.index,
            event.bpm,
            event.loudness_db
        );

        if let Some(printer) = self.printer.as_mut() {
            let line = printer.line(event.bpm, event.loudness_db);
            // A closed stdout must not stop capture
            let _ = writeln!(std::io::stdout().lock(), "{}", line);
        }

        if let Some(bpm) = self.debouncer.should_dispatch(event.bpm) {
            debug!("Tempo changed to {} BPM (frame {})", bpm, frame.index);
            let report = self.dispatcher.dispatch(bpm);
            self.stats.dispatches += 1;
            self.last_report = Some(report);
        }

        CaptureFlow::Continue
    }

    /// Move the pipeline into a frame callback for the capture source
    pub fn into_callback(mut self) -> impl FnMut(AudioFrame<'_>) -> CaptureFlow + Send + 'static {
        move |frame: AudioFrame<'_>| self.process_frame(frame)
    }
}

impl std::fmt::Debug for BeatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeatPipeline")
            .field("state", &self.status.state())
            .field("routes", &self.dispatcher.len())
            .field("verbose", &self.printer.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
