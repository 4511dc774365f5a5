//! cpal input stream
//!
//! Opens a mono 44.1 kHz f32 input stream and turns the host's data callback
//! into one call per full frame. cpal's `Stream` is not `Send` on every
//! platform, so the source stays on the thread that opened it; only the frame
//! callback moves to the audio thread.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{
    BufferSize, Device, Host, SampleFormat, SampleRate, Stream, StreamConfig, SupportedBufferSize,
};
use tracing::{debug, error, info};

use super::{AudioFrame, CaptureFlow, FrameAssembler, InputDeviceInfo};
use crate::config::SAMPLE_RATE;
use crate::error::CaptureError;
use crate::lifecycle::CaptureHandle;

/// Capture channels
const CHANNELS: u16 = 1;

/// Enumerate input-capable devices without opening a stream
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>, CaptureError> {
    let host = cpal::default_host();
    let devices = host
        .input_devices()
        .map_err(|e| CaptureError::Device(format!("Failed to enumerate input devices: {}", e)))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| InputDeviceInfo {
            index,
            name: device
                .name()
                .unwrap_or_else(|_| "unknown device".to_string()),
        })
        .collect())
}

fn select_device(host: &Host, index: Option<usize>) -> Result<Device, CaptureError> {
    match index {
        Some(index) => host
            .input_devices()
            .map_err(|e| CaptureError::Device(format!("Failed to enumerate input devices: {}", e)))?
            .nth(index)
            .ok_or_else(|| CaptureError::Device(format!("Input device index {} not found", index))),
        None => host
            .default_input_device()
            .ok_or_else(|| CaptureError::Device("No default input device available".to_string())),
    }
}

/// Ask the host for `requested` frames per callback when a matching mono f32
/// config advertises that size; otherwise let the host pick and rely on the
/// frame assembler.
fn negotiate_buffer_size(device: &Device, requested: usize) -> BufferSize {
    let Ok(configs) = device.supported_input_configs() else {
        return BufferSize::Default;
    };

    let fits = configs
        .filter(|range| range.channels() == CHANNELS && range.sample_format() == SampleFormat::F32)
        .filter(|range| {
            range.min_sample_rate().0 <= SAMPLE_RATE && SAMPLE_RATE <= range.max_sample_rate().0
        })
        .any(|range| match range.buffer_size() {
            SupportedBufferSize::Range { min, max } => {
                (*min as usize) <= requested && requested <= (*max as usize)
            }
            SupportedBufferSize::Unknown => false,
        });

    if fits {
        BufferSize::Fixed(requested as u32)
    } else {
        debug!("Host does not advertise {} frame buffers, using default", requested);
        BufferSize::Default
    }
}

/// Live input stream delivering fixed-size frames
pub struct AudioFrameSource {
    host: Option<Host>,
    stream: Option<Stream>,
    device_name: String,
}

impl AudioFrameSource {
    /// Open the input stream. Frames are delivered once the stream is started
    /// through [`CaptureHandle::start`].
    ///
    /// `on_frame` runs on the audio thread, once per `buffer_size` samples, in
    /// capture order.
    pub fn open<F>(
        device: Option<usize>,
        buffer_size: usize,
        on_frame: F,
    ) -> Result<Self, CaptureError>
    where
        F: FnMut(AudioFrame<'_>) -> CaptureFlow + Send + 'static,
    {
        if buffer_size == 0 {
            return Err(CaptureError::Device("Buffer size must be non-zero".to_string()));
        }

        let host = cpal::default_host();
        let device = select_device(&host, device)?;
        let device_name = device
            .name()
            .unwrap_or_else(|_| "unknown device".to_string());
        info!("Using input device: {}", device_name);

        let config = StreamConfig {
            channels: CHANNELS,
            sample_rate: SampleRate(SAMPLE_RATE),
            buffer_size: negotiate_buffer_size(&device, buffer_size),
        };
        debug!("Input stream config: {:?}", config);

        let mut assembler = FrameAssembler::new(buffer_size);
        let mut on_frame = on_frame;

        let stream = device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, &mut on_frame);
                },
                |err| error!("Audio stream error: {}", err),
                None,
            )
            .map_err(|e| {
                CaptureError::Device(format!(
                    "Cannot open '{}' at {} Hz, {} channel, f32: {}",
                    device_name, SAMPLE_RATE, CHANNELS, e
                ))
            })?;

        Ok(Self {
            host: Some(host),
            stream: Some(stream),
            device_name,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl CaptureHandle for AudioFrameSource {
    fn start(&mut self) -> Result<(), CaptureError> {
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| CaptureError::Stream("Stream already closed".to_string()))?;
        stream
            .play()
            .map_err(|e| CaptureError::Device(format!("Failed to start input stream: {}", e)))
    }

    fn stop(&mut self) -> Result<(), CaptureError> {
        match &self.stream {
            Some(stream) => stream
                .pause()
                .map_err(|e| CaptureError::Stream(format!("Failed to stop input stream: {}", e))),
            None => Ok(()),
        }
    }

    fn close(&mut self) {
        if self.stream.take().is_some() {
            debug!("Input stream closed");
        }
    }

    fn release(&mut self) {
        if self.host.take().is_some() {
            debug!("Audio host released");
        }
    }
}
