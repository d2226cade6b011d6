// cpal output stream fed from a sample ring

use crate::convert::{pcm_to_f32, peak};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use streamed_core::{AudioError, FrameFormat, OutputSink, Result, SinkProvider};
use streamed_ringbuffer::SharedRing;

/// Output device settings
#[derive(Debug, Clone)]
pub struct SinkConfig {
    /// Ring capacity in milliseconds of audio
    pub buffer_ms: u32,
    /// Preferred output device, falling back to the host default
    pub device_name: Option<String>,
}

impl SinkConfig {
    pub fn with_buffer_ms(mut self, buffer_ms: u32) -> Self {
        self.buffer_ms = buffer_ms.max(1);
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    /// Ring capacity in samples for a format
    pub(crate) fn ring_samples(&self, format: &FrameFormat) -> usize {
        let frames = (format.sample_rate as u64 * self.buffer_ms.max(1) as u64 / 1000).max(1);
        frames as usize * format.channels.max(1) as usize
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            buffer_ms: 500,
            device_name: None,
        }
    }
}

/// Counters shared with the device callback
#[derive(Default)]
struct Meter {
    frames_played: AtomicU64,
    /// f32 bits of the last callback's peak
    peak: AtomicU32,
}

/// One output line at a fixed frame format
pub struct CpalSink {
    device: Device,
    config: SinkConfig,
    stream: Option<Stream>,
    ring: Option<SharedRing>,
    format: Option<FrameFormat>,
    is_playing: Arc<AtomicBool>,
    meter: Arc<Meter>,
    scratch: Vec<f32>,
}

impl CpalSink {
    pub fn new(config: SinkConfig) -> Result<Self> {
        let device = select_device(config.device_name.as_deref())?;
        log::info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        Ok(Self {
            device,
            config,
            stream: None,
            ring: None,
            format: None,
            is_playing: Arc::new(AtomicBool::new(false)),
            meter: Arc::new(Meter::default()),
            scratch: Vec::new(),
        })
    }

    fn stream(&self) -> Result<&Stream> {
        self.stream
            .as_ref()
            .ok_or_else(|| AudioError::Device("Output line is not open".to_string()))
    }
}

fn select_device(name: Option<&str>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(wanted) = name {
        let devices = host
            .output_devices()
            .map_err(|e| AudioError::Device(format!("Failed to enumerate output devices: {}", e)))?;
        for device in devices {
            if device.name().map(|n| n == wanted).unwrap_or(false) {
                return Ok(device);
            }
        }
        log::warn!("Output device '{}' not found, using default", wanted);
    }

    host.default_output_device()
        .ok_or_else(|| AudioError::Device("No output device available".to_string()))
}

impl OutputSink for CpalSink {
    fn open(&mut self, format: &FrameFormat) -> Result<()> {
        // Reject widths the converter cannot handle before touching the device
        pcm_to_f32(format, &[], &mut self.scratch)?;

        let config = StreamConfig {
            channels: format.channels,
            sample_rate: cpal::SampleRate(format.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let ring = SharedRing::new(self.config.ring_samples(format));
        let ring_clone = ring.clone();
        let error_ring = ring.clone();
        let is_playing = self.is_playing.clone();
        let meter = self.meter.clone();
        let channels = format.channels.max(1) as u64;

        let stream = self
            .device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if !is_playing.load(Ordering::Relaxed) {
                        data.fill(0.0);
                        return;
                    }

                    let read = ring_clone.pop(data);
                    meter.frames_played.fetch_add(read as u64 / channels, Ordering::Relaxed);
                    meter.peak.store(peak(&data[..read]).to_bits(), Ordering::Relaxed);

                    // Zero-fill any unwritten samples to prevent playing stale data
                    if read < data.len() {
                        data[read..].fill(0.0);
                    }
                },
                move |err| {
                    log::error!("Audio stream error: {}", err);
                    // Unblock the writer so the fault surfaces in the worker
                    error_ring.close();
                },
                None,
            )
            .map_err(|e| AudioError::Device(format!("Failed to build output stream: {}", e)))?;

        log::debug!(
            "Output line open: {}Hz, {} channels, ring of {} samples",
            format.sample_rate,
            format.channels,
            ring.capacity()
        );

        self.stream = Some(stream);
        self.ring = Some(ring);
        self.format = Some(*format);
        self.meter.frames_played.store(0, Ordering::Relaxed);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.stream()?
            .play()
            .map_err(|e| AudioError::Device(format!("Failed to start stream: {}", e)))?;
        self.is_playing.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.is_playing.store(false, Ordering::Relaxed);
        self.meter.peak.store(0f32.to_bits(), Ordering::Relaxed);
        self.stream()?
            .pause()
            .map_err(|e| AudioError::Device(format!("Failed to stop stream: {}", e)))
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let (format, ring) = match (self.format, self.ring.as_ref()) {
            (Some(format), Some(ring)) => (format, ring),
            _ => return Err(AudioError::Device("Output line is not open".to_string())),
        };

        let consumed = pcm_to_f32(&format, data, &mut self.scratch)?;
        let written = ring.push_blocking(&self.scratch);
        if written < self.scratch.len() {
            log::debug!("Output ring closed after {} of {} samples", written, self.scratch.len());
        }

        let width = format.bytes_per_sample();
        Ok((written * width).min(consumed))
    }

    fn flush(&mut self) {
        if let Some(ring) = &self.ring {
            log::debug!("Flushing output ring at {:.0}% full", ring.fullness() * 100.0);
            ring.clear();
        }
    }

    fn close(&mut self) {
        self.is_playing.store(false, Ordering::Relaxed);
        if let Some(ring) = self.ring.take() {
            ring.close();
        }
        // Dropping the stream releases the device
        self.stream = None;
        self.format = None;
    }

    fn buffer_size(&self) -> usize {
        match (&self.ring, &self.format) {
            (Some(ring), Some(format)) => ring.capacity() * format.bytes_per_sample(),
            _ => 0,
        }
    }

    fn microsecond_position(&self) -> u64 {
        self.format
            .map(|format| format.frames_to_micros(self.meter.frames_played.load(Ordering::Relaxed)))
            .unwrap_or(0)
    }

    fn level(&self) -> f32 {
        f32::from_bits(self.meter.peak.load(Ordering::Relaxed))
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.close();
    }
}

// SAFETY: cpal::Stream is !Send on some hosts (COM threading on Windows).
// The stream is only created, started, paused and dropped through `&mut self`,
// and the session serializes every call on the sink behind its I/O lock, so
// it is never touched from two threads at once.
unsafe impl Send for CpalSink {}

/// Opens a fresh cpal line for every session
#[derive(Debug, Clone, Default)]
pub struct CpalSinkProvider {
    config: SinkConfig,
}

impl CpalSinkProvider {
    pub fn new(config: SinkConfig) -> Self {
        Self { config }
    }
}

impl SinkProvider for CpalSinkProvider {
    fn acquire(&self, _format: &FrameFormat) -> Result<Box<dyn OutputSink>> {
        Ok(Box::new(CpalSink::new(self.config.clone())?))
    }
}
