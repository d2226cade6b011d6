// Shared fixtures for session tests
#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamed_core::{
    AudioError, AudioEvent, AudioListener, DecodedSource, FrameFormat, OutputSink, Result,
    SinkProvider, SourceOpener,
};

/// 8 kHz stereo 16-bit, four bytes per frame
pub const FORMAT: FrameFormat = FrameFormat {
    sample_rate: 8000,
    channels: 2,
    bits_per_sample: 16,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Source where frame `i` holds the little-endian u32 `i`
pub struct CountingSource {
    next: u64,
    total: u64,
    report_length: bool,
    fail_at: Option<u64>,
    closed: Arc<AtomicUsize>,
}

impl DecodedSource for CountingSource {
    fn frame_format(&self) -> FrameFormat {
        FORMAT
    }

    fn frame_length(&self) -> Option<u64> {
        self.report_length.then_some(self.total)
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut written = 0;
        for chunk in buf.chunks_exact_mut(4) {
            if self.next >= self.total {
                break;
            }
            if self.fail_at == Some(self.next) {
                return Err(AudioError::Decoding(format!("corrupt frame {}", self.next)));
            }
            chunk.copy_from_slice(&(self.next as u32).to_le_bytes());
            self.next += 1;
            written += 4;
        }
        Ok(written)
    }

    fn close(&mut self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct MockOpener {
    pub total: u64,
    pub report_length: bool,
    pub fail_open: AtomicBool,
    pub fail_at: Option<u64>,
    pub opens: AtomicUsize,
    pub closes: Arc<AtomicUsize>,
}

impl MockOpener {
    pub fn new(total: u64) -> Self {
        Self {
            total,
            report_length: true,
            fail_open: AtomicBool::new(false),
            fail_at: None,
            opens: AtomicUsize::new(0),
            closes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn unknown_length(mut self) -> Self {
        self.report_length = false;
        self
    }

    pub fn failing_at(mut self, frame: u64) -> Self {
        self.fail_at = Some(frame);
        self
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl SourceOpener for MockOpener {
    fn open(&self) -> Result<Box<dyn DecodedSource>> {
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(AudioError::Resource("missing.wav".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSource {
            next: 0,
            total: self.total,
            report_length: self.report_length,
            fail_at: self.fail_at,
            closed: Arc::clone(&self.closes),
        }))
    }

    fn describe(&self) -> String {
        format!("counting source ({} frames)", self.total)
    }
}

/// Everything the mock sinks observed
#[derive(Default)]
pub struct SinkLog {
    pub data: Mutex<Vec<u8>>,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    pub flushes: AtomicUsize,
    pub closed: AtomicBool,
    pub writes_after_close: AtomicUsize,
    active_writers: AtomicUsize,
    pub max_writers: AtomicUsize,
}

impl SinkLog {
    pub fn frames(&self) -> Vec<u32> {
        self.data
            .lock()
            .chunks_exact(4)
            .map(|frame| u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]))
            .collect()
    }

    pub fn frame_count(&self) -> usize {
        self.data.lock().len() / 4
    }
}

pub struct MockSink {
    log: Arc<SinkLog>,
    delay: Duration,
}

impl OutputSink for MockSink {
    fn open(&mut self, format: &FrameFormat) -> Result<()> {
        assert_eq!(*format, FORMAT);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.log.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.log.closed.load(Ordering::SeqCst) {
            self.log.writes_after_close.fetch_add(1, Ordering::SeqCst);
        }
        let active = self.log.active_writers.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_writers.fetch_max(active, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.log.data.lock().extend_from_slice(data);
        self.log.active_writers.fetch_sub(1, Ordering::SeqCst);
        Ok(data.len())
    }

    fn flush(&mut self) {
        self.log.flushes.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.log.closed.store(true, Ordering::SeqCst);
    }

    fn buffer_size(&self) -> usize {
        4096
    }

    fn microsecond_position(&self) -> u64 {
        FORMAT.frames_to_micros(self.log.frame_count() as u64)
    }

    fn level(&self) -> f32 {
        0.5
    }
}

pub struct MockSinks {
    pub log: Arc<SinkLog>,
    pub delay: Duration,
    pub fail: bool,
}

impl MockSinks {
    pub fn new() -> Self {
        Self {
            log: Arc::new(SinkLog::default()),
            delay: Duration::ZERO,
            fail: false,
        }
    }

    /// Each write sleeps, so playback takes measurable time
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }
}

impl SinkProvider for MockSinks {
    fn acquire(&self, format: &FrameFormat) -> Result<Box<dyn OutputSink>> {
        if self.fail {
            return Err(AudioError::Device(format!("no line for {:?}", format)));
        }
        Ok(Box::new(MockSink {
            log: Arc::clone(&self.log),
            delay: self.delay,
        }))
    }
}

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<AudioEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<AudioEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: AudioEvent) -> usize {
        self.events.lock().iter().filter(|e| **e == event).count()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl AudioListener for Recorder {
    fn on_event(&self, event: &AudioEvent) {
        self.events.lock().push(*event);
    }
}

/// Poll `condition` until it holds or five seconds pass
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    condition()
}

pub fn expected_frames(range: std::ops::Range<u32>) -> Vec<u32> {
    range.collect()
}
