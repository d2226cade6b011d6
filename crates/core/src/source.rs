// Decoded source and output sink abstractions
// Platform/codec-specific crates implement these traits

use crate::error::Result;
use crate::format::FrameFormat;

/// Forward-only cursor over decoded PCM frames
pub trait DecodedSource: Send {
    /// Format of every frame this source yields
    fn frame_format(&self) -> FrameFormat;

    /// Total frame count, if the container reports it up front
    fn frame_length(&self) -> Option<u64>;

    /// Fill `buf` with whole frames.
    /// Returns the number of bytes written; 0 means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Release the underlying decoder and byte stream
    fn close(&mut self);
}

/// Produces fresh sources positioned at frame 0.
/// Used once by open and again by every reset.
pub trait SourceOpener: Send + Sync {
    fn open(&self) -> Result<Box<dyn DecodedSource>>;

    /// Human readable description for logs
    fn describe(&self) -> String {
        String::from("audio source")
    }
}

/// Device-facing buffer accepting frame writes
pub trait OutputSink: Send {
    /// Prepare the device for the given format
    fn open(&mut self, format: &FrameFormat) -> Result<()>;

    /// Begin (or continue) consuming buffered frames
    fn start(&mut self) -> Result<()>;

    /// Stop consuming; buffered frames are kept
    fn stop(&mut self) -> Result<()>;

    /// Write frames, blocking while the device buffer is full.
    /// Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Discard buffered frames
    fn flush(&mut self);

    /// Release the device
    fn close(&mut self);

    /// Device buffer capacity in bytes
    fn buffer_size(&self) -> usize;

    /// Playback cursor of the device
    fn microsecond_position(&self) -> u64;

    /// Current output level (0.0 - 1.0)
    fn level(&self) -> f32;
}

/// Output sink factory
/// Allows plugging platform-specific devices into a session
pub trait SinkProvider: Send + Sync {
    /// Create a sink able to play the given format
    fn acquire(&self, format: &FrameFormat) -> Result<Box<dyn OutputSink>>;
}
