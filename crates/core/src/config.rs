// Session tuning

/// Frames moved per worker read/write
pub const DEFAULT_BLOCK_FRAMES: usize = 1024;

/// Scratch buffer for length scans and seek discards
pub const DEFAULT_SCAN_BLOCK_BYTES: usize = 4096;

pub const DEFAULT_WORKER_THREAD_NAME: &str = "streamed-audio-worker";

/// Per-session configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub block_frames: usize,
    pub scan_block_bytes: usize,
    pub thread_name: String,
}

impl SessionConfig {
    pub fn with_block_frames(mut self, frames: usize) -> Self {
        self.block_frames = frames.max(1);
        self
    }

    pub fn with_scan_block_bytes(mut self, bytes: usize) -> Self {
        self.scan_block_bytes = bytes.max(1);
        self
    }

    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Worker buffer size in bytes for a given frame size
    pub(crate) fn block_bytes(&self, frame_size: usize) -> usize {
        self.block_frames.max(1) * frame_size.max(1)
    }

    /// Scratch size rounded down to whole frames, at least one frame
    pub(crate) fn scan_bytes(&self, frame_size: usize) -> usize {
        let frame_size = frame_size.max(1);
        (self.scan_block_bytes / frame_size).max(1) * frame_size
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            block_frames: DEFAULT_BLOCK_FRAMES,
            scan_block_bytes: DEFAULT_SCAN_BLOCK_BYTES,
            thread_name: DEFAULT_WORKER_THREAD_NAME.to_string(),
        }
    }
}
