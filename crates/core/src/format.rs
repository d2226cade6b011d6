// Frame format shared by sources and sinks

/// Layout of one decoded PCM frame.
///
/// Samples are interleaved little-endian; 8-bit samples are unsigned, wider
/// samples are signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl FrameFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes per sample, rounded up to whole bytes
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_per_sample as usize).div_ceil(8)
    }

    /// Bytes per frame (channels × bytes per sample)
    pub fn frame_size(&self) -> usize {
        self.bytes_per_sample() * self.channels as usize
    }

    /// Frames per second. PCM frame rate equals sample rate.
    pub fn frame_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames_to_micros(&self, frames: u64) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (frames as u128 * 1_000_000 / self.sample_rate as u128) as u64
    }

    pub fn frames_to_millis(&self, frames: u64) -> u64 {
        self.frames_to_micros(frames) / 1000
    }

    /// `frame = ms * frame_rate / 1000`
    pub fn millis_to_frames(&self, millis: u64) -> u64 {
        (millis as u128 * self.sample_rate as u128 / 1000) as u64
    }

    pub fn bytes_to_frames(&self, bytes: usize) -> u64 {
        match self.frame_size() {
            0 => 0,
            size => (bytes / size) as u64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_size_for_common_layouts() {
        assert_eq!(FrameFormat::new(44_100, 2, 16).frame_size(), 4);
        assert_eq!(FrameFormat::new(48_000, 1, 24).frame_size(), 3);
        assert_eq!(FrameFormat::new(8_000, 1, 8).frame_size(), 1);
    }

    #[test]
    fn duration_math() {
        let format = FrameFormat::new(44_100, 2, 16);
        assert_eq!(format.frames_to_millis(44_100), 1000);
        assert_eq!(format.frames_to_micros(441), 10_000);
        assert_eq!(format.millis_to_frames(500), 22_050);
        assert_eq!(format.bytes_to_frames(4096), 1024);
    }
}
