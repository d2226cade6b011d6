// Little-endian PCM bytes to f32 samples

use streamed_core::{AudioError, FrameFormat, Result};

fn unsigned_8(s: &[u8]) -> f32 {
    (s[0] as f32 - 128.0) / 128.0
}

fn signed_16(s: &[u8]) -> f32 {
    i16::from_le_bytes([s[0], s[1]]) as f32 / 32768.0
}

fn signed_24(s: &[u8]) -> f32 {
    // Sign-extend through the top byte of an i32
    (i32::from_le_bytes([0, s[0], s[1], s[2]]) >> 8) as f32 / 8_388_608.0
}

fn signed_32(s: &[u8]) -> f32 {
    i32::from_le_bytes([s[0], s[1], s[2], s[3]]) as f32 / 2_147_483_648.0
}

fn sample_reader(bits: u16) -> Option<fn(&[u8]) -> f32> {
    match bits {
        8 => Some(unsigned_8),
        16 => Some(signed_16),
        24 => Some(signed_24),
        32 => Some(signed_32),
        _ => None,
    }
}

/// Decode whole samples from `data` into `out`, replacing its contents.
/// Returns the number of bytes consumed; a trailing partial sample is left.
pub fn pcm_to_f32(format: &FrameFormat, data: &[u8], out: &mut Vec<f32>) -> Result<usize> {
    let read = sample_reader(format.bits_per_sample).ok_or_else(|| {
        AudioError::UnsupportedFormat(format!(
            "{}-bit PCM is not supported by the output sink",
            format.bits_per_sample
        ))
    })?;

    let chunks = data.chunks_exact(format.bytes_per_sample());
    let consumed = data.len() - chunks.remainder().len();
    out.clear();
    out.extend(chunks.map(read));
    Ok(consumed)
}

/// Largest absolute sample value
pub(crate) fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
}
