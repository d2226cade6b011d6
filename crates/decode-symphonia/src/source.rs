// Decoded source: compressed packets in, interleaved 16-bit PCM out

use crate::demux::Demuxer;
use streamed_core::{AudioError, DecodedSource, FrameFormat, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::io::MediaSource;
use symphonia::core::probe::Hint;

/// Consecutive corrupt packets tolerated before the stream is declared broken
const MAX_DECODE_RETRIES: u32 = 3;

const BITS_PER_SAMPLE: u16 = 16;

/// Forward-only PCM reader over one decoded track
pub struct SymphoniaSource {
    demuxer: Demuxer,
    decoder: Box<dyn Decoder>,
    format: FrameFormat,
    frames: Option<u64>,
    sample_buf: Option<SampleBuffer<i16>>,
    /// Decoded bytes not yet handed out
    pending: Vec<u8>,
    pending_pos: usize,
    finished: bool,
}

impl SymphoniaSource {
    pub fn new(media: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let demuxer = Demuxer::from_media_source(media, hint)?;
        let info = demuxer.track_info()?;
        let track = demuxer
            .format_reader()
            .tracks()
            .iter()
            .find(|t| t.id == demuxer.track_id())
            .ok_or_else(|| AudioError::Decoding("Track not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

        let mut source = Self {
            demuxer,
            decoder,
            format: FrameFormat::new(info.sample_rate.unwrap_or(0), info.channels.unwrap_or(0), BITS_PER_SAMPLE),
            frames: info.frames,
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
        };

        // Some containers leave rate or layout to the first packet
        if source.format.sample_rate == 0 || source.format.channels == 0 {
            source.decode_next()?;
        }
        if source.format.sample_rate == 0 || source.format.channels == 0 {
            return Err(AudioError::UnsupportedFormat(
                "Stream does not declare sample rate or channel layout".to_string(),
            ));
        }

        log::debug!(
            "Decoder ready: {}Hz, {} channels, {} frames",
            source.format.sample_rate,
            source.format.channels,
            source
                .frames
                .map(|f| f.to_string())
                .unwrap_or_else(|| "unknown".to_string())
        );
        Ok(source)
    }

    /// Decode packets until one yields audio. Returns false at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        let mut failures = 0;

        loop {
            let packet = match self.demuxer.next_packet()? {
                Some(packet) => packet,
                None => {
                    self.finished = true;
                    return Ok(false);
                }
            };

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    failures += 1;
                    log::warn!("Skipping corrupt packet ({}/{}): {}", failures, MAX_DECODE_RETRIES, e);
                    if failures >= MAX_DECODE_RETRIES {
                        return Err(AudioError::Decoding(format!(
                            "{} consecutive corrupt packets, last: {}",
                            failures, e
                        )));
                    }
                    continue;
                }
                Err(e) => return Err(AudioError::Decoding(format!("Decoding failed: {}", e))),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            if self.format.sample_rate == 0 || self.format.channels == 0 {
                self.format = FrameFormat::new(spec.rate, spec.channels.count() as u16, BITS_PER_SAMPLE);
            }

            let needed = decoded.capacity() as u64;
            let reuse = self
                .sample_buf
                .as_ref()
                .map(|buf| buf.capacity() as u64 >= needed * spec.channels.count() as u64)
                .unwrap_or(false);
            if !reuse {
                self.sample_buf = Some(SampleBuffer::new(needed, spec));
            }

            let Some(sample_buf) = self.sample_buf.as_mut() else {
                continue;
            };
            sample_buf.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending_pos = 0;
            for sample in sample_buf.samples() {
                self.pending.extend_from_slice(&sample.to_le_bytes());
            }
            return Ok(true);
        }
    }
}

impl DecodedSource for SymphoniaSource {
    fn frame_format(&self) -> FrameFormat {
        self.format
    }

    fn frame_length(&self) -> Option<u64> {
        self.frames
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let frame_size = self.format.frame_size();
        let wanted = buf.len() / frame_size * frame_size;
        let mut written = 0;

        while written < wanted {
            if self.pending_pos >= self.pending.len() {
                if self.finished || !self.decode_next()? {
                    break;
                }
                continue;
            }

            let available = self.pending.len() - self.pending_pos;
            let count = available.min(wanted - written);
            buf[written..written + count]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + count]);
            self.pending_pos += count;
            written += count;
        }

        Ok(written)
    }

    fn close(&mut self) {
        self.finished = true;
        self.pending.clear();
        self.pending_pos = 0;
        self.sample_buf = None;
    }
}
