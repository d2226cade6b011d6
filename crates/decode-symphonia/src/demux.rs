// Container probing and packet reading

use std::io::ErrorKind;
use streamed_core::{AudioError, Result};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Packet};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Audio demuxer wrapper
pub struct Demuxer {
    format_reader: Box<dyn FormatReader>,
    track_id: u32,
}

impl Demuxer {
    /// Probe a media source and select its first decodable track
    pub fn from_media_source(media_source: Box<dyn MediaSource>, hint: Hint) -> Result<Self> {
        let media_source_stream = MediaSourceStream::new(media_source, Default::default());

        let probe_result = symphonia::default::get_probe()
            .format(
                &hint,
                media_source_stream,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| AudioError::UnsupportedFormat(format!("Failed to probe media: {}", e)))?;

        let format_reader = probe_result.format;
        let track_id = format_reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .map(|t| t.id)
            .ok_or_else(|| AudioError::UnsupportedFormat("No decodable audio track".to_string()))?;

        Ok(Self {
            format_reader,
            track_id,
        })
    }

    /// Hint from a file extension, if one is known
    pub fn hint_for(extension: Option<&str>) -> Hint {
        let mut hint = Hint::new();
        if let Some(extension) = extension {
            hint.with_extension(extension);
        }
        hint
    }

    /// Next packet of the selected track, `None` once the container is exhausted
    pub fn next_packet(&mut self) -> Result<Option<Packet>> {
        loop {
            match self.format_reader.next_packet() {
                Ok(packet) if packet.track_id() == self.track_id => return Ok(Some(packet)),
                Ok(_) => continue,
                Err(SymphoniaError::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("Stream requires a decoder reset, treating as end of stream");
                    return Ok(None);
                }
                Err(e) => return Err(AudioError::Decoding(format!("Failed to read packet: {}", e))),
            }
        }
    }

    pub fn track_info(&self) -> Result<TrackInfo> {
        let track = self
            .format_reader
            .tracks()
            .iter()
            .find(|t| t.id == self.track_id)
            .ok_or_else(|| AudioError::Decoding("Track not found".to_string()))?;

        let codec_params = &track.codec_params;
        Ok(TrackInfo {
            sample_rate: codec_params.sample_rate,
            channels: codec_params.channels.map(|c| c.count() as u16),
            frames: codec_params.n_frames,
        })
    }

    pub fn format_reader(&self) -> &dyn FormatReader {
        &*self.format_reader
    }

    pub fn track_id(&self) -> u32 {
        self.track_id
    }
}

/// What the container declares about the selected track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
    /// Frame count, when the container records it
    pub frames: Option<u64>,
}
