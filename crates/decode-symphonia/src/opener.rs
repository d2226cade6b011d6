// Opens a fresh decoder over a resource on every reset

use crate::demux::Demuxer;
use crate::resolve::open_media;
use crate::source::SymphoniaSource;
use streamed_core::{DecodedSource, Resource, Result, SourceOpener};
use streamed_transport_http::HttpClient;

pub struct SymphoniaOpener {
    resource: Resource,
    http: HttpClient,
}

impl SymphoniaOpener {
    pub fn new(resource: Resource) -> Self {
        Self::with_client(resource, HttpClient::new())
    }

    pub fn with_client(resource: Resource, http: HttpClient) -> Self {
        Self { resource, http }
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }
}

impl SourceOpener for SymphoniaOpener {
    fn open(&self) -> Result<Box<dyn DecodedSource>> {
        let media = open_media(&self.resource, &self.http)?;
        let extension = self.resource.extension_hint();
        let hint = Demuxer::hint_for(extension.as_deref());
        Ok(Box::new(SymphoniaSource::new(media, hint)?))
    }

    fn describe(&self) -> String {
        self.resource.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use streamed_core::{AudioError, FrameFormat};

    /// Canonical 44-byte header PCM WAV, frame `i` = (i, -i) as i16
    fn wav(sample_rate: u32, frames: u32) -> Vec<u8> {
        let channels: u16 = 2;
        let block_align = channels * 2;
        let data_len = frames * block_align as u32;

        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&16u16.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for i in 0..frames {
            let sample = i as i16;
            out.extend_from_slice(&sample.to_le_bytes());
            out.extend_from_slice(&(-sample).to_le_bytes());
        }
        out
    }

    fn drain(source: &mut dyn DecodedSource, chunk: usize) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = vec![0u8; chunk];
        loop {
            let n = source.read(&mut buf).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn decodes_in_memory_wav() {
        let _ = env_logger::builder().is_test(true).try_init();
        let bytes = wav(8000, 3000);
        let opener = SymphoniaOpener::new(Resource::from_bytes(bytes.clone()));

        let mut source = opener.open().unwrap();
        assert_eq!(source.frame_format(), FrameFormat::new(8000, 2, 16));
        assert_eq!(source.frame_length(), Some(3000));

        // Odd chunk sizes still yield whole frames
        let pcm = drain(source.as_mut(), 1001);
        assert_eq!(pcm.len(), 3000 * 4);
        assert_eq!(&pcm[..], &bytes[44..]);
    }

    #[test]
    fn reopening_starts_from_the_first_frame() {
        let opener = SymphoniaOpener::new(Resource::from_bytes(wav(8000, 500)));
        let mut first = opener.open().unwrap();
        let mut buf = [0u8; 400];
        first.read(&mut buf).unwrap();
        first.close();
        assert_eq!(first.read(&mut buf).unwrap(), 0);

        let mut second = opener.open().unwrap();
        let mut frame = [0u8; 4];
        assert_eq!(second.read(&mut frame).unwrap(), 4);
        assert_eq!(frame, [0, 0, 0, 0]);
    }

    #[test]
    fn decodes_wav_stored_in_zip() {
        use std::io::Write;

        let bytes = wav(8000, 400);
        let mut archive = tempfile::NamedTempFile::new().unwrap();
        let mut writer = zip::ZipWriter::new(archive.as_file_mut());
        writer
            .start_file("sounds/beep.wav", zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(&bytes).unwrap();
        writer.finish().unwrap();

        let opener = SymphoniaOpener::new(Resource::zip_entry(archive.path(), "sounds/beep.wav"));
        let mut source = opener.open().unwrap();
        assert_eq!(source.frame_length(), Some(400));
        assert_eq!(drain(source.as_mut(), 256), bytes[44..].to_vec());
    }

    #[test]
    fn garbage_is_rejected() {
        let opener = SymphoniaOpener::new(Resource::from_bytes(vec![0x42u8; 512]));
        let err = opener.open().err().unwrap();
        assert!(matches!(err, AudioError::UnsupportedFormat(_)));
    }

    #[test]
    fn describes_its_resource() {
        let opener = SymphoniaOpener::new(Resource::parse("https://example.com/a.mp3"));
        assert_eq!(opener.describe(), "http https://example.com/a.mp3");
    }
}
