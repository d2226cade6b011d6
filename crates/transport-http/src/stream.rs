// Forward-only HTTP body exposed as a symphonia media source

use crate::client::{content_length, HttpClient};
use std::io::{self, Read, Seek, SeekFrom};
use streamed_core::Result;
use symphonia::core::io::MediaSource;

/// Response body of a single GET, read front to back
///
/// Seeking is limited to skipping forward; going back means issuing a new
/// request, which the decoder layer does by reopening the resource.
pub struct HttpStream {
    reader: Box<dyn Read + Send + Sync>,
    position: u64,
    length: Option<u64>,
}

impl HttpStream {
    pub fn open(client: &HttpClient, url: &str) -> Result<Self> {
        let response = client.get(url)?;
        let length = content_length(&response);
        log::info!(
            "HTTP stream opened: {} ({})",
            url,
            length.map(|l| format!("{} bytes", l)).unwrap_or_else(|| "length unknown".to_string())
        );
        Ok(Self::from_reader(response.into_reader(), length))
    }

    pub(crate) fn from_reader(reader: Box<dyn Read + Send + Sync>, length: Option<u64>) -> Self {
        Self {
            reader,
            position: 0,
            length,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    fn skip(&mut self, count: u64) -> io::Result<()> {
        let skipped = io::copy(&mut (&mut self.reader).take(count), &mut io::sink())?;
        self.position += skipped;
        if skipped < count {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Seek past end of HTTP stream"));
        }
        Ok(())
    }
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let read = self.reader.read(buf)?;
        self.position += read as u64;
        Ok(read)
    }
}

impl Seek for HttpStream {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::Current(delta) => self.position.checked_add_signed(delta),
            SeekFrom::End(delta) => self.length.and_then(|len| len.checked_add_signed(delta)),
        };

        match target {
            Some(target) if target >= self.position => {
                self.skip(target - self.position)?;
                Ok(self.position)
            }
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                format!("HTTP stream cannot seek to {:?} from {}", pos, self.position),
            )),
        }
    }
}

impl MediaSource for HttpStream {
    fn is_seekable(&self) -> bool {
        false
    }

    fn byte_len(&self) -> Option<u64> {
        self.length
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn stream(len: u8) -> HttpStream {
        let body: Vec<u8> = (0..len).collect();
        HttpStream::from_reader(Box::new(Cursor::new(body)), Some(len as u64))
    }

    #[test]
    fn reads_track_position() {
        let mut s = stream(10);
        let mut buf = [0u8; 4];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(s.position(), 4);
    }

    #[test]
    fn forward_seek_skips_bytes() {
        let mut s = stream(10);
        assert_eq!(s.seek(SeekFrom::Start(6)).unwrap(), 6);
        assert_eq!(s.seek(SeekFrom::Current(1)).unwrap(), 7);
        let mut buf = [0u8; 1];
        s.read_exact(&mut buf).unwrap();
        assert_eq!(buf[0], 7);
        assert_eq!(s.seek(SeekFrom::End(-1)).unwrap(), 9);
    }

    #[test]
    fn backward_seek_is_unsupported() {
        let mut s = stream(10);
        s.seek(SeekFrom::Start(5)).unwrap();
        let err = s.seek(SeekFrom::Start(2)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Unsupported);
        assert!(!s.is_seekable());
        assert_eq!(s.byte_len(), Some(10));
    }

    #[test]
    fn seek_past_end_fails() {
        let mut s = stream(4);
        let err = s.seek(SeekFrom::Start(9)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
