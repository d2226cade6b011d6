// Resource resolution into symphonia media sources

use std::fs::File;
use std::io::{Cursor, Read};
use std::path::Path;
use streamed_core::{AudioError, Resource, Result};
use streamed_transport_http::{HttpClient, HttpStream};
use symphonia::core::io::MediaSource;

/// Open a resource as a byte stream the demuxer can probe
pub fn open_media(resource: &Resource, http: &HttpClient) -> Result<Box<dyn MediaSource>> {
    match resource {
        Resource::File(path) => {
            let file = File::open(path)
                .map_err(|e| AudioError::Resource(format!("Failed to open {}: {}", path.display(), e)))?;
            Ok(Box::new(file))
        }
        Resource::Url(url) => {
            let stream = HttpStream::open(http, url).map_err(|e| AudioError::Resource(e.to_string()))?;
            Ok(Box::new(stream))
        }
        Resource::ZipEntry { archive, entry } => {
            let bytes = read_zip_entry(archive, entry)?;
            Ok(Box::new(Cursor::new(bytes)))
        }
        Resource::Memory(bytes) => Ok(Box::new(Cursor::new(bytes.clone()))),
    }
}

/// Entries are usually compressed, so the whole entry is inflated into memory
fn read_zip_entry(archive: &Path, entry: &str) -> Result<Vec<u8>> {
    let file = File::open(archive)
        .map_err(|e| AudioError::Resource(format!("Failed to open {}: {}", archive.display(), e)))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| AudioError::Resource(format!("Invalid archive {}: {}", archive.display(), e)))?;
    let mut member = zip.by_name(entry).map_err(|e| {
        AudioError::Resource(format!("No entry {} in {}: {}", entry, archive.display(), e))
    })?;

    let mut bytes = Vec::with_capacity(member.size() as usize);
    member
        .read_to_end(&mut bytes)
        .map_err(|e| AudioError::Resource(format!("Failed to read {}: {}", entry, e)))?;
    log::debug!("Read {} bytes from {}!{}", bytes.len(), archive.display(), entry);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn archive_with(name: &str, data: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let mut writer = zip::ZipWriter::new(file.as_file_mut());
        writer.start_file(name, SimpleFileOptions::default()).unwrap();
        writer.write_all(data).unwrap();
        writer.finish().unwrap();
        file
    }

    #[test]
    fn missing_file_is_resource_error() {
        let resource = Resource::parse("/definitely/not/here.wav");
        let err = open_media(&resource, &HttpClient::new()).err().unwrap();
        assert!(matches!(err, AudioError::Resource(_)));
    }

    #[test]
    fn memory_resource_reads_back() {
        let resource = Resource::from_bytes(vec![1u8, 2, 3]);
        let mut media = open_media(&resource, &HttpClient::new()).unwrap();
        let mut out = Vec::new();
        media.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
        assert_eq!(media.byte_len(), Some(3));
    }

    #[test]
    fn zip_entry_reads_back() {
        let archive = archive_with("audio/tone.wav", &[9u8, 8, 7, 6]);
        let resource = Resource::zip_entry(archive.path(), "audio/tone.wav");
        let mut media = open_media(&resource, &HttpClient::new()).unwrap();
        let mut out = Vec::new();
        media.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![9, 8, 7, 6]);
    }

    #[test]
    fn missing_zip_entry_is_resource_error() {
        let archive = archive_with("audio/tone.wav", &[0u8; 4]);
        let resource = Resource::zip_entry(archive.path(), "audio/other.wav");
        let err = open_media(&resource, &HttpClient::new()).err().unwrap();
        assert!(matches!(err, AudioError::Resource(_)));

        let resource = Resource::zip_entry("/definitely/not/here.zip", "a.wav");
        let err = open_media(&resource, &HttpClient::new()).err().unwrap();
        assert!(matches!(err, AudioError::Resource(_)));
    }
}
