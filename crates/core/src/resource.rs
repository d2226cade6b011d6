// Audio resource descriptors

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Where the encoded audio lives
#[derive(Clone, PartialEq, Eq)]
pub enum Resource {
    File(PathBuf),
    Url(String),
    /// A named entry inside a zip archive on disk
    ZipEntry { archive: PathBuf, entry: String },
    Memory(Arc<[u8]>),
}

impl Resource {
    /// Interpret a string as URL, `file://` URI or plain path
    pub fn parse(location: &str) -> Self {
        let lower = location.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            Resource::Url(location.to_string())
        } else if lower.starts_with("file://") {
            Resource::File(file_uri_to_path(location))
        } else {
            Resource::File(PathBuf::from(location))
        }
    }

    pub fn zip_entry(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Resource::ZipEntry {
            archive: archive.into(),
            entry: entry.into(),
        }
    }

    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>) -> Self {
        Resource::Memory(bytes.into())
    }

    /// File extension used as a probe hint
    pub fn extension_hint(&self) -> Option<String> {
        let path = match self {
            Resource::File(path) => path.as_path(),
            Resource::Url(url) => {
                let trimmed = url.split(['?', '#']).next().unwrap_or(url);
                return Path::new(trimmed)
                    .extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.to_ascii_lowercase());
            }
            Resource::ZipEntry { entry, .. } => Path::new(entry),
            Resource::Memory(_) => return None,
        };
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }
}

/// Percent-decode a `file://` URI. Falls back to the raw remainder when the
/// URI has a foreign host or does not parse.
fn file_uri_to_path(location: &str) -> PathBuf {
    url::Url::parse(location)
        .ok()
        .and_then(|uri| uri.to_file_path().ok())
        .unwrap_or_else(|| PathBuf::from(&location["file://".len()..]))
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::File(path) => write!(f, "File({})", path.display()),
            Resource::Url(url) => write!(f, "Url({})", url),
            Resource::ZipEntry { archive, entry } => write!(f, "ZipEntry({}!{})", archive.display(), entry),
            Resource::Memory(bytes) => write!(f, "Memory({} bytes)", bytes.len()),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::File(path) => write!(f, "file {}", path.display()),
            Resource::Url(url) => write!(f, "http {}", url),
            Resource::ZipEntry { archive, entry } => write!(f, "zip {}!{}", archive.display(), entry),
            Resource::Memory(bytes) => write!(f, "buffer of {} bytes", bytes.len()),
        }
    }
}

impl From<PathBuf> for Resource {
    fn from(path: PathBuf) -> Self {
        Resource::File(path)
    }
}

impl From<&Path> for Resource {
    fn from(path: &Path) -> Self {
        Resource::File(path.to_path_buf())
    }
}

impl From<Vec<u8>> for Resource {
    fn from(bytes: Vec<u8>) -> Self {
        Resource::Memory(bytes.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognises_urls_uris_and_paths() {
        assert!(matches!(Resource::parse("https://example.com/a.mp3"), Resource::Url(_)));
        assert!(matches!(Resource::parse("HTTP://example.com/a.mp3"), Resource::Url(_)));
        match Resource::parse("file:///music/track.flac") {
            Resource::File(path) => assert_eq!(path, PathBuf::from("/music/track.flac")),
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(Resource::parse("song.ogg"), Resource::File(_)));
    }

    #[cfg(unix)]
    #[test]
    fn file_uri_is_percent_decoded() {
        match Resource::parse("file:///music/My%20Song%23live.flac") {
            Resource::File(path) => assert_eq!(path, PathBuf::from("/music/My Song#live.flac")),
            other => panic!("unexpected {:?}", other),
        }
        let hint = Resource::parse("FILE:///music/Caf%C3%A9.OGG").extension_hint();
        assert_eq!(hint.as_deref(), Some("ogg"));
    }

    #[test]
    fn zip_entry_hints_from_entry_name() {
        let resource = Resource::zip_entry("/sounds/pack.zip", "sfx/click.WAV");
        assert_eq!(resource.extension_hint().as_deref(), Some("wav"));
        assert_eq!(resource.to_string(), "zip /sounds/pack.zip!sfx/click.WAV");
        assert!(!matches!(Resource::parse("/sounds/pack.zip"), Resource::ZipEntry { .. }));
    }

    #[test]
    fn extension_hint_ignores_query() {
        let url = Resource::parse("https://cdn.example.com/ep/12.M4A?token=abc");
        assert_eq!(url.extension_hint().as_deref(), Some("m4a"));
        assert_eq!(Resource::parse("/tmp/x.WAV").extension_hint().as_deref(), Some("wav"));
        assert_eq!(Resource::from_bytes(vec![0u8; 4]).extension_hint(), None);
    }
}
