// Error handling for the streaming playback engine

use thiserror::Error;

/// Engine error types
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// Opening a session failed (resource, decoder or output device)
    #[error("Open failed: {0}")]
    OpenFailure(String),

    /// Read/write failure while streaming frames
    #[error("Stream fault: {0}")]
    StreamFault(String),

    /// Operation not valid in the current session status
    #[error("Invalid state: {0}")]
    StateMisuse(String),

    /// Resource could not be resolved into a byte stream
    #[error("Resource error: {0}")]
    Resource(String),

    /// Decoding error
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Audio format not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Device error (hardware issues)
    #[error("Device error: {0}")]
    Device(String),

    /// Network error (download/streaming)
    #[error("Network error: {0}")]
    Network(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),
}

/// Coarse classification used at the session boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OpenFailure,
    StreamFault,
    StateMisuse,
}

impl AudioError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AudioError::StateMisuse(_) => ErrorKind::StateMisuse,
            AudioError::OpenFailure(_)
            | AudioError::Resource(_)
            | AudioError::UnsupportedFormat(_)
            | AudioError::Device(_) => ErrorKind::OpenFailure,
            AudioError::StreamFault(_)
            | AudioError::Decoding(_)
            | AudioError::Network(_)
            | AudioError::Io(_) => ErrorKind::StreamFault,
        }
    }

    /// Wrap a collaborator error raised while opening a session.
    pub(crate) fn into_open_failure(self) -> Self {
        match self {
            AudioError::OpenFailure(_) | AudioError::StateMisuse(_) => self,
            other => AudioError::OpenFailure(other.to_string()),
        }
    }

    /// Wrap a collaborator error raised while frames are moving.
    pub(crate) fn into_stream_fault(self) -> Self {
        match self {
            AudioError::StreamFault(_) | AudioError::StateMisuse(_) => self,
            other => AudioError::StreamFault(other.to_string()),
        }
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::Io(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_errors_map_into_taxonomy() {
        assert_eq!(AudioError::Device("gone".into()).kind(), ErrorKind::OpenFailure);
        assert_eq!(AudioError::Decoding("bad".into()).kind(), ErrorKind::StreamFault);
        assert_eq!(AudioError::StateMisuse("closed".into()).kind(), ErrorKind::StateMisuse);
    }

    #[test]
    fn wrapping_keeps_message() {
        let err = AudioError::Resource("missing.ogg".into()).into_open_failure();
        assert!(matches!(err, AudioError::OpenFailure(ref msg) if msg.contains("missing.ogg")));

        let err = AudioError::Io("broken pipe".into()).into_stream_fault();
        assert!(matches!(err, AudioError::StreamFault(ref msg) if msg.contains("broken pipe")));
    }
}
