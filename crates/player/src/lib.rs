// Streaming audio player: symphonia decoding into a cpal output line

use std::ops::Deref;
use std::path::Path;
use std::sync::{Arc, Once};
use streamed_core::{Resource, SessionConfig, StreamingSession};
use streamed_decode_symphonia::SymphoniaOpener;
use streamed_renderer_cpal::{CpalSinkProvider, SinkConfig};
use streamed_transport_http::{HttpClient, HttpConfig};

pub use streamed_core::{
    AudioError, AudioEvent, AudioListener, ErrorKind, FrameFormat, ListenerId, LoopCount, Result, Status,
};

static INIT_LOGGER: Once = Once::new();

/// Install `env_logger` at `info`, overridable through `RUST_LOG`. Safe to call repeatedly.
pub fn init_logging() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::builder()
            .is_test(false)
            .filter_level(log::LevelFilter::Info)
            .parse_default_env()
            .try_init();
    });
}

/// Settings for every layer of a player
#[derive(Debug, Clone, Default)]
pub struct PlayerOptions {
    pub session: SessionConfig,
    pub sink: SinkConfig,
    pub http: HttpConfig,
}

/// A streaming session over one resource, decoded by symphonia and played through cpal
///
/// Constructors do not touch the resource or the device; call `open` first.
/// All session operations are available through `Deref`.
pub struct StreamedAudio {
    resource: Resource,
    session: StreamingSession,
}

impl StreamedAudio {
    pub fn from_resource(resource: Resource) -> Self {
        Self::with_options(resource, PlayerOptions::default())
    }

    pub fn with_options(resource: Resource, options: PlayerOptions) -> Self {
        init_logging();
        let opener = SymphoniaOpener::with_client(resource.clone(), HttpClient::with_config(options.http));
        let session = StreamingSession::with_config(
            Arc::new(opener),
            Arc::new(CpalSinkProvider::new(options.sink)),
            options.session,
        );
        log::debug!("Created player for {}", resource);
        Self { resource, session }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_resource(Resource::File(path.as_ref().to_path_buf()))
    }

    pub fn from_url(url: impl Into<String>) -> Self {
        Self::from_resource(Resource::Url(url.into()))
    }

    /// A URL, `file://` URI or plain path
    pub fn from_uri(uri: &str) -> Self {
        Self::from_resource(Resource::parse(uri))
    }

    /// The entry named `entry` inside the zip archive at `archive`
    pub fn from_zip_entry(archive: impl AsRef<Path>, entry: impl Into<String>) -> Self {
        Self::from_resource(Resource::zip_entry(archive.as_ref(), entry))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_resource(Resource::from_bytes(bytes.into()))
    }

    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn session(&self) -> &StreamingSession {
        &self.session
    }
}

impl Deref for StreamedAudio {
    type Target = StreamingSession;

    fn deref(&self) -> &StreamingSession {
        &self.session
    }
}
