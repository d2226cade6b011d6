// Core types and traits for the streamed audio engine

pub mod callback;
pub mod config;
pub mod error;
pub mod format;
pub mod resource;
pub mod session;
pub mod source;
pub mod state;

mod seek;
mod worker;

// Re-export commonly used types
pub use callback::{AudioEvent, AudioListener, EventDispatcher, ListenerId};
pub use config::SessionConfig;
pub use error::{AudioError, ErrorKind, Result};
pub use format::FrameFormat;
pub use resource::Resource;
pub use session::StreamingSession;
pub use source::{DecodedSource, OutputSink, SinkProvider, SourceOpener};
pub use state::{LoopCount, PlaybackState, Status};
