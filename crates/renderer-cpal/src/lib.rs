// Output sink backed by cpal

mod convert;
mod sink;

pub use convert::pcm_to_f32;
pub use sink::{CpalSink, CpalSinkProvider, SinkConfig};
