// Audio decoding using Symphonia

mod demux;
mod opener;
mod resolve;
mod source;

pub use demux::{Demuxer, TrackInfo};
pub use opener::SymphoniaOpener;
pub use resolve::open_media;
pub use source::SymphoniaSource;
