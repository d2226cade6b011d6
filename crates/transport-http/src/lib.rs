// HTTP transport for streaming audio resources

pub mod client;
pub mod stream;

pub use client::{HttpClient, HttpConfig};
pub use stream::HttpStream;
