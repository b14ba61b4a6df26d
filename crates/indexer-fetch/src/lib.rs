//! The Fetch Arena (§4.2): content-addressed, single-flight, refcounted
//! realization of container image layers into seekable local buffers.

mod arena;
mod buffer;
mod compression;
mod error;
mod populate;
mod realizer;

pub use arena::{Arena, LayerHandle};
pub use buffer::BufferData;
pub use compression::Compression;
pub use error::FetchError;
pub use realizer::Realizer;
