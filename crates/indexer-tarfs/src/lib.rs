//! A read-only filesystem view over a (possibly decompressed) tar byte
//! stream, accessed via random-access reads. This is the filesystem every
//! scanner is handed for a realized layer (§4.1).

pub mod archive;
pub mod entry;
pub mod error;
pub mod glob;
pub mod path;
pub mod source;

pub use archive::{DirEntry, Stat, TarFs};
pub use entry::{Entry, EntryKind};
pub use error::TarFsError;
pub use source::{FileSource, InMemorySource, Source};
