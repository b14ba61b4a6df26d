//! Random-access byte sources a [`crate::archive::TarFs`] can be built over.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;

/// A fixed-size, randomly-readable byte source.
pub trait Source: Send + Sync {
    fn len(&self) -> u64;
    fn read_at(&self, offset: u64, len: u64) -> io::Result<Vec<u8>>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An in-memory buffer, useful for tests and small archives.
pub struct InMemorySource(Vec<u8>);

impl InMemorySource {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Source for InMemorySource {
    fn len(&self) -> u64 {
        self.0.len() as u64
    }

    fn read_at(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        let start = offset as usize;
        let end = start
            .checked_add(len as usize)
            .filter(|&e| e <= self.0.len())
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of buffer"))?;
        Ok(self.0[start..end].to_vec())
    }
}

/// A buffer file on disk, reopened by path for every read. This is the
/// backing source the fetch arena's handles give to TarFS: multiple
/// independent readers of the same buffer never share (and therefore never
/// interfere with) a file cursor (§4.2 "Reopen semantics").
pub struct FileSource {
    path: PathBuf,
    len: u64,
}

impl FileSource {
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let len = std::fs::metadata(&path)?.len();
        Ok(Self { path, len })
    }
}

impl Source for FileSource {
    fn len(&self) -> u64 {
        self.len
    }

    fn read_at(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len as usize];
        file.read_exact(&mut buf)?;
        Ok(buf)
    }
}

/// Lets callers that need one concrete `TarFs<_>` type regardless of the
/// underlying source (e.g. a scanner trait object, which can't be generic
/// over `Source` and stay object-safe) erase it behind `Box<dyn Source>`.
impl Source for Box<dyn Source> {
    fn len(&self) -> u64 {
        self.as_ref().len()
    }

    fn read_at(&self, offset: u64, len: u64) -> io::Result<Vec<u8>> {
        self.as_ref().read_at(offset, len)
    }
}
