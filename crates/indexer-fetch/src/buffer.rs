//! The realized layer buffer: a single on-disk file, unlinked immediately
//! after creation where the platform supports it, reopened independently by
//! path for every reader (§4.2 "Storage model", "Reopen semantics").

use std::fs::File;
use std::io;
use std::path::PathBuf;

/// A refcounted-by-`Arc` realized layer buffer. The last `Arc<BufferData>`
/// to drop runs [`Drop`], which deletes the backing file if it is still
/// linked (§9 "Refcounting without a GC" — here, `Arc`'s own strong count
/// *is* the refcount, and `Drop` *is* the close hook).
pub struct BufferData {
    file: File,
    path: PathBuf,
    unlinked: bool,
}

impl BufferData {
    pub(crate) fn new(file: File, path: PathBuf) -> Self {
        let unlinked = unlink_after_create(&path);
        Self {
            file,
            path,
            unlinked,
        }
    }

    /// A path that, when opened fresh, yields an independent file
    /// description over the same underlying buffer content — even after the
    /// original path has been unlinked.
    #[cfg(target_os = "linux")]
    fn reopen_path(&self) -> PathBuf {
        if self.unlinked {
            use std::os::unix::io::AsRawFd;
            PathBuf::from(format!("/proc/self/fd/{}", self.file.as_raw_fd()))
        } else {
            self.path.clone()
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn reopen_path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Opens an independent, seekable handle onto this buffer's content.
    pub fn reopen(&self) -> io::Result<File> {
        File::open(self.reopen_path())
    }

    /// A [`indexer_tarfs::Source`] backed by this buffer, suitable for
    /// handing directly to [`indexer_tarfs::TarFs::new`].
    pub fn tarfs_source(&self) -> io::Result<indexer_tarfs::FileSource> {
        indexer_tarfs::FileSource::open(self.reopen_path())
    }
}

impl Drop for BufferData {
    fn drop(&mut self) {
        if !self.unlinked {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[cfg(unix)]
fn unlink_after_create(path: &PathBuf) -> bool {
    std::fs::remove_file(path).is_ok()
}

#[cfg(not(unix))]
fn unlink_after_create(_path: &PathBuf) -> bool {
    false
}
