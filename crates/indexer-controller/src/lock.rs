//! An abstract system-wide lock keyed on the manifest digest (§4.6
//! "Locking"). Generalizes a blocking-lock-with-Drop-release pattern
//! (blocking `fs2` exclusive lock, released on `Drop`) into an async-facing
//! trait so two concurrent requests for the same manifest serialize.

use async_trait::async_trait;
use fs2::FileExt;
use indexer_schema::Digest;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::PathBuf;

/// A held lock. Dropping it releases the lock; there is no explicit release
/// method because "release on controller exit" (§4.6) is exactly what
/// `Drop` gives for free.
pub trait LockGuard: Send {}

#[async_trait]
pub trait LockSource: Send + Sync {
    /// Blocks until the lock for `key` is held. Two concurrent callers for
    /// the same key serialize; callers for distinct keys never block each
    /// other.
    async fn acquire(&self, key: &Digest) -> io::Result<Box<dyn LockGuard>>;
}

/// File-backed lock source, one lock file per manifest digest under `root`.
/// The blocking `fs2` call runs on a blocking-pool thread via
/// `tokio::task::spawn_blocking` so it never stalls the async runtime.
pub struct FileLockSource {
    root: PathBuf,
}

impl FileLockSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

struct FileLockGuard {
    #[allow(dead_code)]
    file: File,
}

impl LockGuard for FileLockGuard {}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[async_trait]
impl LockSource for FileLockSource {
    async fn acquire(&self, key: &Digest) -> io::Result<Box<dyn LockGuard>> {
        let root = self.root.clone();
        let file_name = format!("{}.lock", key.as_hex());
        tokio::task::spawn_blocking(move || {
            std::fs::create_dir_all(&root)?;
            let path = root.join(file_name);
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&path)?;
            file.lock_exclusive()?;
            Ok(Box::new(FileLockGuard { file }) as Box<dyn LockGuard>)
        })
        .await
        .expect("lock acquisition task panicked")
    }
}
