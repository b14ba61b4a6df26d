//! The Fetch Arena: single-flight, refcounted realization of layer buffers
//! keyed by digest (§4.2).

use crate::buffer::BufferData;
use crate::error::FetchError;
use crate::populate::populate;
use dashmap::DashMap;
use indexer_schema::{Digest, LayerDescription};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tokio::sync::Mutex as AsyncMutex;

/// A realized, independently-seekable handle onto a layer's decompressed
/// content. Cloning is cheap; the underlying buffer is dropped (and its file
/// unlinked or removed) once the last handle anywhere is dropped.
pub type LayerHandle = Arc<BufferData>;

/// One entry per distinct digest. Holding the lock across the `populate`
/// `.await` below is what makes concurrent requests for the same digest
/// single-flight: the second caller blocks on the mutex instead of racing a
/// second fetch (grounded in the "lock held across await" pattern used by
/// content-addressed package caches).
struct Slot {
    buffer: Option<Weak<BufferData>>,
}

struct ArenaInner {
    root: PathBuf,
    slots: DashMap<Digest, Arc<AsyncMutex<Slot>>>,
}

/// Deduplicating, refcounted store of realized layer buffers. Cloning an
/// `Arena` shares the same underlying slot map and root directory.
#[derive(Clone)]
pub struct Arena {
    inner: Arc<ArenaInner>,
}

impl Arena {
    /// `root` must be a directory the process can create and unlink files in;
    /// it holds realized buffers for as long as any caller retains a handle.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ArenaInner {
                root: root.into(),
                slots: DashMap::new(),
            }),
        }
    }

    pub fn root(&self) -> &Path {
        &self.inner.root
    }

    /// Returns a handle to the realized layer named by `description.digest`,
    /// populating it first if no live handle already exists. Concurrent calls
    /// for the same digest share a single fetch (§4.2 "Single-flight
    /// deduplication").
    pub async fn get_or_populate(
        &self,
        description: &LayerDescription,
        client: &reqwest::Client,
    ) -> Result<LayerHandle, FetchError> {
        let slot = self
            .inner
            .slots
            .entry(description.digest.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(Slot { buffer: None })))
            .clone();

        let mut guard = slot.lock().await;

        if let Some(weak) = &guard.buffer {
            if let Some(handle) = weak.upgrade() {
                return Ok(handle);
            }
        }

        let data = populate(&self.inner.root, description, client).await?;
        let handle: LayerHandle = Arc::new(data);
        guard.buffer = Some(Arc::downgrade(&handle));
        Ok(handle)
    }

    /// Forgets every digest this arena knows about. Handles already handed
    /// out keep their buffers alive until dropped, but the arena will not
    /// serve them to new callers afterward — a fresh `get_or_populate` for a
    /// digest that was live a moment ago simply re-fetches (§4.2 "Realizer
    /// (per-request proxy)": "Closing the arena forgets all keys").
    pub fn close(&self) {
        self.inner.slots.clear();
    }

    /// Number of digests this arena currently has a slot for, live or not.
    /// Exposed for tests; not part of the public fetching contract.
    #[cfg(test)]
    pub(crate) fn slot_count(&self) -> usize {
        self.inner.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn digest(n: u8) -> Digest {
        Digest::from_str(&format!("sha256:{}", format!("{n:02x}").repeat(32))).unwrap()
    }

    #[test]
    fn arena_root_matches_construction() {
        let arena = Arena::new("/tmp/indexer-arena-test");
        assert_eq!(arena.root(), Path::new("/tmp/indexer-arena-test"));
    }

    #[test]
    fn cloned_arena_shares_slots() {
        let arena = Arena::new("/tmp/indexer-arena-test");
        let cloned = arena.clone();
        assert_eq!(arena.slot_count(), cloned.slot_count());
    }

    #[test]
    fn distinct_digests_are_distinct_keys() {
        let a = digest(0x01);
        let b = digest(0x02);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn close_forgets_every_slot() {
        let arena = Arena::new("/tmp/indexer-arena-test");
        arena
            .inner
            .slots
            .insert(digest(0x01), Arc::new(AsyncMutex::new(Slot { buffer: None })));
        assert_eq!(arena.slot_count(), 1);
        arena.close();
        assert_eq!(arena.slot_count(), 0);
    }
}
