//! Per-request realization: bounded-parallelism batch fetch over an [`Arena`],
//! plus an explicit close that releases this request's handles without
//! disturbing the arena itself (§4.2 "Batch realization").

use crate::arena::{Arena, LayerHandle};
use crate::error::FetchError;
use futures::future::try_join_all;
use indexer_schema::LayerDescription;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Bounds how many layers a single [`Realizer::realize_all`] call fetches
/// concurrently. The arena itself has no such limit; this is a per-request
/// courtesy to the upstream registry.
pub struct Realizer {
    arena: Arena,
    client: reqwest::Client,
    concurrency: usize,
    handles: Vec<LayerHandle>,
}

impl Realizer {
    pub fn new(arena: Arena, client: reqwest::Client, concurrency: usize) -> Self {
        Self {
            arena,
            client,
            concurrency: concurrency.max(1),
            handles: Vec::new(),
        }
    }

    /// Realizes every layer in `descriptions`, in order, fanning out up to
    /// `concurrency` fetches at a time. On the first failure, `cancel` is
    /// triggered so sibling scans waiting on this batch can stop promptly;
    /// in-flight fetches are left to finish (the arena has already committed
    /// to them) but no further ones are started.
    #[instrument(skip(self, descriptions, cancel), fields(count = descriptions.len()))]
    pub async fn realize_all(
        &mut self,
        descriptions: &[LayerDescription],
        cancel: &CancellationToken,
    ) -> Result<Vec<LayerHandle>, FetchError> {
        let semaphore = Semaphore::new(self.concurrency);
        let arena = &self.arena;
        let client = &self.client;

        let futures = descriptions.iter().map(|description| {
            let semaphore = &semaphore;
            async move {
                if cancel.is_cancelled() {
                    return Err(FetchError::Cancelled);
                }
                let _permit = semaphore
                    .acquire()
                    .await
                    .expect("semaphore is never closed");
                let result = arena.get_or_populate(description, client).await;
                if result.is_err() {
                    cancel.cancel();
                }
                result
            }
        });

        let handles = try_join_all(futures).await?;
        info!(realized = handles.len(), "layer batch realized");
        self.handles.extend(handles.iter().cloned());
        Ok(handles)
    }

    /// Drops every handle this realizer is holding. The arena may continue to
    /// serve the same buffers to other callers until their own handles drop.
    pub fn close(self) {
        drop(self.handles);
    }
}
