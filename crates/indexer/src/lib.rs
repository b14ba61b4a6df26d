//! The facade crate (§2 item 9): wires the Fetch Arena, Layer Scanner,
//! Coalescer, and Persistence interface into one `Indexer` entry point. A
//! caller plugs in its own `Persistence`, `LockSource`, and scanner catalogue;
//! this crate owns none of those implementations itself.

mod config;

pub use config::{ArenaSection, Config, ConfigError, ControllerSection};

use indexer_coalesce::EcosystemCoalescer;
use indexer_controller::{Controller, LockSource};
use indexer_fetch::Arena;
use indexer_persist::Persistence;
use indexer_schema::{IndexReport, Manifest};
use indexer_scan::Scanner;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// The assembled indexing pipeline. Cheap to clone-by-reference (everything
/// inside is `Arc`-backed or otherwise shareable); typically constructed
/// once per process and reused across requests.
pub struct Indexer {
    controller: Controller,
}

impl Indexer {
    pub fn new(
        config: &Config,
        persistence: Arc<dyn Persistence>,
        lock_source: Arc<dyn LockSource>,
        scanners: Vec<Arc<dyn Scanner>>,
        ecosystems: Vec<EcosystemCoalescer>,
    ) -> Self {
        let scanners = if config.controller.air_gapped {
            scanners.into_iter().filter(|s| !s.is_network()).collect()
        } else {
            scanners
        };

        info!(
            scanners = scanners.len(),
            ecosystems = ecosystems.len(),
            air_gapped = config.controller.air_gapped,
            "assembling indexer"
        );

        let arena = Arena::new(config.arena.root.clone());
        let client = reqwest::Client::new();
        let controller = Controller::new(
            persistence,
            arena,
            client,
            lock_source,
            scanners,
            ecosystems,
            config.arena.fetch_concurrency,
            config.controller.scan_concurrency,
            config.step_grace_period(),
        );
        Self { controller }
    }

    /// Indexes `manifest`, always returning a report in a terminal state.
    pub async fn index(&self, manifest: &Manifest, cancel: &CancellationToken) -> IndexReport {
        info!(manifest = %manifest.digest, layers = manifest.layers.len(), "indexing manifest");
        self.controller.index(manifest, cancel).await
    }
}
