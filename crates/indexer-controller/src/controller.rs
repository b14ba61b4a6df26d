//! The Controller (§4.6): the manifest indexing state machine. A state is a
//! value, not a subclass — `ControllerState` is a plain enum and the loop in
//! [`Controller::index`] applies one state function per iteration until a
//! terminal state is reached.

use crate::error::ControllerError;
use crate::lock::LockSource;
use indexer_coalesce::{coalesce, EcosystemCoalescer, LayerArtifacts};
use indexer_fetch::{Arena, LayerHandle, Realizer};
use indexer_persist::Persistence;
use indexer_schema::{Digest, IndexReport, LayerDescription, Manifest, ScannerIdentity};
use indexer_scan::{LayerScanner, Scanner};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    CheckManifest,
    FetchLayers,
    ScanLayers,
    Coalesce,
    IndexManifest,
    IndexFinished,
    IndexError,
    Terminal,
}

impl ControllerState {
    pub fn as_str(self) -> &'static str {
        match self {
            ControllerState::CheckManifest => "CheckManifest",
            ControllerState::FetchLayers => "FetchLayers",
            ControllerState::ScanLayers => "ScanLayers",
            ControllerState::Coalesce => "Coalesce",
            ControllerState::IndexManifest => "IndexManifest",
            ControllerState::IndexFinished => "IndexFinished",
            ControllerState::IndexError => "IndexError",
            ControllerState::Terminal => "Terminal",
        }
    }
}

/// Mutable working state threaded through the FSM loop. Not persisted itself;
/// the persisted artifact is the [`IndexReport`] each step updates.
struct StepContext<'a> {
    manifest: &'a Manifest,
    pending_scanners: Vec<ScannerIdentity>,
    unique_layers: Vec<LayerDescription>,
    layer_order: Vec<Digest>,
    handles: Vec<(Digest, LayerHandle)>,
}

/// Owns every collaborator the FSM needs: persistence, the fetch arena, the
/// manifest lock, and the configured scanners/ecosystems. One `Controller`
/// serves any number of concurrent `index` calls; per-manifest serialization
/// comes entirely from `lock_source`.
pub struct Controller {
    persistence: Arc<dyn Persistence>,
    arena: Arena,
    client: reqwest::Client,
    lock_source: Arc<dyn LockSource>,
    scanners: Vec<Arc<dyn Scanner>>,
    ecosystems: Vec<EcosystemCoalescer>,
    fetch_concurrency: usize,
    scan_concurrency: usize,
    step_grace_period: Duration,
}

impl Controller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        persistence: Arc<dyn Persistence>,
        arena: Arena,
        client: reqwest::Client,
        lock_source: Arc<dyn LockSource>,
        scanners: Vec<Arc<dyn Scanner>>,
        ecosystems: Vec<EcosystemCoalescer>,
        fetch_concurrency: usize,
        scan_concurrency: usize,
        step_grace_period: Duration,
    ) -> Self {
        Self {
            persistence,
            arena,
            client,
            lock_source,
            scanners,
            ecosystems,
            fetch_concurrency: fetch_concurrency.max(1),
            scan_concurrency: scan_concurrency.max(1),
            step_grace_period,
        }
    }

    /// Indexes `manifest`, always returning a report in a terminal state
    /// (§7 "An Index Report always returns with a terminal state") — this
    /// method never propagates a `Result` to the caller. Acquires the
    /// manifest lock first (§4.6 "Locking"); the lock is released when this
    /// call returns.
    #[instrument(skip(self, manifest, cancel), fields(manifest = %manifest.digest))]
    pub async fn index(&self, manifest: &Manifest, cancel: &CancellationToken) -> IndexReport {
        let _lock = match self.lock_source.acquire(&manifest.digest).await {
            Ok(guard) => guard,
            Err(err) => {
                let mut report =
                    IndexReport::new(manifest.digest.clone(), ControllerState::IndexError.as_str());
                report.mark_error(
                    ControllerState::Terminal.as_str(),
                    format!("failed to acquire manifest lock: {err}"),
                );
                return report;
            }
        };

        let mut report =
            IndexReport::new(manifest.digest.clone(), ControllerState::CheckManifest.as_str());
        let mut ctx = StepContext {
            manifest,
            pending_scanners: Vec::new(),
            unique_layers: Vec::new(),
            layer_order: Vec::new(),
            handles: Vec::new(),
        };
        let mut state = ControllerState::CheckManifest;

        loop {
            if cancel.is_cancelled() && !matches!(state, ControllerState::IndexError | ControllerState::Terminal)
            {
                report.mark_error(ControllerState::IndexError.as_str(), "request was cancelled");
                state = ControllerState::IndexError;
            }
            report.state = state.as_str().to_owned();

            let next = match self.run_step(state, &mut ctx, &mut report, cancel).await {
                Ok(next) => next,
                Err(err) => {
                    report.mark_error(ControllerState::IndexError.as_str(), err.to_string());
                    ControllerState::IndexError
                }
            };
            self.persist_report_best_effort(&report, cancel).await;

            if next == ControllerState::Terminal {
                break;
            }
            state = next;
        }

        report
    }

    async fn run_step(
        &self,
        state: ControllerState,
        ctx: &mut StepContext<'_>,
        report: &mut IndexReport,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        let child = cancel.child_token();
        let step = async {
            match state {
                ControllerState::CheckManifest => self.step_check_manifest(ctx, report, &child).await,
                ControllerState::FetchLayers => self.step_fetch_layers(ctx, &child).await,
                ControllerState::ScanLayers => self.step_scan_layers(ctx, &child).await,
                ControllerState::Coalesce => self.step_coalesce(ctx, report, &child).await,
                ControllerState::IndexManifest => self.step_index_manifest(report, &child).await,
                ControllerState::IndexFinished => self.step_index_finished(report, &child).await,
                ControllerState::IndexError => Ok(ControllerState::Terminal),
                ControllerState::Terminal => Ok(ControllerState::Terminal),
            }
        };

        match tokio::time::timeout(self.step_grace_period, step).await {
            Ok(result) => result,
            Err(_) => {
                child.cancel();
                Err(ControllerError::Cancelled)
            }
        }
    }

    async fn step_check_manifest(
        &self,
        ctx: &mut StepContext<'_>,
        report: &mut IndexReport,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        let all_scanners: Vec<ScannerIdentity> = self.scanners.iter().map(|s| s.identity()).collect();

        if self
            .persistence
            .manifest_scanned(&ctx.manifest.digest, &all_scanners, cancel)
            .await?
        {
            if let Some(cached) = self
                .persistence
                .index_report(&ctx.manifest.digest, cancel)
                .await?
            {
                *report = cached;
            }
            info!(
                scanned_before = all_scanners.len(),
                scanned_now = 0,
                scanned_total = all_scanners.len(),
                "manifest already fully indexed"
            );
            return Ok(ControllerState::Terminal);
        }

        let mut pending = Vec::new();
        for scanner in &all_scanners {
            let done = self
                .persistence
                .manifest_scanned(&ctx.manifest.digest, std::slice::from_ref(scanner), cancel)
                .await?;
            if !done {
                pending.push(scanner.clone());
            }
        }
        info!(
            scanned_before = all_scanners.len() - pending.len(),
            scanned_now = pending.len(),
            scanned_total = all_scanners.len(),
            "manifest partially indexed"
        );
        ctx.pending_scanners = pending;

        self.persistence.register_scanners(&all_scanners, cancel).await?;
        self.persistence.persist_manifest(ctx.manifest, cancel).await?;

        ctx.unique_layers = ctx
            .manifest
            .unique_layers()
            .into_iter()
            .cloned()
            .collect();
        ctx.layer_order = ctx.unique_layers.iter().map(|l| l.digest.clone()).collect();

        Ok(ControllerState::FetchLayers)
    }

    async fn step_fetch_layers(
        &self,
        ctx: &mut StepContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        if ctx.pending_scanners.is_empty() || ctx.unique_layers.is_empty() {
            return Ok(ControllerState::ScanLayers);
        }

        let mut realizer = Realizer::new(self.arena.clone(), self.client.clone(), self.fetch_concurrency);
        let handles = realizer.realize_all(&ctx.unique_layers, cancel).await?;
        ctx.handles = ctx
            .layer_order
            .iter()
            .cloned()
            .zip(handles)
            .collect();
        realizer.close();
        Ok(ControllerState::ScanLayers)
    }

    async fn step_scan_layers(
        &self,
        ctx: &mut StepContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        if ctx.pending_scanners.is_empty() || ctx.handles.is_empty() {
            return Ok(ControllerState::Coalesce);
        }

        let scanners: Vec<Arc<dyn Scanner>> = self
            .scanners
            .iter()
            .filter(|s| ctx.pending_scanners.contains(&s.identity()))
            .cloned()
            .collect();

        let layer_scanner = LayerScanner::new(self.persistence.clone(), self.scan_concurrency);
        layer_scanner.scan_all(&ctx.handles, &scanners, cancel).await?;
        Ok(ControllerState::Coalesce)
    }

    async fn step_coalesce(
        &self,
        ctx: &mut StepContext<'_>,
        report: &mut IndexReport,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        let mut per_ecosystem: HashMap<String, HashMap<Digest, LayerArtifacts>> = HashMap::new();

        for ecosystem_coalescer in &self.ecosystems {
            let ecosystem = ecosystem_coalescer.ecosystem();
            let mut per_layer = HashMap::new();
            for layer_digest in &ctx.layer_order {
                let packages = self
                    .persistence
                    .packages_by_layer(layer_digest, &ecosystem.package_scanners, cancel)
                    .await?;
                let distributions = self
                    .persistence
                    .distributions_by_layer(layer_digest, &ecosystem.distribution_scanners, cancel)
                    .await?;
                let repositories = self
                    .persistence
                    .repositories_by_layer(layer_digest, &ecosystem.repository_scanners, cancel)
                    .await?;
                per_layer.insert(
                    layer_digest.clone(),
                    LayerArtifacts {
                        packages,
                        distributions,
                        repositories,
                    },
                );
            }
            per_ecosystem.insert(ecosystem.name.as_str().to_owned(), per_layer);
        }

        let fragment_report = coalesce(
            ctx.manifest.digest.clone(),
            &self.ecosystems,
            &ctx.layer_order,
            &per_ecosystem,
        );
        report.packages = fragment_report.packages;
        report.distributions = fragment_report.distributions;
        report.repositories = fragment_report.repositories;
        report.environments = fragment_report.environments;

        Ok(ControllerState::IndexManifest)
    }

    async fn step_index_manifest(
        &self,
        report: &mut IndexReport,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        report.state = ControllerState::IndexManifest.as_str().to_owned();
        self.persistence.set_index_report(report, cancel).await?;
        Ok(ControllerState::IndexFinished)
    }

    async fn step_index_finished(
        &self,
        report: &mut IndexReport,
        cancel: &CancellationToken,
    ) -> Result<ControllerState, ControllerError> {
        report.mark_finished(ControllerState::IndexFinished.as_str());
        let all_scanners: Vec<ScannerIdentity> = self.scanners.iter().map(|s| s.identity()).collect();
        self.persistence
            .set_index_finished(report, &all_scanners, cancel)
            .await?;
        Ok(ControllerState::Terminal)
    }

    async fn persist_report_best_effort(&self, report: &IndexReport, cancel: &CancellationToken) {
        if let Err(err) = self.persistence.set_index_report(report, cancel).await {
            warn!(error = %err, state = %report.state, "failed to persist index report after state transition");
        }
    }
}
