//! `InMemoryPersistence`: a `parking_lot::Mutex`-guarded nested-map
//! implementation of [`crate::Persistence`], used by this crate's own tests
//! and the controller's integration tests (§6.5). Grounded on
//! `greentic-runner-host`'s `InMemorySessionHost`/`InMemoryStateHost` shim
//! pattern: a single mutex around a plain struct of collections, not a
//! concurrent map, since nothing here needs finer-grained locking than "one
//! request's state transition at a time."

use crate::error::PersistError;
use crate::interface::{check_cancelled, Indexed, Persistence};
use async_trait::async_trait;
use indexer_schema::{Digest, Distribution, IndexReport, Manifest, Package, Repository, ScannerIdentity};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use tokio_util::sync::CancellationToken;

type LayerScannerKey = (Digest, ScannerIdentity);

#[derive(Default)]
struct State {
    manifests: BTreeMap<Digest, Manifest>,
    registered_scanners: BTreeSet<ScannerIdentity>,
    manifest_finished_scanners: BTreeSet<(Digest, ScannerIdentity)>,
    layer_scanned: BTreeSet<LayerScannerKey>,
    packages: BTreeMap<LayerScannerKey, Vec<(String, Package)>>,
    distributions: BTreeMap<LayerScannerKey, Vec<(String, Distribution)>>,
    repositories: BTreeMap<LayerScannerKey, Vec<(String, Repository)>>,
    reports: BTreeMap<Digest, IndexReport>,
}

/// Relational-shaped, in-process store. Not persistent across runs; a test
/// fixture and reference implementation, not a production backend.
#[derive(Default)]
pub struct InMemoryPersistence {
    state: Mutex<State>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

fn package_id(p: &Package) -> String {
    format!("{}@{}:{:?}:{}:{}", p.name, p.version, p.kind, p.arch, p.package_db)
}

fn distribution_id(d: &Distribution) -> String {
    format!("{}:{}", d.id, d.version)
}

fn repository_id(r: &Repository) -> String {
    format!("{}:{}", r.name, r.uri.as_deref().unwrap_or(""))
}

fn upsert<T>(existing: &mut Vec<(String, T)>, fresh: Vec<T>, id_of: impl Fn(&T) -> String) {
    for item in fresh {
        let id = id_of(&item);
        if let Some(slot) = existing.iter_mut().find(|(existing_id, _)| *existing_id == id) {
            slot.1 = item;
        } else {
            existing.push((id, item));
        }
    }
}

fn by_layer<T: Clone>(
    table: &BTreeMap<LayerScannerKey, Vec<(String, T)>>,
    layer_digest: &Digest,
    scanners: &[ScannerIdentity],
) -> Vec<(String, T)> {
    let mut out = Vec::new();
    for scanner in scanners {
        if let Some(entries) = table.get(&(layer_digest.clone(), scanner.clone())) {
            out.extend(entries.iter().cloned());
        }
    }
    out
}

#[async_trait]
impl Persistence for InMemoryPersistence {
    async fn manifest_scanned(
        &self,
        manifest_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<bool, PersistError> {
        check_cancelled(cancel)?;
        let state = self.state.lock();
        Ok(scanners
            .iter()
            .all(|s| state.manifest_finished_scanners.contains(&(manifest_digest.clone(), s.clone()))))
    }

    async fn layer_scanned(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        cancel: &CancellationToken,
    ) -> Result<bool, PersistError> {
        check_cancelled(cancel)?;
        let state = self.state.lock();
        Ok(state.layer_scanned.contains(&(layer_digest.clone(), scanner.clone())))
    }

    async fn set_layer_scanned(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        self.state
            .lock()
            .layer_scanned
            .insert((layer_digest.clone(), scanner.clone()));
        Ok(())
    }

    async fn persist_manifest(
        &self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        self.state
            .lock()
            .manifests
            .insert(manifest.digest.clone(), manifest.clone());
        Ok(())
    }

    async fn index_packages(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        packages: Vec<Package>,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        let mut state = self.state.lock();
        let entry = state
            .packages
            .entry((layer_digest.clone(), scanner.clone()))
            .or_default();
        upsert(entry, packages, package_id);
        Ok(())
    }

    async fn index_distributions(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        distributions: Vec<Distribution>,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        let mut state = self.state.lock();
        let entry = state
            .distributions
            .entry((layer_digest.clone(), scanner.clone()))
            .or_default();
        upsert(entry, distributions, distribution_id);
        Ok(())
    }

    async fn index_repositories(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        repositories: Vec<Repository>,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        let mut state = self.state.lock();
        let entry = state
            .repositories
            .entry((layer_digest.clone(), scanner.clone()))
            .or_default();
        upsert(entry, repositories, repository_id);
        Ok(())
    }

    async fn packages_by_layer(
        &self,
        layer_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<Vec<Indexed<Package>>, PersistError> {
        check_cancelled(cancel)?;
        let state = self.state.lock();
        Ok(by_layer(&state.packages, layer_digest, scanners))
    }

    async fn distributions_by_layer(
        &self,
        layer_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<Vec<Indexed<Distribution>>, PersistError> {
        check_cancelled(cancel)?;
        let state = self.state.lock();
        Ok(by_layer(&state.distributions, layer_digest, scanners))
    }

    async fn repositories_by_layer(
        &self,
        layer_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<Vec<Indexed<Repository>>, PersistError> {
        check_cancelled(cancel)?;
        let state = self.state.lock();
        Ok(by_layer(&state.repositories, layer_digest, scanners))
    }

    async fn set_index_report(
        &self,
        report: &IndexReport,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        self.state
            .lock()
            .reports
            .insert(report.manifest_digest.clone(), report.clone());
        Ok(())
    }

    async fn index_report(
        &self,
        manifest_digest: &Digest,
        cancel: &CancellationToken,
    ) -> Result<Option<IndexReport>, PersistError> {
        check_cancelled(cancel)?;
        Ok(self.state.lock().reports.get(manifest_digest).cloned())
    }

    async fn set_index_finished(
        &self,
        report: &IndexReport,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        let mut state = self.state.lock();
        state.reports.insert(report.manifest_digest.clone(), report.clone());
        for scanner in scanners {
            state
                .manifest_finished_scanners
                .insert((report.manifest_digest.clone(), scanner.clone()));
        }
        Ok(())
    }

    async fn register_scanners(
        &self,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        let mut state = self.state.lock();
        state.registered_scanners.extend(scanners.iter().cloned());
        Ok(())
    }

    async fn delete_manifests(
        &self,
        digests: &[Digest],
        cancel: &CancellationToken,
    ) -> Result<(), PersistError> {
        check_cancelled(cancel)?;
        let mut state = self.state.lock();
        for digest in digests {
            state.manifests.remove(digest);
            state.reports.remove(digest);
            state.manifest_finished_scanners.retain(|(m, _)| m != digest);
            state.layer_scanned.retain(|(l, _)| l != digest);
            state.packages.retain(|(l, _), _| l != digest);
            state.distributions.retain(|(l, _), _| l != digest);
            state.repositories.retain(|(l, _), _| l != digest);
        }
        Ok(())
    }
}
