//! The Persistence interface (§6.5): every operation the controller and the
//! layer scanner consume from the relational store. This crate defines the
//! contract and ships a test-only in-memory implementation (`memory`); the
//! real relational store is an external collaborator (§1).

use crate::error::PersistError;
use async_trait::async_trait;
use indexer_schema::{Digest, Distribution, IndexReport, Manifest, Package, Repository, ScannerIdentity};
use tokio_util::sync::CancellationToken;

/// An artifact plus the id persistence assigned it, as returned by the
/// `*ByLayer` queries.
pub type Indexed<T> = (String, T);

#[async_trait]
pub trait Persistence: Send + Sync {
    /// True iff `manifest_digest` has been scanned by every scanner in `scanners`.
    async fn manifest_scanned(
        &self,
        manifest_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<bool, PersistError>;

    async fn layer_scanned(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        cancel: &CancellationToken,
    ) -> Result<bool, PersistError>;

    async fn set_layer_scanned(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    /// Records a manifest's identity and its ordered layer list.
    async fn persist_manifest(
        &self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn index_packages(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        packages: Vec<Package>,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn index_distributions(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        distributions: Vec<Distribution>,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn index_repositories(
        &self,
        layer_digest: &Digest,
        scanner: &ScannerIdentity,
        repositories: Vec<Repository>,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn packages_by_layer(
        &self,
        layer_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<Vec<Indexed<Package>>, PersistError>;

    async fn distributions_by_layer(
        &self,
        layer_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<Vec<Indexed<Distribution>>, PersistError>;

    async fn repositories_by_layer(
        &self,
        layer_digest: &Digest,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<Vec<Indexed<Repository>>, PersistError>;

    async fn set_index_report(
        &self,
        report: &IndexReport,
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn index_report(
        &self,
        manifest_digest: &Digest,
        cancel: &CancellationToken,
    ) -> Result<Option<IndexReport>, PersistError>;

    async fn set_index_finished(
        &self,
        report: &IndexReport,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn register_scanners(
        &self,
        scanners: &[ScannerIdentity],
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;

    async fn delete_manifests(
        &self,
        digests: &[Digest],
        cancel: &CancellationToken,
    ) -> Result<(), PersistError>;
}

pub(crate) fn check_cancelled(cancel: &CancellationToken) -> Result<(), PersistError> {
    if cancel.is_cancelled() {
        Err(PersistError::Cancelled)
    } else {
        Ok(())
    }
}
