//! The Layer Scanner (§4.4): runs every `(layer, scanner)` pair not already
//! recorded as scanned, over a bounded worker pool, cancelling siblings on
//! the first failure.

use crate::error::ScanError;
use crate::scanner::{LayerFs, Scanner, ScannedArtifacts};
use futures::future::try_join_all;
use indexer_fetch::LayerHandle;
use indexer_persist::Persistence;
use indexer_schema::Digest;
use indexer_tarfs::{Source, TarFs};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Fans `(layer, scanner)` pairs out over a semaphore-bounded pool. Default
/// concurrency is the process's configured parallelism (§5 "Bounded
/// parallelism"); this type does not pick a default itself.
pub struct LayerScanner {
    persistence: Arc<dyn Persistence>,
    concurrency: usize,
}

impl LayerScanner {
    pub fn new(persistence: Arc<dyn Persistence>, concurrency: usize) -> Self {
        Self {
            persistence,
            concurrency: concurrency.max(1),
        }
    }

    /// Scans every unique layer against every configured scanner. The first
    /// failing pair cancels `cancel`; in-flight pairs are left to finish
    /// (they've already committed to persistence side effects idempotently),
    /// but no further pairs are started once cancellation is observed.
    #[instrument(skip_all, fields(layers = layers.len(), scanners = scanners.len()))]
    pub async fn scan_all(
        &self,
        layers: &[(Digest, LayerHandle)],
        scanners: &[Arc<dyn Scanner>],
        cancel: &CancellationToken,
    ) -> Result<(), ScanError> {
        // One TarFs parse per layer, shared across every scanner for that
        // layer, rather than re-parsing the tar once per (layer, scanner) pair.
        let mut parsed = Vec::with_capacity(layers.len());
        for (digest, handle) in layers {
            let opened = handle
                .tarfs_source()
                .map_err(indexer_tarfs::TarFsError::from)?;
            let source: Box<dyn Source> = Box::new(opened);
            parsed.push((digest.clone(), Arc::new(TarFs::new(source)?)));
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let pairs: Vec<_> = parsed
            .iter()
            .flat_map(|(digest, fs)| {
                scanners
                    .iter()
                    .map(move |scanner| (digest.clone(), fs.clone(), scanner.clone()))
            })
            .collect();

        let total = pairs.len();
        let futures = pairs.into_iter().map(|(digest, layer_fs, scanner)| {
            let persistence = self.persistence.clone();
            let semaphore = semaphore.clone();
            let cancel = cancel.clone();
            async move {
                if cancel.is_cancelled() {
                    return Err(ScanError::Cancelled);
                }
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .expect("semaphore is never closed");
                let result = scan_pair(
                    persistence.as_ref(),
                    &digest,
                    layer_fs.as_ref(),
                    scanner.as_ref(),
                    &cancel,
                )
                .await;
                if result.is_err() {
                    cancel.cancel();
                }
                result
            }
        });

        try_join_all(futures).await?;
        info!(pairs = total, "layer scan complete");
        Ok(())
    }
}

async fn scan_pair(
    persistence: &dyn Persistence,
    layer_digest: &Digest,
    layer_fs: &LayerFs,
    scanner: &dyn Scanner,
    cancel: &CancellationToken,
) -> Result<(), ScanError> {
    let identity = scanner.identity();

    if persistence
        .layer_scanned(layer_digest, &identity, cancel)
        .await?
    {
        return Ok(());
    }

    let artifacts = scanner.scan(layer_fs, cancel).await?;

    match artifacts {
        ScannedArtifacts::Packages(packages) => {
            persistence
                .index_packages(layer_digest, &identity, packages, cancel)
                .await?;
        }
        ScannedArtifacts::Distributions(distributions) => {
            persistence
                .index_distributions(layer_digest, &identity, distributions, cancel)
                .await?;
        }
        ScannedArtifacts::Repositories(repositories) => {
            persistence
                .index_repositories(layer_digest, &identity, repositories, cancel)
                .await?;
        }
    }

    // Marked AFTER successful result persistence: retries after a crash here
    // redo the scan and re-persist (idempotent), never skip it (§4.4).
    persistence
        .set_layer_scanned(layer_digest, &identity, cancel)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use indexer_persist::{InMemoryPersistence, Persistence};
    use indexer_schema::{Package, PackageKind, ScannerIdentity, ScannerKind};
    use indexer_tarfs::InMemorySource;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingScanner {
        identity: ScannerIdentity,
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Scanner for CountingScanner {
        fn identity(&self) -> ScannerIdentity {
            self.identity.clone()
        }

        async fn scan(
            &self,
            _layer: &LayerFs,
            _cancel: &CancellationToken,
        ) -> Result<ScannedArtifacts, ScanError> {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            Ok(ScannedArtifacts::Packages(vec![Package {
                name: "foo".to_owned(),
                version: "1.0".to_owned(),
                kind: PackageKind::Binary,
                arch: "amd64".to_owned(),
                package_db: "var/lib/dpkg/status".to_owned(),
                source_package: None,
                repository_hint: None,
                module: None,
            }]))
        }
    }

    fn digest(n: u8) -> Digest {
        Digest::from_str(&format!("sha256:{}", format!("{n:02x}").repeat(32))).unwrap()
    }

    fn empty_layer_fs() -> LayerFs {
        let source: Box<dyn Source> = Box::new(InMemorySource::new(vec![0u8; 1024]));
        TarFs::new(source).unwrap()
    }

    async fn run_pair(
        persistence: &dyn Persistence,
        layer_digest: &Digest,
        scanner: &dyn Scanner,
    ) -> Result<(), ScanError> {
        let layer_fs = empty_layer_fs();
        let cancel = CancellationToken::new();
        scan_pair(persistence, layer_digest, &layer_fs, scanner, &cancel).await
    }

    #[tokio::test]
    async fn first_scan_invokes_scanner_and_marks_scanned() {
        let persistence = InMemoryPersistence::new();
        let invocations = Arc::new(AtomicUsize::new(0));
        let identity = ScannerIdentity::new("dpkg", ScannerKind::Package, "1.0.0");
        let scanner = CountingScanner {
            identity: identity.clone(),
            invocations: invocations.clone(),
        };
        let layer_digest = digest(1);

        run_pair(&persistence, &layer_digest, &scanner).await.unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        let cancel = CancellationToken::new();
        assert!(persistence
            .layer_scanned(&layer_digest, &identity, &cancel)
            .await
            .unwrap());
        let packages = persistence
            .packages_by_layer(&layer_digest, std::slice::from_ref(&identity), &cancel)
            .await
            .unwrap();
        assert_eq!(packages.len(), 1);
    }

    #[tokio::test]
    async fn second_scan_of_an_already_scanned_pair_invokes_scanner_zero_times() {
        let persistence = InMemoryPersistence::new();
        let invocations = Arc::new(AtomicUsize::new(0));
        let identity = ScannerIdentity::new("dpkg", ScannerKind::Package, "1.0.0");
        let scanner = CountingScanner {
            identity: identity.clone(),
            invocations: invocations.clone(),
        };
        let layer_digest = digest(2);

        run_pair(&persistence, &layer_digest, &scanner).await.unwrap();
        run_pair(&persistence, &layer_digest, &scanner).await.unwrap();

        assert_eq!(invocations.load(Ordering::SeqCst), 1);
    }
}
