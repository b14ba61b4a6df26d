//! The Scanner Contract (§4.3): a named, versioned, kind-tagged analyzer of
//! one realized layer. Grounded on the `Adapter`/`PackResolver`-style
//! trait-object plugin shape used elsewhere in the pack
//! (`greentic-runner-host::engine::registry::Adapter`).

use crate::error::ScanError;
use async_trait::async_trait;
use indexer_schema::{Distribution, Package, Repository, ScannerIdentity};
use indexer_tarfs::{Source, TarFs};
use tokio_util::sync::CancellationToken;

/// The filesystem every scanner is handed: a realized, decompressed layer
/// reopened from the fetch arena's buffer. Source-erased so the trait stays
/// object-safe — production layers are backed by `FileSource`, tests may use
/// `InMemorySource`, both boxed to the same `Box<dyn Source>`.
pub type LayerFs = TarFs<Box<dyn Source>>;

/// Artifacts produced by one `Scan` call. A well-behaved scanner only ever
/// returns the variant matching its own `identity().kind`.
#[derive(Debug, Clone)]
pub enum ScannedArtifacts {
    Packages(Vec<Package>),
    Distributions(Vec<Distribution>),
    Repositories(Vec<Repository>),
}

impl ScannedArtifacts {
    pub fn is_empty(&self) -> bool {
        match self {
            ScannedArtifacts::Packages(v) => v.is_empty(),
            ScannedArtifacts::Distributions(v) => v.is_empty(),
            ScannedArtifacts::Repositories(v) => v.is_empty(),
        }
    }
}

/// A named, versioned analyzer producing artifacts of one kind from a layer.
/// Implementations must:
/// - return an empty list with no error when the target is absent (§4.3);
/// - be safe for concurrent invocation on distinct layers;
/// - never mutate the layer, treating it solely as a filesystem.
#[async_trait]
pub trait Scanner: Send + Sync {
    fn identity(&self) -> ScannerIdentity;

    /// Whether this scanner may make outbound HTTP calls. Queried by
    /// `Indexer::new` to exclude network scanners when the indexer is
    /// configured air-gapped — a capability flag on the object-safe trait
    /// rather than a separate marker trait, so a heterogeneous
    /// `Vec<Arc<dyn Scanner>>` can be filtered without downcasting.
    fn is_network(&self) -> bool {
        false
    }

    async fn scan(
        &self,
        layer: &LayerFs,
        cancel: &CancellationToken,
    ) -> Result<ScannedArtifacts, ScanError>;
}
