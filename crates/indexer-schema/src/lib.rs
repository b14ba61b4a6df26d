//! Data model shared by every crate in the indexer workspace: digests,
//! manifests, scanner identities, artifact records, the Index Report, and the
//! state identifier exposed by the controller's `GET /index_state` collaborator.

pub mod artifact;
pub mod digest;
pub mod manifest;
pub mod report;
pub mod scanner;
pub mod state_id;
pub mod types;

pub use artifact::{Distribution, Environment, Package, PackageKind, Repository};
pub use digest::{Algorithm, Digest, DigestError, Hasher};
pub use manifest::{LayerDescription, Manifest};
pub use report::IndexReport;
pub use scanner::{ScannerIdentity, ScannerKind};
pub use state_id::state_identifier;
pub use types::{EcosystemName, ScannerName, ScannerVersion};
