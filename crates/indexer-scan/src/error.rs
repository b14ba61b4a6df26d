use indexer_schema::ScannerIdentity;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("scanner {scanner:?} failed: {source}")]
    Scanner {
        scanner: ScannerIdentity,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("persistence error: {0}")]
    Persist(#[from] indexer_persist::PersistError),
    #[error("filesystem error: {0}")]
    TarFs(#[from] indexer_tarfs::TarFsError),
    #[error("operation was cancelled")]
    Cancelled,
}
