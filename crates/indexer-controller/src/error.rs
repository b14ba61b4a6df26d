use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("fetch error: {0}")]
    Fetch(#[from] indexer_fetch::FetchError),
    #[error("scan error: {0}")]
    Scan(#[from] indexer_scan::ScanError),
    #[error("persistence error: {0}")]
    Persist(#[from] indexer_persist::PersistError),
    #[error("failed to acquire manifest lock: {0}")]
    Lock(String),
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
    #[error("step exceeded its grace period and was cancelled")]
    Cancelled,
}
