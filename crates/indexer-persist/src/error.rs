use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("persistence operation failed: {0}")]
    Transient(String),
    #[error("operation was cancelled")]
    Cancelled,
}
