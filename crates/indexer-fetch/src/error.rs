use indexer_schema::Digest;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid layer description: {0}")]
    InvalidDescription(String),
    #[error("fetch failed with status {status}: {body_snippet}")]
    Http { status: u16, body_snippet: String },
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("declared content-type and magic bytes disagree about compression")]
    ContentTypeMismatch,
    #[error("unsupported layer content type: {0}")]
    UnsupportedMediaType(String),
    #[error("fetched bytes do not match declared digest: expected {expected}, got {actual}")]
    DigestMismatch { expected: Digest, actual: Digest },
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("operation was cancelled")]
    Cancelled,
}
