use thiserror::Error;

#[derive(Debug, Error)]
pub enum TarFsError {
    #[error("failed to read tar archive: {0}")]
    Truncated(#[from] std::io::Error),
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("not a directory: {0}")]
    NotADirectory(String),
    #[error("not a regular file: {0}")]
    NotAFile(String),
    #[error("symlink cycle detected while resolving: {0}")]
    SymlinkCycle(String),
    #[error("symlink target missing: {0}")]
    DanglingSymlink(String),
}
