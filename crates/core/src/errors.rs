use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("project name must not be empty")]
    EmptyName,
    #[error("a project archive file is required")]
    MissingFile,
    #[error("expected a zip archive, got {0}")]
    NotAnArchive(String),
}

/// Request-terminal failures. Nothing in this taxonomy is retried.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid upload: {0}")]
    InvalidUpload(#[from] ValidationError),
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),
    #[error("project not found: {0}")]
    NotFound(String),
    #[error("project directory is missing on the server: {0}")]
    DirectoryMissing(String),
    #[error("file not found: {0}")]
    FileMissing(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(String),
}
