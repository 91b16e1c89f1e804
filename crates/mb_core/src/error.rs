use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Store I/O that may succeed if the same operation is attempted again.
    #[error("Transient store error: {0}")]
    TransientIo(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Extraction failed: {0}")]
    ExtractFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Publish failed: {0}")]
    PublishFailed(String),

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("A pipeline cycle is already running")]
    AlreadyRunning,

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    /// Only store I/O is ever retried automatically.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransientIo(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
