//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Transcript parse failed: {0}")]
    TranscriptFailed(String),

    #[error("Document assembly failed: {0}")]
    DocumentFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Media error: {0}")]
    Media(#[from] gifdoc_media::MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn transcript_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptFailed(msg.into())
    }

    pub fn document_failed(msg: impl Into<String>) -> Self {
        Self::DocumentFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether this failure came from a cooperative cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Media(gifdoc_media::MediaError::Cancelled))
    }
}
