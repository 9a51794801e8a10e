//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Data integrity: {0}")]
    DataIntegrity(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Transcription failed: {0}")]
    TranscriptionFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Store error: {0}")]
    Store(#[from] clipforge_store::StoreError),

    #[error("Storage error: {0}")]
    Storage(#[from] clipforge_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] clipforge_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] clipforge_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn processing_failed(msg: impl Into<String>) -> Self {
        Self::ProcessingFailed(msg.into())
    }

    pub fn transcription_failed(msg: impl Into<String>) -> Self {
        Self::TranscriptionFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Terminal errors are dead-lettered immediately instead of retried.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkerError::InvalidInput(_) | WorkerError::DataIntegrity(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_classification() {
        assert!(WorkerError::invalid_input("bad url").is_terminal());
        assert!(WorkerError::data_integrity("missing segment").is_terminal());

        assert!(!WorkerError::job_failed("boom").is_terminal());
        assert!(!WorkerError::Media(clipforge_media::MediaError::Timeout(300)).is_terminal());
    }
}
