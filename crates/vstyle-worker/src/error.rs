//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Invalid preset {name}: {message}")]
    InvalidPreset { name: String, message: String },

    #[error("Input has no frames: {0}")]
    EmptyInput(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Styles failed: {}", .0.join("; "))]
    StylesFailed(Vec<String>),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vstyle_storage::StorageError),

    #[error("Media error: {0}")]
    Media(#[from] vstyle_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] vstyle_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn unknown_preset(name: impl Into<String>) -> Self {
        Self::UnknownPreset(name.into())
    }

    pub fn invalid_preset(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidPreset {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Input could not be probed; no chunk was attempted.
    pub fn is_probe_error(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_probe_error())
    }

    /// Chunks finished but could not be joined; chunk files were kept.
    pub fn is_stitch_error(&self) -> bool {
        matches!(self, WorkerError::Media(e) if e.is_stitch_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstyle_media::MediaError;

    #[test]
    fn test_styles_failed_message_lists_every_style() {
        let err = WorkerError::StylesFailed(vec![
            "Cartoon: encoder exited".to_string(),
            "Comic: disk full".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Styles failed: Cartoon: encoder exited; Comic: disk full"
        );
    }

    #[test]
    fn test_classification() {
        let stitch: WorkerError = MediaError::stitch_failed("concat", 3, None).into();
        assert!(stitch.is_stitch_error());
        assert!(!stitch.is_probe_error());
        assert!(!WorkerError::unknown_preset("x").is_stitch_error());
    }
}
