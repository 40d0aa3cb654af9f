//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Encoder failed: {message}")]
    EncodeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Stitching {chunks} chunks failed: {message}")]
    StitchFailed {
        message: String,
        chunks: usize,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Model not found: {0}")]
    ModelNotFound(PathBuf),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("Frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}")]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Stylizer failed: {0}")]
    StylizerFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create an encoder failure error carrying the encoder's stderr.
    pub fn encode_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::EncodeFailed {
            message: message.into(),
            stderr,
        }
    }

    /// Create a stitch failure error.
    pub fn stitch_failed(message: impl Into<String>, chunks: usize, stderr: Option<String>) -> Self {
        Self::StitchFailed {
            message: message.into(),
            chunks,
            stderr,
        }
    }

    /// Create a model not found error.
    pub fn model_not_found(path: impl Into<PathBuf>) -> Self {
        Self::ModelNotFound(path.into())
    }

    /// Create a stylizer failure error.
    pub fn stylizer_failed(message: impl Into<String>) -> Self {
        Self::StylizerFailed(message.into())
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Whether the input itself could not be read (no chunk should be attempted).
    pub fn is_probe_error(&self) -> bool {
        matches!(
            self,
            MediaError::FfprobeNotFound
                | MediaError::FfprobeFailed { .. }
                | MediaError::FileNotFound(_)
                | MediaError::InvalidVideo(_)
        )
    }

    /// Whether the stitch step failed after all chunks were encoded.
    pub fn is_stitch_error(&self) -> bool {
        matches!(self, MediaError::StitchFailed { .. })
    }

    /// Underlying tool output, when available.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. }
            | MediaError::FfprobeFailed { stderr, .. }
            | MediaError::EncodeFailed { stderr, .. }
            | MediaError::StitchFailed { stderr, .. } => stderr.as_deref(),
            _ => None,
        }
    }
}
