//! Frame source and sink seams.
//!
//! The chunked pipeline only talks to these traits. [`crate::FfmpegBackend`]
//! implements them with ffmpeg subprocesses; tests substitute in-memory fakes.

use image::RgbImage;
use std::path::{Path, PathBuf};

use vstyle_models::{ColorMetadata, EncodingSettings, VideoMetadata};

use crate::error::{MediaError, MediaResult};

/// An RGB24 video frame.
pub type Frame = RgbImage;

/// Finite, non-restartable stream of decoded frames.
pub type FrameStream = Box<dyn Iterator<Item = MediaResult<Frame>> + Send>;

/// Decoded access to one input file.
pub trait FrameSource: Send {
    /// Probe stream metadata.
    fn probe(&self) -> MediaResult<VideoMetadata>;

    /// Open a stream positioned at `start_frame`.
    fn open(&self, start_frame: u64) -> MediaResult<FrameStream>;
}

/// Encoder parameters for one sink.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkSettings {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub encoding: EncodingSettings,
    pub color: ColorMetadata,
}

impl SinkSettings {
    /// Settings matching a probed input.
    pub fn for_video(metadata: &VideoMetadata, encoding: EncodingSettings) -> Self {
        Self {
            width: metadata.width,
            height: metadata.height,
            fps: metadata.fps,
            encoding,
            color: metadata.color.clone(),
        }
    }

    /// Reject frames whose dimensions differ from the sink's.
    pub fn check_frame(&self, frame: &Frame) -> MediaResult<()> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(MediaError::FrameSizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width(),
                height: frame.height(),
            });
        }
        Ok(())
    }
}

/// Encoded output for a sequence of frames.
pub trait FrameSink: Send {
    /// Append one frame.
    fn write(&mut self, frame: &Frame) -> MediaResult<()>;

    /// Finalize the file. Errors carry the encoder's own error text.
    fn close(self: Box<Self>) -> MediaResult<()>;
}

/// Factory for sources and sinks plus the container-level operations.
pub trait MediaBackend: Send + Sync {
    /// Frame source for an input file.
    fn source(&self, input: &Path) -> MediaResult<Box<dyn FrameSource>>;

    /// Open a sink writing to `path`.
    fn open_sink(&self, path: &Path, settings: &SinkSettings) -> MediaResult<Box<dyn FrameSink>>;

    /// Losslessly concatenate `parts` in order into `output`.
    fn stitch(&self, parts: &[PathBuf], output: &Path) -> MediaResult<()>;

    /// Adjust requested encoding to what this backend can produce.
    fn resolve_encoding(&self, settings: EncodingSettings) -> EncodingSettings {
        settings
    }
}
