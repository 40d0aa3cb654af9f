//! Short single-style previews over a window of the input.

use std::path::{Path, PathBuf};

use vstyle_models::{
    EncodingSettings, StyleKind, VideoMetadata, MAX_EFFECT_INTENSITY, MIN_EFFECT_INTENSITY,
};

use crate::error::{WorkerError, WorkerResult};
use crate::pipeline::Chunk;

/// Previews favour encode speed; software fallback applies without NVENC.
pub fn preview_encoding() -> EncodingSettings {
    EncodingSettings::new("h264_nvenc", 23, "p1")
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewRequest {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub style: StyleKind,
    pub start_secs: f64,
    pub duration_secs: f64,
    pub effect_intensity: f64,
}

impl PreviewRequest {
    /// Five seconds from the start at full intensity.
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>, style: StyleKind) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            style,
            start_secs: 0.0,
            duration_secs: 5.0,
            effect_intensity: 1.0,
        }
    }

    pub fn with_window(mut self, start_secs: f64, duration_secs: f64) -> Self {
        self.start_secs = start_secs;
        self.duration_secs = duration_secs;
        self
    }

    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.effect_intensity = intensity;
        self
    }

    pub fn validate(&self) -> WorkerResult<()> {
        if !(self.start_secs >= 0.0 && self.start_secs.is_finite()) {
            return Err(WorkerError::invalid_request(format!(
                "preview start {} must be a non-negative number of seconds",
                self.start_secs
            )));
        }
        if !(self.duration_secs > 0.0 && self.duration_secs.is_finite()) {
            return Err(WorkerError::invalid_request(format!(
                "preview duration {} must be positive",
                self.duration_secs
            )));
        }
        if !(MIN_EFFECT_INTENSITY..=MAX_EFFECT_INTENSITY).contains(&self.effect_intensity) {
            return Err(WorkerError::invalid_request(format!(
                "effect intensity {} is outside [{}, {}]",
                self.effect_intensity, MIN_EFFECT_INTENSITY, MAX_EFFECT_INTENSITY
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOutcome {
    pub output: PathBuf,
    pub frames_processed: u64,
    pub processing_secs: f64,
    pub avg_fps: f64,
}

/// Frames covered by a preview.
///
/// A start past the end falls back to the first frame, and the window is
/// cut at the last frame.
pub fn preview_window(metadata: &VideoMetadata, start_secs: f64, duration_secs: f64) -> Chunk {
    let total = metadata.total_frames;
    let mut start = (start_secs * metadata.fps) as u64;
    let frames = (duration_secs * metadata.fps) as u64;
    if start >= total {
        start = 0;
    }
    Chunk {
        start,
        end: start + frames.min(total - start),
    }
}

/// `<output_dir>/preview_<input_stem>_<style>.mp4`
pub fn preview_path(output_dir: &Path, input: &Path, style: StyleKind) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    output_dir.join(format!("preview_{}_{}.mp4", stem, style.as_filename_part()))
}
