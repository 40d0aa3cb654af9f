//! Probed video metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Color description carried from the input to every encoded output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ColorMetadata {
    /// Matrix coefficients (e.g., "bt709")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_space: Option<String>,
    /// Transfer characteristics (e.g., "bt709", "smpte2084")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_transfer: Option<String>,
    /// Color primaries (e.g., "bt709")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_primaries: Option<String>,
    /// Range: "tv" (limited) or "pc" (full)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_range: Option<String>,
}

impl ColorMetadata {
    /// FFmpeg output flags for the known fields.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        let fields = [
            ("-colorspace", &self.color_space),
            ("-color_trc", &self.color_transfer),
            ("-color_primaries", &self.color_primaries),
            ("-color_range", &self.color_range),
        ];
        for (flag, value) in fields {
            if let Some(value) = value.as_deref().filter(|v| is_specified(v)) {
                args.push(flag.to_string());
                args.push(value.to_string());
            }
        }
        args
    }
}

fn is_specified(value: &str) -> bool {
    !value.is_empty() && value != "unknown" && value != "reserved"
}

/// Video file information, probed once per input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Duration in seconds
    pub duration: f64,
    /// Number of decodable frames
    pub total_frames: u64,
    /// Source video codec
    pub codec: String,
    /// Color description
    #[serde(default)]
    pub color: ColorMetadata,
    /// Whether the container has an audio stream
    #[serde(default)]
    pub has_audio: bool,
}

impl VideoMetadata {
    /// Frames per chunk for a chunk duration, never less than one.
    pub fn chunk_frames(&self, chunk_duration_secs: f64) -> u64 {
        ((chunk_duration_secs * self.fps).round() as u64).max(1)
    }

    /// Seconds at which a frame index starts.
    pub fn frame_to_seconds(&self, frame: u64) -> f64 {
        if self.fps > 0.0 {
            frame as f64 / self.fps
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata(fps: f64) -> VideoMetadata {
        VideoMetadata {
            width: 1920,
            height: 1080,
            fps,
            duration: 10.0,
            total_frames: 300,
            codec: "h264".to_string(),
            color: ColorMetadata::default(),
            has_audio: false,
        }
    }

    #[test]
    fn test_chunk_frames_rounds() {
        assert_eq!(metadata(30.0).chunk_frames(10.0), 300);
        assert_eq!(metadata(30.0).chunk_frames(5.0), 150);
        assert_eq!(metadata(29.97).chunk_frames(30.0), 899);
        assert_eq!(metadata(30.0).chunk_frames(0.001), 1);
    }

    #[test]
    fn test_color_args_skip_unknown() {
        let color = ColorMetadata {
            color_space: Some("bt709".to_string()),
            color_transfer: Some("unknown".to_string()),
            color_primaries: None,
            color_range: Some("tv".to_string()),
        };
        assert_eq!(
            color.to_ffmpeg_args(),
            vec!["-colorspace", "bt709", "-color_range", "tv"]
        );
    }
}
