//! Video encoding configuration.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Software fallback codec (H.264)
pub const FALLBACK_VIDEO_CODEC: &str = "libx264";
/// Encoder preset used for software encodes
pub const SOFTWARE_PRESET: &str = "medium";
/// Default CRF (Constant Rate Factor)
pub const DEFAULT_CRF: u8 = 18;
/// Pixel format written to every output
pub const OUTPUT_PIX_FMT: &str = "yuv420p";

/// Video encoding settings for one style pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingSettings {
    /// Video codec (e.g., "libx264", "h264_nvenc")
    #[serde(default = "default_video_codec")]
    pub codec: String,

    /// Constant Rate Factor (quality, 0-51, lower is better)
    #[serde(default = "default_crf")]
    pub crf: u8,

    /// Encoder preset (e.g., "p4" for NVENC, "medium" for x264)
    #[serde(default = "default_encoder_preset")]
    pub encoder_preset: String,
}

fn default_video_codec() -> String {
    FALLBACK_VIDEO_CODEC.to_string()
}
fn default_crf() -> u8 {
    DEFAULT_CRF
}
fn default_encoder_preset() -> String {
    SOFTWARE_PRESET.to_string()
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            codec: default_video_codec(),
            crf: DEFAULT_CRF,
            encoder_preset: default_encoder_preset(),
        }
    }
}

impl EncodingSettings {
    /// Create settings for a codec and quality.
    pub fn new(codec: impl Into<String>, crf: u8, encoder_preset: impl Into<String>) -> Self {
        Self {
            codec: codec.into(),
            crf,
            encoder_preset: encoder_preset.into(),
        }
    }

    /// Whether the codec is an NVIDIA hardware encoder.
    pub fn is_nvenc(&self) -> bool {
        self.codec.contains("nvenc")
    }

    /// Returns the settings with the codec swapped for the software fallback.
    pub fn with_software_fallback(mut self) -> Self {
        self.codec = FALLBACK_VIDEO_CODEC.to_string();
        self
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.clone()];

        // CRF is not used with NVENC, use -cq with VBR rate control instead
        if self.is_nvenc() {
            args.extend_from_slice(&[
                "-preset".to_string(),
                self.encoder_preset.clone(),
                "-rc".to_string(),
                "vbr".to_string(),
                "-cq".to_string(),
                self.crf.to_string(),
                "-b:v".to_string(),
                "0".to_string(),
            ]);
        } else {
            args.extend_from_slice(&[
                "-preset".to_string(),
                software_preset(&self.encoder_preset).to_string(),
                "-crf".to_string(),
                self.crf.to_string(),
            ]);
        }

        args.extend_from_slice(&["-pix_fmt".to_string(), OUTPUT_PIX_FMT.to_string()]);
        args
    }
}

/// NVENC presets (p1..p7) mean nothing to x264; map anything unknown to "medium".
fn software_preset(preset: &str) -> &str {
    const X264_PRESETS: &[&str] = &[
        "ultrafast",
        "superfast",
        "veryfast",
        "faster",
        "fast",
        "medium",
        "slow",
        "slower",
        "veryslow",
    ];
    if X264_PRESETS.contains(&preset) {
        preset
    } else {
        SOFTWARE_PRESET
    }
}
