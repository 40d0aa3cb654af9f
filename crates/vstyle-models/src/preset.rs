//! Processing presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::EncodingSettings;

/// A named bundle of encoding and chunking settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Preset {
    /// Preset name (case-insensitive lookup key)
    #[serde(default)]
    pub name: String,

    /// Short description shown in listings
    #[serde(default)]
    pub description: String,

    /// Encoder settings
    #[serde(flatten)]
    pub encoding: EncodingSettings,

    /// Seconds of video per checkpointed chunk
    #[serde(default = "default_chunk_duration")]
    pub chunk_duration_secs: f64,

    /// Apply temporal smoothing between frames
    #[serde(default)]
    pub use_temporal: bool,
}

fn default_chunk_duration() -> f64 {
    30.0
}

/// Errors raised when a preset definition is unusable.
#[derive(Debug, Error, PartialEq)]
pub enum PresetParseError {
    #[error("Chunk duration must be positive, got {0}")]
    InvalidChunkDuration(f64),

    #[error("CRF {0} is outside 0-51")]
    InvalidCrf(u8),

    #[error("Codec is empty")]
    EmptyCodec,
}

impl Preset {
    /// Fast processing, good quality.
    pub fn speed() -> Self {
        Self {
            name: "speed".to_string(),
            description: "Fast processing, good quality".to_string(),
            encoding: EncodingSettings::new("h264_nvenc", 23, "p1"),
            chunk_duration_secs: 60.0,
            use_temporal: false,
        }
    }

    /// Balanced speed and quality.
    pub fn balanced() -> Self {
        Self {
            name: "balanced".to_string(),
            description: "Balanced speed and quality".to_string(),
            encoding: EncodingSettings::new("h264_nvenc", 18, "p4"),
            chunk_duration_secs: 30.0,
            use_temporal: true,
        }
    }

    /// Highest quality, slower.
    pub fn quality() -> Self {
        Self {
            name: "quality".to_string(),
            description: "Highest quality, slower".to_string(),
            encoding: EncodingSettings::new("h264_nvenc", 15, "p7"),
            chunk_duration_secs: 20.0,
            use_temporal: true,
        }
    }

    /// All built-in presets.
    pub fn builtins() -> Vec<Preset> {
        vec![Self::speed(), Self::balanced(), Self::quality()]
    }

    /// Look up a built-in preset by name.
    pub fn builtin(name: &str) -> Option<Preset> {
        Self::builtins()
            .into_iter()
            .find(|p| p.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Check the preset values.
    pub fn validate(&self) -> Result<(), PresetParseError> {
        if !(self.chunk_duration_secs > 0.0 && self.chunk_duration_secs.is_finite()) {
            return Err(PresetParseError::InvalidChunkDuration(
                self.chunk_duration_secs,
            ));
        }
        if self.encoding.crf > 51 {
            return Err(PresetParseError::InvalidCrf(self.encoding.crf));
        }
        if self.encoding.codec.trim().is_empty() {
            return Err(PresetParseError::EmptyCodec);
        }
        Ok(())
    }
}
