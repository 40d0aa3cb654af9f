//! Resume checkpoints for chunked rendering.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::StyleKind;

/// Progress record persisted after every completed chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointRecord {
    /// Exclusive end frame of the last completed chunk
    pub last_frame: u64,
    /// Frame count of the input
    pub total_frames: u64,
    /// Chunks completed so far, across resumed runs
    pub chunks_completed: u32,
    /// Codec the chunks were encoded with
    pub codec: String,
    /// CRF the chunks were encoded with
    pub crf: u8,
    /// When the record was written
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn new(
        last_frame: u64,
        total_frames: u64,
        chunks_completed: u32,
        codec: impl Into<String>,
        crf: u8,
    ) -> Self {
        Self {
            last_frame,
            total_frames,
            chunks_completed,
            codec: codec.into(),
            crf,
            updated_at: Utc::now(),
        }
    }

    /// Whether chunks from this record can be stitched with a run using `codec`/`crf`.
    pub fn matches_encoding(&self, codec: &str, crf: u8) -> bool {
        self.codec == codec && self.crf == crf
    }

    /// Stable key for one input file and style.
    pub fn key_for(input: &Path, style: StyleKind) -> String {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "input".to_string());
        let stem: String = stem
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("{}_{}", stem, style.as_filename_part())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_is_filesystem_safe() {
        let key = CheckpointRecord::key_for(Path::new("/in/My Clip (1).mp4"), StyleKind::Comic);
        assert_eq!(key, "My_Clip__1__comic");
    }

    #[test]
    fn test_matches_encoding() {
        let record = CheckpointRecord::new(150, 300, 1, "libx264", 18);
        assert!(record.matches_encoding("libx264", 18));
        assert!(!record.matches_encoding("libx264", 23));
        assert!(!record.matches_encoding("h264_nvenc", 18));
    }

    #[test]
    fn test_record_without_timestamp_deserializes() {
        let json = r#"{"last_frame":10,"total_frames":20,"chunks_completed":1,"codec":"libx264","crf":18}"#;
        let record: CheckpointRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.last_frame, 10);
    }
}
