//! Shared data models for the video stylization service.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, job requests and job status
//! - Style kinds and derived style parameters
//! - Encoding presets
//! - Probed video metadata and scene characteristics
//! - Resume checkpoints

pub mod checkpoint;
pub mod encoding;
pub mod job;
pub mod preset;
pub mod scene;
pub mod style;
pub mod video;

// Re-export common types
pub use checkpoint::CheckpointRecord;
pub use encoding::EncodingSettings;
pub use job::{
    Job, JobId, JobRequest, JobRequestError, JobStatus, ProgressUpdate, MAX_EFFECT_INTENSITY,
    MIN_EFFECT_INTENSITY,
};
pub use preset::{Preset, PresetParseError};
pub use scene::{ParamValue, SceneCharacteristics, StyleParams};
pub use style::{StyleKind, StyleParseError};
pub use video::{ColorMetadata, VideoMetadata};
