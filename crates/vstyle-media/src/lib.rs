#![deny(unreachable_patterns)]
//! Frame-level media plumbing for batch stylization.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and subprocess supervision
//! - Raw RGB frame pipes in and out of ffmpeg behind the [`MediaBackend`] seam
//! - ffprobe metadata and encoder capability detection
//! - Lossless chunk concatenation
//! - Scene analysis and per-style parameter derivation
//! - The built-in stylizers, tiled inference and temporal smoothing

pub mod analysis;
pub mod capabilities;
pub mod command;
pub mod concat;
pub mod error;
pub mod ffmpeg_io;
pub mod frame;
pub mod fs_utils;
pub mod image_ops;
pub mod params;
pub mod probe;
pub mod styles;
pub mod temporal;
pub mod tiling;

pub use analysis::FrameCharacteristicsAnalyzer;
pub use capabilities::resolve_encoding;
pub use command::{check_ffmpeg, FfmpegCommand};
pub use concat::concat_chunks;
pub use error::{MediaError, MediaResult};
pub use ffmpeg_io::{FfmpegBackend, FfmpegFrameSink, FfmpegFrameSource};
pub use frame::{Frame, FrameSink, FrameSource, FrameStream, MediaBackend, SinkSettings};
pub use fs_utils::{move_file, remove_files_best_effort};
pub use params::{optimize_all, OptimizedParams};
pub use probe::probe_video;
pub use styles::{IdentityStylizer, OnnxStyleModel, Stylizer, StylizerFactory};
pub use temporal::TemporalSmoother;
pub use tiling::{TileWeightMap, TiledInferenceRunner};
