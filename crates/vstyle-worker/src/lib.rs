//! Batch stylization worker.
//!
//! This crate provides:
//! - Chunked, resumable rendering of one style onto one input
//! - Per-job processing across several styles with progress reporting
//! - Bounded single-style previews
//! - A single-worker executor over the in-process job queue
//! - Preset catalog, configuration and metrics

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod pipeline;
pub mod presets;
pub mod preview;
pub mod processor;

#[cfg(test)]
mod test_support;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{JobExecutor, JobOutcome, JobRunner};
pub use logging::JobLogger;
pub use pipeline::{
    plan_chunks, Chunk, ChunkReport, ChunkedPipeline, PipelineOutcome, PipelineRequest,
};
pub use presets::PresetCatalog;
pub use preview::{PreviewOutcome, PreviewRequest};
pub use processor::{output_path, stylizer_factory, VideoProcessor};
