//! Pipeline metrics and the Prometheus exporter.

use std::net::SocketAddr;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric name constants for consistency.
pub mod names {
    pub const CHUNKS_PROCESSED_TOTAL: &str = "vstyle_chunks_processed_total";
    pub const FRAMES_PROCESSED_TOTAL: &str = "vstyle_frames_processed_total";
    pub const CHUNK_DURATION_SECONDS: &str = "vstyle_chunk_duration_seconds";
    pub const STITCH_FAILURES_TOTAL: &str = "vstyle_stitch_failures_total";
    pub const RESUMED_RUNS_TOTAL: &str = "vstyle_resumed_runs_total";
}

/// Record one encoded chunk.
pub fn record_chunk(style: &str, frames: u64, duration_secs: f64) {
    let labels = [("style", style.to_string())];
    counter!(names::CHUNKS_PROCESSED_TOTAL, &labels).increment(1);
    counter!(names::FRAMES_PROCESSED_TOTAL, &labels).increment(frames);
    histogram!(names::CHUNK_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_stitch_failure() {
    counter!(names::STITCH_FAILURES_TOTAL).increment(1);
}

pub fn record_resume() {
    counter!(names::RESUMED_RUNS_TOTAL).increment(1);
}

/// Install the global recorder and serve `/metrics` on `port`.
///
/// Must be called from within a tokio runtime.
pub fn install_exporter(port: u16) -> WorkerResult<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::CHUNKS_PROCESSED_TOTAL.contains("chunks"));
        assert!(names::STITCH_FAILURES_TOTAL.contains("stitch"));
        assert!(names::CHUNK_DURATION_SECONDS.ends_with("_seconds"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_chunk("cartoon", 30, 0.5);
        record_stitch_failure();
    }
}
