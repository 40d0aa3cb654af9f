//! Queue metrics.

use metrics::{counter, gauge};

/// Metric name constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vstyle_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vstyle_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vstyle_jobs_failed_total";
    pub const JOBS_CANCELLED_TOTAL: &str = "vstyle_jobs_cancelled_total";
    pub const QUEUE_LENGTH: &str = "vstyle_queue_length";
}

pub fn record_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_failed() {
    counter!(names::JOBS_FAILED_TOTAL).increment(1);
}

pub fn record_cancelled() {
    counter!(names::JOBS_CANCELLED_TOTAL).increment(1);
}

/// Number of jobs waiting for the worker.
pub fn set_queue_length(queued: usize) {
    gauge!(names::QUEUE_LENGTH).set(queued as f64);
}
