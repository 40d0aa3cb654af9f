//! In-process job queue.
//!
//! This crate provides:
//! - A job registry readable from any thread (snapshots under a lock)
//! - A FIFO of job ids consumed by a single worker
//! - Cooperative cancellation tokens
//! - Queue metrics

pub mod cancel;
pub mod error;
pub mod metrics;
pub mod queue;

pub use cancel::CancelToken;
pub use error::{QueueError, QueueResult};
pub use queue::{JobQueue, JobReceiver};
