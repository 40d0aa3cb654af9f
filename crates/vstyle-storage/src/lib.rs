//! Checkpoint persistence for resumable chunked rendering.
//!
//! One small JSON record per (input, style) key. The store is only touched
//! by the single worker, so implementations need no cross-process locking.

pub mod checkpoint;
pub mod error;

pub use checkpoint::{CheckpointStore, FileCheckpointStore};
pub use error::{StorageError, StorageResult};
