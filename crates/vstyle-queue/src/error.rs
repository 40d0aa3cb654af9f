//! Queue error types.

use thiserror::Error;

use vstyle_models::JobRequestError;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Invalid job request: {0}")]
    InvalidRequest(#[from] JobRequestError),

    #[error("Queue is closed")]
    Closed,
}

impl QueueError {
    pub fn job_not_found(id: impl ToString) -> Self {
        Self::JobNotFound(id.to_string())
    }
}
