//! Job registry and FIFO.
//!
//! Callers submit, inspect and cancel jobs through [`JobQueue`]; a single
//! worker drains job ids from the paired [`JobReceiver`]. The registry lives
//! behind an `RwLock` so observers always read whole-job snapshots.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use vstyle_models::{Job, JobId, JobRequest, JobStatus, ProgressUpdate};

use crate::cancel::CancelToken;
use crate::error::{QueueError, QueueResult};
use crate::metrics;

struct Entry {
    job: Job,
    cancel: CancelToken,
}

#[derive(Default)]
struct Registry {
    /// Insertion order
    order: Vec<JobId>,
    jobs: HashMap<JobId, Entry>,
}

impl Registry {
    fn queued_len(&self) -> usize {
        self.jobs
            .values()
            .filter(|e| e.job.status == JobStatus::Queued)
            .count()
    }

    fn entry_mut(&mut self, id: &JobId) -> QueueResult<&mut Entry> {
        self.jobs
            .get_mut(id)
            .ok_or_else(|| QueueError::job_not_found(id))
    }
}

struct Inner {
    registry: RwLock<Registry>,
    sender: mpsc::UnboundedSender<JobId>,
}

/// Handle for submitting and observing jobs. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    inner: Arc<Inner>,
}

/// Worker side of the queue.
pub struct JobReceiver {
    receiver: mpsc::UnboundedReceiver<JobId>,
    queue: JobQueue,
}

impl JobQueue {
    /// Create a queue and the receiver its single worker consumes.
    pub fn new() -> (Self, JobReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queue = Self {
            inner: Arc::new(Inner {
                registry: RwLock::new(Registry::default()),
                sender,
            }),
        };
        let receiver = JobReceiver {
            receiver,
            queue: queue.clone(),
        };
        (queue, receiver)
    }

    // A panic while holding the lock leaves plain data behind; keep serving it.
    fn read(&self) -> RwLockReadGuard<'_, Registry> {
        self.inner
            .registry
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Registry> {
        self.inner
            .registry
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Validate and enqueue a request. Returns immediately with the new id.
    pub fn submit(&self, request: JobRequest) -> QueueResult<JobId> {
        let request = request.validate()?;

        let (id, queued) = {
            let mut registry = self.write();
            let mut id = JobId::new();
            while registry.jobs.contains_key(&id) {
                id = JobId::new();
            }
            let job = Job::new(id.clone(), request);
            registry.order.push(id.clone());
            registry.jobs.insert(
                id.clone(),
                Entry {
                    job,
                    cancel: CancelToken::new(),
                },
            );
            (id, registry.queued_len())
        };

        if self.inner.sender.send(id.clone()).is_err() {
            // Worker is gone; the job can never run.
            let mut registry = self.write();
            if let Ok(entry) = registry.entry_mut(&id) {
                entry.job.fail("Queue is closed");
            }
            return Err(QueueError::Closed);
        }

        metrics::record_submitted();
        metrics::set_queue_length(queued);
        info!(job_id = %id, "Job submitted");
        Ok(id)
    }

    /// Snapshot of one job.
    pub fn get(&self, id: &JobId) -> QueueResult<Job> {
        self.read()
            .jobs
            .get(id)
            .map(|e| e.job.clone())
            .ok_or_else(|| QueueError::job_not_found(id))
    }

    /// Snapshots of all jobs in submission order.
    pub fn list(&self) -> Vec<Job> {
        let registry = self.read();
        registry
            .order
            .iter()
            .filter_map(|id| registry.jobs.get(id).map(|e| e.job.clone()))
            .collect()
    }

    /// Cancel a queued or processing job. Terminal jobs are left untouched.
    ///
    /// A processing job stops at its next chunk boundary.
    pub fn cancel(&self, id: &JobId) -> QueueResult<()> {
        let mut registry = self.write();
        let entry = registry.entry_mut(id)?;
        if entry.job.cancel() {
            entry.cancel.cancel();
            let queued = registry.queued_len();
            drop(registry);
            metrics::record_cancelled();
            metrics::set_queue_length(queued);
            info!(job_id = %id, "Job cancelled");
        } else {
            debug!(job_id = %id, "Cancel ignored for terminal job");
        }
        Ok(())
    }

    /// Drop every terminal job from the registry. Returns how many were removed.
    pub fn prune_terminal(&self) -> usize {
        let mut registry = self.write();
        let before = registry.jobs.len();
        registry.jobs.retain(|_, e| !e.job.is_terminal());
        let Registry { order, jobs } = &mut *registry;
        order.retain(|id| jobs.contains_key(id));
        let removed = before - registry.jobs.len();
        if removed > 0 {
            debug!(removed, "Pruned terminal jobs");
        }
        removed
    }

    /// Move a queued job to processing and hand out its cancel token.
    ///
    /// Returns `None` when the job is missing or no longer queued.
    pub fn start_job(&self, id: &JobId) -> Option<(Job, CancelToken)> {
        let mut registry = self.write();
        let entry = registry.jobs.get_mut(id)?;
        if !entry.job.start() {
            return None;
        }
        let started = (entry.job.clone(), entry.cancel.clone());
        let queued = registry.queued_len();
        drop(registry);
        metrics::set_queue_length(queued);
        Some(started)
    }

    /// Apply a progress report to a processing job.
    pub fn update_progress(&self, id: &JobId, update: &ProgressUpdate) -> QueueResult<bool> {
        Ok(self.write().entry_mut(id)?.job.apply_progress(update))
    }

    /// Record a finished output file.
    pub fn push_output(&self, id: &JobId, path: PathBuf) -> QueueResult<()> {
        self.write().entry_mut(id)?.job.push_output(path);
        Ok(())
    }

    /// Mark a job completed. Returns false if it was already terminal.
    pub fn complete(&self, id: &JobId) -> QueueResult<bool> {
        let completed = self.write().entry_mut(id)?.job.complete();
        if completed {
            metrics::record_completed();
            info!(job_id = %id, "Job completed");
        }
        Ok(completed)
    }

    /// Mark a job failed. Returns false if it was already terminal.
    pub fn fail(&self, id: &JobId, error: impl Into<String>) -> QueueResult<bool> {
        let error = error.into();
        let failed = self.write().entry_mut(id)?.job.fail(error.clone());
        if failed {
            metrics::record_failed();
            warn!(job_id = %id, error = %error, "Job failed");
        }
        Ok(failed)
    }

    /// Whether cancellation was requested for `id`.
    pub fn is_cancelled(&self, id: &JobId) -> bool {
        self.read()
            .jobs
            .get(id)
            .map(|e| e.cancel.is_cancelled())
            .unwrap_or(false)
    }
}

impl JobReceiver {
    /// Wait for the next job that is still queued and mark it processing.
    ///
    /// Ids of jobs cancelled or pruned while waiting are skipped.
    pub async fn next_job(&mut self) -> Option<(Job, CancelToken)> {
        loop {
            let id = self.receiver.recv().await?;
            match self.queue.start_job(&id) {
                Some(started) => return Some(started),
                None => debug!(job_id = %id, "Skipping job that is no longer queued"),
            }
        }
    }

    /// Handle to the queue this receiver drains.
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vstyle_models::StyleKind;

    fn request() -> JobRequest {
        JobRequest::new("/in/clip.mp4", "/out", vec![StyleKind::Cartoon], "balanced")
    }

    #[test]
    fn test_submit_get_list_in_order() {
        let (queue, _rx) = JobQueue::new();
        let a = queue.submit(request()).unwrap();
        let b = queue.submit(request()).unwrap();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 8);

        let jobs = queue.list();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].id, a);
        assert_eq!(jobs[1].id, b);
        assert_eq!(queue.get(&a).unwrap().status, JobStatus::Queued);
    }

    #[test]
    fn test_invalid_request_rejected() {
        let (queue, _rx) = JobQueue::new();
        let bad = JobRequest::new("/in/clip.mp4", "/out", vec![], "balanced");
        assert!(matches!(queue.submit(bad), Err(QueueError::InvalidRequest(_))));
        assert!(queue.list().is_empty());
    }

    #[test]
    fn test_get_unknown_is_not_found() {
        let (queue, _rx) = JobQueue::new();
        assert!(matches!(
            queue.get(&JobId::from_string("nope")),
            Err(QueueError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_cancel_terminal_is_noop() {
        let (queue, _rx) = JobQueue::new();
        let id = queue.submit(request()).unwrap();
        queue.start_job(&id).unwrap();
        assert!(queue.complete(&id).unwrap());

        queue.cancel(&id).unwrap();
        assert_eq!(queue.get(&id).unwrap().status, JobStatus::Completed);
        assert!(!queue.is_cancelled(&id));
    }

    #[test]
    fn test_cancel_processing_sets_token() {
        let (queue, _rx) = JobQueue::new();
        let id = queue.submit(request()).unwrap();
        let (_, token) = queue.start_job(&id).unwrap();

        queue.cancel(&id).unwrap();
        assert!(token.is_cancelled());
        assert_eq!(queue.get(&id).unwrap().status, JobStatus::Cancelled);
        // Late completion from the worker must not resurrect the job.
        assert!(!queue.complete(&id).unwrap());
        assert_eq!(queue.get(&id).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_prune_keeps_active_jobs() {
        let (queue, _rx) = JobQueue::new();
        let done = queue.submit(request()).unwrap();
        let failed = queue.submit(request()).unwrap();
        let running = queue.submit(request()).unwrap();
        let waiting = queue.submit(request()).unwrap();

        queue.start_job(&done).unwrap();
        queue.complete(&done).unwrap();
        queue.start_job(&failed).unwrap();
        queue.fail(&failed, "boom").unwrap();
        queue.start_job(&running).unwrap();

        assert_eq!(queue.prune_terminal(), 2);
        let ids: Vec<_> = queue.list().into_iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![running, waiting]);
        assert_eq!(queue.prune_terminal(), 0);
    }

    #[test]
    fn test_progress_only_while_processing() {
        let (queue, _rx) = JobQueue::new();
        let id = queue.submit(request()).unwrap();
        let update = ProgressUpdate {
            progress: 40.0,
            current_frame: 120,
            total_frames: 300,
            observed_fps: 24.0,
            eta_seconds: Some(7.5),
        };
        assert!(!queue.update_progress(&id, &update).unwrap());

        queue.start_job(&id).unwrap();
        assert!(queue.update_progress(&id, &update).unwrap());
        let job = queue.get(&id).unwrap();
        assert_eq!(job.progress, 40.0);
        assert_eq!(job.current_frame, 120);
    }

    #[tokio::test]
    async fn test_receiver_skips_cancelled_jobs() {
        let (queue, mut rx) = JobQueue::new();
        let first = queue.submit(request()).unwrap();
        let second = queue.submit(request()).unwrap();
        let third = queue.submit(request()).unwrap();

        let (job, _) = rx.next_job().await.unwrap();
        assert_eq!(job.id, first);
        assert_eq!(job.status, JobStatus::Processing);

        queue.cancel(&second).unwrap();
        let (job, _) = rx.next_job().await.unwrap();
        assert_eq!(job.id, third);
        assert_eq!(queue.get(&second).unwrap().status, JobStatus::Cancelled);
    }

    #[test]
    fn test_receiver_wakes_on_submit() {
        let (queue, mut rx) = JobQueue::new();
        let mut next = tokio_test::task::spawn(rx.next_job());
        tokio_test::assert_pending!(next.poll());

        let id = queue.submit(request()).unwrap();
        assert!(next.is_woken());
        let (job, _) = tokio_test::assert_ready!(next.poll()).unwrap();
        assert_eq!(job.id, id);
    }
}
