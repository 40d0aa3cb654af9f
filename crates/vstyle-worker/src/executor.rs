//! Job executor.
//!
//! One loop drains the queue and runs jobs strictly one at a time. Each job
//! runs on the blocking pool because the media pipeline does synchronous
//! pipe I/O. Whatever a job returns or panics with is recorded on the job;
//! the loop itself only stops on shutdown.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use vstyle_models::{Job, JobId};
use vstyle_queue::{CancelToken, JobQueue, JobReceiver, QueueResult};

use crate::error::WorkerResult;

/// How a job ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Cancelled,
}

/// Work performed for one dequeued job.
///
/// Called on a blocking thread. Implementations report progress and outputs
/// through `queue` and should poll `cancel` at safe points.
pub trait JobRunner: Send + Sync + 'static {
    fn run(&self, job: &Job, cancel: &CancelToken, queue: &JobQueue) -> WorkerResult<JobOutcome>;
}

/// Single-worker loop over a [`JobQueue`].
pub struct JobExecutor {
    runner: Arc<dyn JobRunner>,
    queue: JobQueue,
    shutdown: watch::Sender<bool>,
}

impl JobExecutor {
    pub fn new(runner: Arc<dyn JobRunner>, queue: JobQueue) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            runner,
            queue,
            shutdown,
        }
    }

    /// Stop taking new jobs. A job already running is finished first.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Process jobs until shutdown or until the queue closes.
    pub async fn run(&self, mut receiver: JobReceiver) -> WorkerResult<()> {
        info!("Starting job executor");
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow() {
                info!("Shutdown signal received, stopping executor");
                break;
            }

            let next = tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                next = receiver.next_job() => next,
            };

            let Some((job, cancel)) = next else {
                info!("Job queue closed");
                break;
            };
            self.execute(job, cancel).await;
        }

        info!("Job executor stopped");
        Ok(())
    }

    async fn execute(&self, job: Job, cancel: CancelToken) {
        let job_id = job.id.clone();
        info!(job_id = %job_id, "Executing job");

        let runner = Arc::clone(&self.runner);
        let queue = self.queue.clone();
        let result =
            tokio::task::spawn_blocking(move || runner.run(&job, &cancel, &queue)).await;

        let recorded = match result {
            Ok(Ok(JobOutcome::Completed)) => self.queue.complete(&job_id).map(|_| ()),
            Ok(Ok(JobOutcome::Cancelled)) => self.queue.cancel(&job_id),
            Ok(Err(e)) => {
                error!(job_id = %job_id, "Job failed: {}", e);
                self.queue.fail(&job_id, e.to_string()).map(|_| ())
            }
            Err(join_error) => {
                error!(job_id = %job_id, "Job panicked: {}", join_error);
                self.queue
                    .fail(&job_id, format!("Worker panicked: {}", join_error))
                    .map(|_| ())
            }
        };
        log_record_error(&job_id, recorded);
    }
}

fn log_record_error(job_id: &JobId, recorded: QueueResult<()>) {
    if let Err(e) = recorded {
        // The job was pruned while it ran.
        warn!(job_id = %job_id, "Could not record job result: {}", e);
    }
}
