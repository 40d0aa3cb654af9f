//! Job definitions for the stylization queue.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;
use uuid::Uuid;

use crate::StyleKind;

/// Lowest accepted effect intensity.
pub const MIN_EFFECT_INTENSITY: f64 = 0.1;
/// Highest accepted effect intensity.
pub const MAX_EFFECT_INTENSITY: f64 = 2.0;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new short random job ID (8 hex characters).
    pub fn new() -> Self {
        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        Self(id)
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job processing status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for the worker
    #[default]
    Queued,
    /// Job is being processed by the worker
    Processing,
    /// All styles rendered successfully
    Completed,
    /// Job failed with an error
    Failed,
    /// Job was cancelled by the caller
    Cancelled,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether moving from `self` to `next` is allowed.
    ///
    /// Terminal states are final; `Processing` can only be entered from `Queued`.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        match (self, next) {
            (from, _) if from.is_terminal() => false,
            (JobStatus::Queued, JobStatus::Processing) => true,
            (JobStatus::Queued, JobStatus::Cancelled) => true,
            (JobStatus::Queued, JobStatus::Failed) => true,
            (JobStatus::Processing, to) => to.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors raised when validating a job request.
#[derive(Debug, Error, PartialEq)]
pub enum JobRequestError {
    #[error("At least one style is required")]
    NoStyles,

    #[error("Effect intensity {0} is outside [0.1, 2.0]")]
    IntensityOutOfRange(f64),

    #[error("Preset name is empty")]
    EmptyPreset,

    #[error("Input path is empty")]
    EmptyInput,
}

/// Parameters a caller supplies when submitting a job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobRequest {
    /// Source video file
    pub input_path: PathBuf,
    /// Directory receiving one output file per style
    pub output_dir: PathBuf,
    /// Styles in processing order
    pub styles: Vec<StyleKind>,
    /// Name of the encoding preset
    pub preset_name: String,
    /// Effect strength multiplier
    #[serde(default = "default_intensity")]
    pub effect_intensity: f64,
}

fn default_intensity() -> f64 {
    1.0
}

impl JobRequest {
    /// Create a request with default intensity.
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        styles: Vec<StyleKind>,
        preset_name: impl Into<String>,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            styles,
            preset_name: preset_name.into(),
            effect_intensity: default_intensity(),
        }
    }

    /// Returns a new request with updated intensity.
    pub fn with_intensity(mut self, intensity: f64) -> Self {
        self.effect_intensity = intensity;
        self
    }

    /// Check the request and drop duplicate styles, keeping first-seen order.
    pub fn validate(mut self) -> Result<Self, JobRequestError> {
        if self.input_path.as_os_str().is_empty() {
            return Err(JobRequestError::EmptyInput);
        }
        if self.preset_name.trim().is_empty() {
            return Err(JobRequestError::EmptyPreset);
        }
        if !(MIN_EFFECT_INTENSITY..=MAX_EFFECT_INTENSITY).contains(&self.effect_intensity) {
            return Err(JobRequestError::IntensityOutOfRange(self.effect_intensity));
        }

        let mut seen = std::collections::HashSet::new();
        self.styles.retain(|s| seen.insert(*s));
        if self.styles.is_empty() {
            return Err(JobRequestError::NoStyles);
        }

        Ok(self)
    }
}

/// A progress report from the worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct ProgressUpdate {
    /// Overall progress percentage (0-100)
    pub progress: f64,
    /// Frame position within the current style pass
    pub current_frame: u64,
    /// Frame count of the input
    pub total_frames: u64,
    /// Processing throughput in frames per second
    pub observed_fps: f64,
    /// Estimated seconds until the job finishes
    pub eta_seconds: Option<f64>,
}

/// A stylization job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Job {
    /// Unique job ID
    pub id: JobId,

    /// Source video file
    pub input_path: PathBuf,

    /// Directory receiving outputs
    pub output_dir: PathBuf,

    /// Styles in processing order
    pub styles: Vec<StyleKind>,

    /// Encoding preset name
    pub preset_name: String,

    /// Effect strength multiplier
    pub effect_intensity: f64,

    /// Current status
    #[serde(default)]
    pub status: JobStatus,

    /// Progress percentage (0-100)
    #[serde(default)]
    pub progress: f64,

    /// Frame position within the current style pass
    #[serde(default)]
    pub current_frame: u64,

    /// Frame count of the input
    #[serde(default)]
    pub total_frames: u64,

    /// Processing throughput in frames per second
    #[serde(default)]
    pub observed_fps: f64,

    /// Estimated seconds remaining
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eta_seconds: Option<f64>,

    /// Error message for failed jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Files produced so far, in style order
    #[serde(default)]
    pub outputs: Vec<PathBuf>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// When the worker picked the job up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,

    /// When the job reached a terminal state
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    /// Create a queued job from a validated request.
    pub fn new(id: JobId, request: JobRequest) -> Self {
        Self {
            id,
            input_path: request.input_path,
            output_dir: request.output_dir,
            styles: request.styles,
            preset_name: request.preset_name,
            effect_intensity: request.effect_intensity,
            status: JobStatus::Queued,
            progress: 0.0,
            current_frame: 0,
            total_frames: 0,
            observed_fps: 0.0,
            eta_seconds: None,
            error: None,
            outputs: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Move the job to `Processing`. Returns false if the job is not queued.
    pub fn start(&mut self) -> bool {
        if !self.status.can_transition_to(JobStatus::Processing) {
            return false;
        }
        self.status = JobStatus::Processing;
        self.started_at = Some(Utc::now());
        true
    }

    /// Apply a progress report. Ignored unless processing; progress never decreases.
    pub fn apply_progress(&mut self, update: &ProgressUpdate) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.progress = self.progress.max(update.progress.clamp(0.0, 100.0));
        self.current_frame = update.current_frame;
        self.total_frames = update.total_frames;
        self.observed_fps = update.observed_fps;
        self.eta_seconds = update.eta_seconds;
        true
    }

    /// Record a produced output file.
    pub fn push_output(&mut self, path: PathBuf) {
        if !self.is_terminal() {
            self.outputs.push(path);
        }
    }

    /// Mark job as completed.
    pub fn complete(&mut self) -> bool {
        if !self.finish(JobStatus::Completed) {
            return false;
        }
        self.progress = 100.0;
        self.eta_seconds = Some(0.0);
        true
    }

    /// Mark job as failed with an error message.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if !self.finish(JobStatus::Failed) {
            return false;
        }
        self.error = Some(error.into());
        true
    }

    /// Mark job as cancelled. No-op on terminal jobs.
    pub fn cancel(&mut self) -> bool {
        self.finish(JobStatus::Cancelled)
    }

    fn finish(&mut self, status: JobStatus) -> bool {
        if !self.status.can_transition_to(status) {
            return false;
        }
        self.status = status;
        self.completed_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> JobRequest {
        JobRequest::new(
            "/videos/clip.mp4",
            "/videos/out",
            vec![StyleKind::Pencil, StyleKind::Cinematic],
            "balanced",
        )
    }

    #[test]
    fn test_job_id_is_short() {
        let id = JobId::new();
        assert_eq!(id.as_str().len(), 8);
        assert_ne!(id, JobId::new());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_validate_rejects_bad_intensity() {
        let err = request().with_intensity(2.5).validate().unwrap_err();
        assert_eq!(err, JobRequestError::IntensityOutOfRange(2.5));
        assert!(request().with_intensity(0.1).validate().is_ok());
        assert!(request().with_intensity(2.0).validate().is_ok());
    }

    #[test]
    fn test_validate_dedups_styles() {
        let mut req = request();
        req.styles.push(StyleKind::Pencil);
        let req = req.validate().unwrap();
        assert_eq!(req.styles, vec![StyleKind::Pencil, StyleKind::Cinematic]);

        let mut empty = request();
        empty.styles.clear();
        assert_eq!(empty.validate().unwrap_err(), JobRequestError::NoStyles);
    }

    #[test]
    fn test_terminal_status_is_final() {
        let mut job = Job::new(JobId::new(), request());
        assert!(job.cancel());
        assert!(!job.start());
        assert!(!job.complete());
        assert!(!job.fail("late"));
        assert_eq!(job.status, JobStatus::Cancelled);
        assert!(job.error.is_none());
    }

    #[test]
    fn test_progress_is_monotonic_while_processing() {
        let mut job = Job::new(JobId::new(), request());
        let update = ProgressUpdate {
            progress: 40.0,
            current_frame: 120,
            total_frames: 300,
            observed_fps: 24.0,
            eta_seconds: Some(7.5),
        };
        assert!(!job.apply_progress(&update), "queued jobs ignore progress");

        assert!(job.start());
        assert!(job.apply_progress(&update));
        assert_eq!(job.progress, 40.0);

        let backwards = ProgressUpdate {
            progress: 10.0,
            ..update
        };
        job.apply_progress(&backwards);
        assert_eq!(job.progress, 40.0);

        assert!(job.complete());
        assert_eq!(job.progress, 100.0);
        assert!(job.completed_at.is_some());
    }
}
