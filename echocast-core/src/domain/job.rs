//! Job domain types
//!
//! Structures shared between the server (persists submissions, reads status)
//! and the worker (drives a job through the pipeline).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One unit of work submitted by a producer.
///
/// Immutable once written to the queue; consumed exactly once by a worker
/// invocation and superseded by its [`JobRecord`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRequest {
    pub id: String,
    pub url: String,
    pub llm_model: Option<String>,
    pub tts_model: Option<String>,
    pub submitted_at: DateTime<Utc>,
}

impl JobRequest {
    /// Creates a new request with a freshly generated id.
    pub fn new(url: String, llm_model: Option<String>, tts_model: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            url,
            llm_model,
            tts_model,
            submitted_at: Utc::now(),
        }
    }
}

/// Job execution status
///
/// Transitions are linear; `cancelled` is reachable from any non-terminal
/// state and any stage error leads to `failed`:
///
/// ```text
/// queued -> fetching -> generating -> synthesizing -> publishing -> completed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Fetching,
    Generating,
    Synthesizing,
    Publishing,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Progress checkpoint written when a job enters this status.
    pub fn checkpoint(self) -> u8 {
        match self {
            JobStatus::Queued => 0,
            JobStatus::Fetching => 20,
            JobStatus::Generating => 50,
            JobStatus::Synthesizing => 85,
            JobStatus::Publishing => 95,
            JobStatus::Completed => 100,
            // Failure and cancellation freeze progress where it was.
            JobStatus::Failed | JobStatus::Cancelled => 0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Fetching => "fetching",
            JobStatus::Generating => "generating",
            JobStatus::Synthesizing => "synthesizing",
            JobStatus::Publishing => "publishing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The mutable status view of a job, independent of its queue entry.
///
/// Exactly one record exists per request id. Only the worker transitions
/// `status`; any reader may set `cancel_requested` while the job is live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    pub progress: u8,
    pub stage_message: String,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result_episode_id: Option<String>,
}

impl JobRecord {
    /// Creates the initial `queued` record for a request.
    pub fn queued(request: &JobRequest) -> Self {
        Self {
            id: request.id.clone(),
            url: request.url.clone(),
            status: JobStatus::Queued,
            progress: 0,
            stage_message: "Waiting for worker".to_string(),
            error: None,
            cancel_requested: false,
            created_at: request.submitted_at,
            updated_at: request.submitted_at,
            completed_at: None,
            result_episode_id: None,
        }
    }

    /// Total elapsed wall-clock time for the job, in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.completed_at.unwrap_or_else(Utc::now);
        (end - self.created_at).num_milliseconds() as f64 / 1000.0
    }

    /// Merges an update into the record, enforcing the state machine
    /// invariants.
    ///
    /// Returns `false` (leaving the record untouched apart from nothing)
    /// when the record is already terminal. A `progress` value lower than
    /// the current one is ignored; all other fields merge normally and
    /// `updated_at` is bumped.
    pub fn apply(&mut self, update: JobUpdate) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let now = Utc::now();

        if let Some(status) = update.status {
            // Stages never re-enter an earlier one; terminal states are
            // reachable from any live stage. A backwards status is ignored
            // like a backwards progress value.
            if status.is_terminal() || status >= self.status {
                self.status = status;
                if status.is_terminal() {
                    self.completed_at = Some(now);
                }
            }
        }
        if let Some(progress) = update.progress {
            // Progress is monotonically non-decreasing within a job.
            if progress > self.progress {
                self.progress = progress;
            }
        }
        if let Some(message) = update.stage_message {
            self.stage_message = message;
        }
        if let Some(error) = update.error {
            self.error = Some(error);
        }
        if let Some(episode_id) = update.result_episode_id {
            self.result_episode_id = Some(episode_id);
        }

        self.updated_at = now;
        true
    }
}

/// Partial update merged into a [`JobRecord`] by the record store.
#[derive(Debug, Clone, Default)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub progress: Option<u8>,
    pub stage_message: Option<String>,
    pub error: Option<String>,
    pub result_episode_id: Option<String>,
}

impl JobUpdate {
    /// Update for entering a pipeline stage: status, its entry checkpoint,
    /// and a human-readable message.
    pub fn stage(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            progress: Some(status.checkpoint()),
            stage_message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Terminal failure update; progress is left frozen where it was.
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Some(JobStatus::Failed),
            stage_message: Some(format!("Failed: {error}")),
            error: Some(error),
            ..Self::default()
        }
    }

    /// Terminal cancellation update.
    pub fn cancelled() -> Self {
        Self {
            status: Some(JobStatus::Cancelled),
            stage_message: Some("Cancelled by request".to_string()),
            ..Self::default()
        }
    }

    /// Terminal success update carrying the published episode id.
    pub fn completed(episode_id: impl Into<String>) -> Self {
        Self {
            status: Some(JobStatus::Completed),
            progress: Some(100),
            stage_message: Some("Episode published".to_string()),
            result_episode_id: Some(episode_id.into()),
            ..Self::default()
        }
    }
}
