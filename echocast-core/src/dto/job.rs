//! Job DTOs for the submission/status API

use serde::{Deserialize, Serialize};

use crate::domain::job::{JobRecord, JobStatus};

/// Request to submit a new URL for processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitJob {
    pub url: String,
    pub llm_model: Option<String>,
    pub tts_model: Option<String>,
}

/// Acknowledgement that a submission was durably enqueued.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitAccepted {
    pub id: String,
}

/// Outcome of a cancellation request.
///
/// `accepted` is `false` when the job was already terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub accepted: bool,
}

/// Status view of a job as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusView {
    pub id: String,
    pub url: String,
    pub status: JobStatus,
    pub progress: u8,
    pub stage_message: String,
    pub error: Option<String>,
    pub cancel_requested: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub elapsed_seconds: f64,
    pub result_episode_id: Option<String>,
}

impl From<&JobRecord> for JobStatusView {
    fn from(record: &JobRecord) -> Self {
        Self {
            id: record.id.clone(),
            url: record.url.clone(),
            status: record.status,
            progress: record.progress,
            stage_message: record.stage_message.clone(),
            error: record.error.clone(),
            cancel_requested: record.cancel_requested,
            created_at: record.created_at,
            updated_at: record.updated_at,
            elapsed_seconds: record.elapsed_seconds(),
            result_episode_id: record.result_episode_id.clone(),
        }
    }
}
