//! Job API Handlers
//!
//! HTTP endpoints for submitting URLs and observing job lifecycle.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use echocast_core::domain::job::{JobRequest, JobUpdate};
use echocast_core::dto::job::{CancelOutcome, JobStatusView, SubmitAccepted, SubmitJob};
use echocast_store::StoreError;
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 200;

/// POST /job/submit
/// Validate the URL, persist the initial record, and enqueue the job.
pub async fn submit_job(
    State(state): State<AppState>,
    Json(req): Json<SubmitJob>,
) -> ApiResult<(StatusCode, Json<SubmitAccepted>)> {
    validate_url(&req.url)?;

    let request = JobRequest::new(req.url, req.llm_model, req.tts_model);
    tracing::info!("Submitting job {} for {}", request.id, request.url);

    // Record first, then queue entry: a job that is visible in status
    // listings but never ran is diagnosable, the reverse is not.
    state.records.create(&request)?;

    if let Err(e) = state.queue.enqueue(&request) {
        if let Err(update_err) = state
            .records
            .update(&request.id, JobUpdate::failed(format!("QueueError: {e}")))
        {
            tracing::error!(
                "Could not mark unenqueued job {} as failed: {}",
                request.id,
                update_err
            );
        }
        return Err(ApiError::Unavailable(format!("could not enqueue job: {e}")));
    }

    Ok((StatusCode::ACCEPTED, Json(SubmitAccepted { id: request.id })))
}

/// GET /job/{id}
/// Get the status view of a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobStatusView>> {
    tracing::debug!("Getting job: {}", id);

    match state.records.get(&id) {
        Ok(Some(record)) => Ok(Json(JobStatusView::from(&record))),
        Ok(None) | Err(StoreError::RecordNotFound(_)) => {
            Err(ApiError::NotFound(format!("Job {} not found", id)))
        }
        Err(e) => Err(e.into()),
    }
}

/// POST /job/{id}/cancel
/// Flag a live job for cooperative cancellation.
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CancelOutcome>> {
    tracing::info!("Cancel requested for job: {}", id);

    match state.records.request_cancel(&id) {
        Ok(accepted) => Ok(Json(CancelOutcome { accepted })),
        Err(StoreError::RecordNotFound(_)) => {
            Err(ApiError::NotFound(format!("Job {} not found", id)))
        }
        Err(e) => Err(e.into()),
    }
}

/// GET /job/list
/// List jobs, newest first.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Json<Vec<JobStatusView>>> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);
    let offset = params.offset.unwrap_or(0);
    tracing::debug!("Listing jobs (limit {}, offset {})", limit, offset);

    let records = state.records.list(limit, offset)?;
    Ok(Json(records.iter().map(JobStatusView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

fn validate_url(raw: &str) -> Result<(), ApiError> {
    let parsed =
        url::Url::parse(raw).map_err(|e| ApiError::BadRequest(format!("invalid url: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::BadRequest(format!(
            "unsupported url scheme: {}",
            parsed.scheme()
        )));
    }
    if parsed.host_str().is_none() {
        return Err(ApiError::BadRequest("url has no host".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use echocast_core::domain::job::JobStatus;

    fn state(dir: &std::path::Path) -> AppState {
        let config = Config {
            bind_addr: String::new(),
            data_dir: dir.to_path_buf(),
        };
        AppState::open(&config).unwrap()
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/article").is_ok());
        assert!(validate_url("http://example.com").is_ok());
        assert!(validate_url("not a url").is_err());
        assert!(validate_url("ftp://example.com/file").is_err());
        assert!(validate_url("file:///etc/passwd").is_err());
    }

    #[tokio::test]
    async fn test_submit_creates_record_and_queue_entry() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let (status, Json(accepted)) = submit_job(
            State(state.clone()),
            Json(SubmitJob {
                url: "https://example.com/article".to_string(),
                llm_model: None,
                tts_model: None,
            }),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(state.queue.len().unwrap(), 1);

        let record = state.records.get(&accepted.id).unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Queued);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_url() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let result = submit_job(
            State(state.clone()),
            Json(SubmitJob {
                url: "ftp://example.com".to_string(),
                llm_model: None,
                tts_model: None,
            }),
        )
        .await;

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert!(state.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_get_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let result = get_job(State(state), Path("deadbeef".to_string())).await;
        assert!(matches!(result, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancel_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        let (_, Json(accepted)) = submit_job(
            State(state.clone()),
            Json(SubmitJob {
                url: "https://example.com/article".to_string(),
                llm_model: None,
                tts_model: None,
            }),
        )
        .await
        .unwrap();

        let Json(outcome) = cancel_job(State(state.clone()), Path(accepted.id.clone()))
            .await
            .unwrap();
        assert!(outcome.accepted);

        let Json(view) = get_job(State(state), Path(accepted.id)).await.unwrap();
        assert!(view.cancel_requested);
    }

    #[tokio::test]
    async fn test_list_jobs_paginates() {
        let dir = tempfile::tempdir().unwrap();
        let state = state(dir.path());

        for i in 0..3 {
            submit_job(
                State(state.clone()),
                Json(SubmitJob {
                    url: format!("https://example.com/{i}"),
                    llm_model: None,
                    tts_model: None,
                }),
            )
            .await
            .unwrap();
        }

        let Json(page) = list_jobs(
            State(state),
            Query(ListQuery {
                limit: Some(2),
                offset: Some(0),
            }),
        )
        .await
        .unwrap();
        assert_eq!(page.len(), 2);
    }
}
