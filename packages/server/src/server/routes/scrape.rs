//! Scrape job submission, status and the manual process trigger.

use axum::{
    extract::{Extension, Path},
    Json,
};
use scrape_pipeline::{job_status, submit, JobId, JobStatus, JobStatusView, SubmitRequest};
use serde::Serialize;
use tracing::info;

use crate::kernel::{run_guarded_cycle, GuardedCycle};
use crate::server::app::AppState;
use crate::server::error::ApiError;
use crate::server::middleware::Caller;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub success: bool,
    pub job_id: JobId,
    pub status: JobStatus,
    pub total_urls: u32,
}

/// `POST /api/scrape/batch`
///
/// Body: `{ "urls": [..] }` or `{ "crawlUrl": ".." }`. In queue mode the
/// job's messages are enqueued before responding.
pub async fn submit_batch_handler(
    Extension(state): Extension<AppState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let submission = request.into_submission()?;
    let job = submit(&*state.store, submission).await?;

    if let Some(queue) = &state.queue {
        queue.enqueue_job(&job).await?;
    }

    info!(job_id = %job.id, total_urls = job.total_urls, "Scrape job submitted");
    Ok(Json(SubmitResponse {
        success: true,
        job_id: job.id,
        status: job.status,
        total_urls: job.total_urls,
    }))
}

/// `GET /api/scrape/:job_id`
pub async fn job_status_handler(
    Extension(state): Extension<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusView>, ApiError> {
    let job_id = JobId::parse(&job_id)
        .map_err(|_| ApiError::BadRequest(format!("Invalid job id: {}", job_id)))?;

    let view = job_status(&*state.store, job_id).await?;
    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub success: bool,
    pub message: String,
    pub processed: u32,
    pub successful: u32,
    pub failed: u32,
}

/// `POST /api/scrape/process`
///
/// Runs one dispatcher cycle now. Requires the cron secret header.
pub async fn process_handler(
    Extension(state): Extension<AppState>,
    Extension(caller): Extension<Caller>,
) -> Result<Json<ProcessResponse>, ApiError> {
    caller.require_cron()?;

    let response = match run_guarded_cycle(&state.dispatcher, &state.cycle_lock).await? {
        GuardedCycle::Ran(report) => ProcessResponse {
            success: true,
            message: report.summary(),
            processed: report.tallies.processed,
            successful: report.tallies.successful,
            failed: report.tallies.failed,
        },
        GuardedCycle::Busy => ProcessResponse {
            success: true,
            message: "A scrape cycle is already running".to_string(),
            processed: 0,
            successful: 0,
            failed: 0,
        },
    };

    Ok(Json(response))
}
