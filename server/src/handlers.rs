use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::{error, info, warn};

use paperdigest::{Job, JobRequest, JobResult, PipelineContext};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Runs one job to completion and reports what it produced.
///
/// The job runs on its own task so a panic inside it becomes a 500 instead
/// of tearing down the connection.
pub async fn run_job(
    State(state): State<AppState>,
    payload: Result<Json<JobRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected job request");
        ApiError::BadRequest(rejection.body_text())
    })?;

    let job = Job::from_request(request);
    info!(job_id = %job.id, record_id = %job.record_id, "Job received");

    let pipeline = state.pipeline.clone();
    let handle = tokio::spawn(async move { pipeline.run(PipelineContext::new(job)).await });

    let (result, ctx) = handle.await.map_err(|e| {
        error!(error = %e, "Job task failed");
        ApiError::Internal
    })?;

    for record in &ctx.journal {
        tracing::debug!(job_id = %ctx.job.id, stage = %record.stage, status = ?record.status, "Stage outcome");
    }

    match result {
        JobResult::Completed(response) => Ok(Json(response).into_response()),
        JobResult::Failed { error } => Err(ApiError::Upstream(error)),
    }
}

/// `OPTIONS` and `HEAD` on the job route: success with no body.
pub async fn preflight() -> StatusCode {
    StatusCode::OK
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}
