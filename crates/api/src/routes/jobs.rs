//! Batch monitor routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use vaultline_shared::types::BatchRecordId;

use super::page_request;
use crate::{AppState, error::ApiError, middleware::Actor};

/// Creates the batch job routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/history", get(job_history))
        .route("/jobs/{job_name}/trigger", post(trigger_job))
        .route("/jobs/records/{id}", get(get_record))
        .route("/jobs/records/{id}/abandon", post(abandon_record))
}

/// Query parameters for the run history.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Only runs of this job.
    pub job_name: Option<String>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page.
    pub per_page: Option<u32>,
}

/// Request body for abandoning a stuck run.
#[derive(Debug, Deserialize)]
pub struct AbandonRequest {
    /// Operator note stored in the error log. Required.
    #[serde(default)]
    pub reason: String,
}

/// GET `/jobs` - Registered job names.
async fn list_jobs(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "data": state.scheduler.jobs() }))
}

/// POST `/jobs/{job_name}/trigger` - Start a run in the background.
async fn trigger_job(
    State(state): State<AppState>,
    actor: Actor,
    Path(job_name): Path<String>,
) -> Result<Response, ApiError> {
    let record = state.scheduler.trigger(&job_name, actor.id()).await?;
    info!(
        record_id = %record.id,
        job_name = %record.job_name,
        actor = %actor.id(),
        "Job triggered"
    );
    Ok((StatusCode::ACCEPTED, Json(record)).into_response())
}

/// GET `/jobs/history` - Runs, newest first.
async fn job_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let job_name = query
        .job_name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());
    let page = state
        .scheduler
        .history(job_name, &page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page).into_response())
}

/// GET `/jobs/records/{id}` - One run.
async fn get_record(
    State(state): State<AppState>,
    Path(id): Path<BatchRecordId>,
) -> Result<Response, ApiError> {
    let record = state.scheduler.get(id).await?;
    Ok(Json(record).into_response())
}

/// POST `/jobs/records/{id}/abandon` - Mark an orphaned RUNNING record FAILED.
async fn abandon_record(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<BatchRecordId>,
    Json(body): Json<AbandonRequest>,
) -> Result<Response, ApiError> {
    let record = state.scheduler.abandon(id, actor.id(), &body.reason).await?;
    Ok(Json(record).into_response())
}
