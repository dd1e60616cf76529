//! Maker-checker routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tracing::info;
use vaultline_core::workflow::MutationRequest;
use vaultline_shared::types::WorkflowInstanceId;

use super::{PageQuery, outcome_response};
use crate::{AppState, error::ApiError, middleware::Actor};

/// Creates the workflow routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/workflow/requests", post(submit_request))
        .route("/workflow/pending", get(list_pending))
        .route("/workflow/instances/{id}", get(get_instance))
        .route("/workflow/instances/{id}/approve", post(approve_instance))
        .route("/workflow/instances/{id}/reject", post(reject_instance))
}

/// Request body for rejecting an instance.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    /// Why the change was refused. Required.
    #[serde(default)]
    pub reason: String,
}

/// POST `/workflow/requests` - Submit a withdrawal or transfer.
///
/// Configuration changes are submitted through the `/config` routes.
async fn submit_request(
    State(state): State<AppState>,
    actor: Actor,
    Json(request): Json<MutationRequest>,
) -> Result<Response, ApiError> {
    if request.amount().is_none() {
        return Err(ApiError::bad_request(
            "Only withdrawal and transfer requests are accepted here",
        ));
    }

    let outcome = state.workflow.submit(request, actor.id()).await?;
    info!(
        instance_id = %outcome.instance.id,
        definition_id = %outcome.instance.definition_id,
        status = %outcome.instance.status,
        actor = %actor.id(),
        "Monetary request submitted"
    );
    Ok(outcome_response(outcome))
}

/// GET `/workflow/pending` - Approval queue for the caller's role.
async fn list_pending(
    State(state): State<AppState>,
    actor: Actor,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let role = actor.require_role()?;
    let page = state
        .workflow
        .list_pending(role, &query.page_request())
        .await?;
    Ok(Json(page).into_response())
}

/// GET `/workflow/instances/{id}` - One instance.
async fn get_instance(
    State(state): State<AppState>,
    Path(id): Path<WorkflowInstanceId>,
) -> Result<Response, ApiError> {
    let instance = state.workflow.get(id).await?;
    Ok(Json(instance).into_response())
}

/// POST `/workflow/instances/{id}/approve` - Approve and apply.
async fn approve_instance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<WorkflowInstanceId>,
) -> Result<Response, ApiError> {
    let outcome = state.workflow.approve(id, actor.id()).await?;
    Ok(outcome_response(outcome))
}

/// POST `/workflow/instances/{id}/reject` - Reject with a reason.
async fn reject_instance(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<WorkflowInstanceId>,
    Json(body): Json<RejectRequest>,
) -> Result<Response, ApiError> {
    let instance = state.workflow.reject(id, actor.id(), &body.reason).await?;
    Ok(Json(instance).into_response())
}
