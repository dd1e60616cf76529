//! Audit trail routes.

use axum::{
    Json, Router,
    extract::{Query, State},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use vaultline_core::audit::AuditFilter;
use vaultline_shared::types::{EntityId, WorkflowInstanceId};

use super::page_request;
use crate::{AppState, error::ApiError};

/// Creates the audit routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/audit", get(list_audit))
}

/// Query parameters for the audit trail.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Lifecycle and edit events of this lineage.
    pub entity_id: Option<EntityId>,
    /// Decisions on this instance.
    pub instance_id: Option<WorkflowInstanceId>,
    /// Runs of this job.
    pub job_name: Option<String>,
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page.
    pub per_page: Option<u32>,
}

/// GET `/audit` - Audit records, newest first.
async fn list_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Response, ApiError> {
    let filter = AuditFilter {
        entity_id: query.entity_id,
        instance_id: query.instance_id,
        job_name: query.job_name,
    };
    let page = state
        .audit
        .list(&filter, &page_request(query.page, query.per_page))
        .await?;
    Ok(Json(page).into_response())
}
