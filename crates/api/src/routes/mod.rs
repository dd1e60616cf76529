//! API route definitions.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use vaultline_core::workflow::{InstanceStatus, WorkflowOutcome};
use vaultline_shared::types::PageRequest;

use crate::{AppState, middleware::actor_middleware};

pub mod audit;
pub mod config;
pub mod health;
pub mod jobs;
pub mod workflow;

/// Creates the API router; everything except health requires a caller identity.
#[allow(clippy::needless_pass_by_value)]
pub fn api_routes_with_state(state: AppState) -> Router<AppState> {
    let protected_routes = Router::new()
        .merge(config::routes())
        .merge(workflow::routes())
        .merge(jobs::routes())
        .merge(audit::routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            actor_middleware,
        ));

    Router::new()
        .merge(health::routes())
        .merge(protected_routes)
}

/// `page` / `per_page` query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    /// Page number (1-indexed).
    pub page: Option<u32>,
    /// Items per page.
    pub per_page: Option<u32>,
}

impl PageQuery {
    /// Clamped page request, defaulting missing values.
    #[must_use]
    pub fn page_request(&self) -> PageRequest {
        page_request(self.page, self.per_page)
    }
}

pub(crate) fn page_request(page: Option<u32>, per_page: Option<u32>) -> PageRequest {
    let defaults = PageRequest::default();
    PageRequest::new(
        page.unwrap_or(defaults.page),
        per_page.unwrap_or(defaults.per_page),
    )
}

/// 202 while the instance waits for a checker, 200 once it is resolved.
pub(crate) fn outcome_response(outcome: WorkflowOutcome) -> Response {
    let status = match outcome.instance.status {
        InstanceStatus::Pending => StatusCode::ACCEPTED,
        InstanceStatus::Approved | InstanceStatus::Rejected => StatusCode::OK,
    };
    (status, Json(outcome)).into_response()
}
