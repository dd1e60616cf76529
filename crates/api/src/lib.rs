//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST routes for configuration versions, approvals, batch jobs and the
//!   audit trail
//! - Caller identity middleware (`X-Actor-Id`)
//! - Error responses with the engine's status and code mapping
//! - The HTTP ledger gateway used to post approved monetary requests

pub mod error;
pub mod ledger;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use vaultline_core::audit::AuditLog;
use vaultline_core::batch::JobScheduler;
use vaultline_core::policy::RoleDirectory;
use vaultline_core::versioning::VersionedEntityStore;
use vaultline_core::workflow::WorkflowEngine;

pub use error::ApiError;
pub use ledger::HttpLedgerGateway;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Versioned configuration store (read paths, create and clone).
    pub versions: VersionedEntityStore,
    /// Maker-checker engine; every gated mutation goes through it.
    pub workflow: WorkflowEngine,
    /// Batch job scheduler.
    pub scheduler: JobScheduler,
    /// Audit trail.
    pub audit: AuditLog,
    /// Actor to role lookup for the identity middleware.
    pub roles: Arc<dyn RoleDirectory>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
