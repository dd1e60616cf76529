//! Versioned configuration routes.
//!
//! Reads, draft creation and cloning go straight to the store. Updates,
//! activation and archival are submitted to the workflow engine, which
//! either applies them at once (200) or parks them for a checker (202).

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use vaultline_core::versioning::{ConfigPayload, EntityType, FieldPatch};
use vaultline_core::workflow::MutationRequest;
use vaultline_shared::types::{EntityId, VersionId};

use super::outcome_response;
use crate::{AppState, error::ApiError, middleware::Actor};

/// Creates the configuration routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/config/{entity_type}", post(create_version))
        .route(
            "/config/versions/{id}",
            get(get_version).patch(update_version),
        )
        .route("/config/versions/{id}/clone", post(clone_version))
        .route("/config/versions/{id}/archive", post(archive_version))
        .route("/config/versions/{id}/activate", post(activate_version))
        .route("/config/lineages/{entity_id}", get(get_lineage))
        .route("/config/lineages/{entity_id}/active", get(get_active_version))
        .route("/config/active/{entity_type}", get(list_active))
}

// ============================================================================
// Request Types
// ============================================================================

/// Request body for creating a draft.
#[derive(Debug, Deserialize)]
pub struct CreateVersionRequest {
    /// Existing lineage to append to; a new lineage when absent.
    pub entity_id: Option<EntityId>,
    /// Field object for the entity type in the path.
    pub payload: Value,
}

fn parse_entity_type(raw: &str) -> Result<EntityType, ApiError> {
    EntityType::parse(raw).ok_or_else(|| ApiError::bad_request(format!("Unknown entity type: {raw}")))
}

// ============================================================================
// Route Handlers
// ============================================================================

/// POST `/config/{entity_type}` - Create a DRAFT version.
async fn create_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(entity_type): Path<String>,
    Json(body): Json<CreateVersionRequest>,
) -> Result<Response, ApiError> {
    let entity_type = parse_entity_type(&entity_type)?;
    let payload = ConfigPayload::from_fields(entity_type, body.payload)?;
    let entity = state
        .versions
        .create(body.entity_id, payload, actor.id())
        .await?;

    info!(
        version_id = %entity.id,
        entity_id = %entity.entity_id,
        version = entity.version,
        actor = %actor.id(),
        "Configuration draft created"
    );
    Ok((StatusCode::CREATED, Json(entity)).into_response())
}

/// GET `/config/versions/{id}` - Get one version.
async fn get_version(
    State(state): State<AppState>,
    Path(id): Path<VersionId>,
) -> Result<Response, ApiError> {
    let entity = state.versions.get(id).await?;
    Ok(Json(entity).into_response())
}

/// PATCH `/config/versions/{id}` - Patch fields through the workflow.
async fn update_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<VersionId>,
    Json(patch): Json<FieldPatch>,
) -> Result<Response, ApiError> {
    let request = MutationRequest::Update {
        version_id: id,
        patch,
    };
    let outcome = state.workflow.submit(request, actor.id()).await?;
    Ok(outcome_response(outcome))
}

/// POST `/config/versions/{id}/clone` - New DRAFT from an ACTIVE version.
async fn clone_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<VersionId>,
) -> Result<Response, ApiError> {
    let draft = state.versions.clone_version(id, actor.id()).await?;
    info!(
        source_id = %id,
        version_id = %draft.id,
        version = draft.version,
        actor = %actor.id(),
        "Configuration version cloned"
    );
    Ok((StatusCode::CREATED, Json(draft)).into_response())
}

/// POST `/config/versions/{id}/archive` - Request archival.
async fn archive_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<VersionId>,
) -> Result<Response, ApiError> {
    let outcome = state
        .workflow
        .submit(MutationRequest::Archive { version_id: id }, actor.id())
        .await?;
    Ok(outcome_response(outcome))
}

/// POST `/config/versions/{id}/activate` - Request activation.
async fn activate_version(
    State(state): State<AppState>,
    actor: Actor,
    Path(id): Path<VersionId>,
) -> Result<Response, ApiError> {
    let outcome = state
        .workflow
        .submit(MutationRequest::Activate { version_id: id }, actor.id())
        .await?;
    Ok(outcome_response(outcome))
}

/// GET `/config/lineages/{entity_id}` - All versions, oldest first.
async fn get_lineage(
    State(state): State<AppState>,
    Path(entity_id): Path<EntityId>,
) -> Result<Response, ApiError> {
    let versions = state.versions.lineage(entity_id).await?;
    Ok(Json(json!({ "data": versions })).into_response())
}

/// GET `/config/lineages/{entity_id}/active` - The live version.
async fn get_active_version(
    State(state): State<AppState>,
    Path(entity_id): Path<EntityId>,
) -> Result<Response, ApiError> {
    match state.versions.get_active(entity_id).await? {
        Some(entity) => Ok(Json(entity).into_response()),
        None => Err(ApiError::not_found(format!(
            "Entity {entity_id} has no ACTIVE version"
        ))),
    }
}

/// GET `/config/active/{entity_type}` - Every live version of a type.
async fn list_active(
    State(state): State<AppState>,
    Path(entity_type): Path<String>,
) -> Result<Response, ApiError> {
    let entity_type = parse_entity_type(&entity_type)?;
    let versions = state.versions.list_active(entity_type).await?;
    Ok(Json(json!({ "data": versions })).into_response())
}
