//! Caller identity middleware for protected routes.
//!
//! Authentication happens upstream; the gateway forwards the authenticated
//! actor id in `X-Actor-Id`. The role is looked up here so handlers never
//! trust a role claimed by the client.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use vaultline_shared::types::{ActorId, Role};

use crate::{AppState, error::ApiError};

/// Header carrying the authenticated actor id.
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Identity middleware.
///
/// Rejects requests without a usable `X-Actor-Id` with 401 and stores the
/// resolved [`Actor`] in request extensions. Actors unknown to the role
/// directory pass through without a role.
pub async fn actor_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let actor_id = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(ActorId::new);

    let Some(id) = actor_id else {
        return ApiError::unauthorized("X-Actor-Id header is required").into_response();
    };

    let role = state.roles.role_of(&id);
    request.extensions_mut().insert(Actor { id, role });
    next.run(request).await
}

/// The caller of a protected route.
///
/// ```ignore
/// async fn handler(actor: Actor) -> impl IntoResponse {
///     let who = actor.id();
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct Actor {
    id: ActorId,
    role: Option<Role>,
}

impl Actor {
    /// The caller's actor id.
    #[must_use]
    pub const fn id(&self) -> &ActorId {
        &self.id
    }

    /// The caller's role, if the directory knows one.
    #[must_use]
    pub const fn role(&self) -> Option<&Role> {
        self.role.as_ref()
    }

    /// The caller's role, or 403.
    pub fn require_role(&self) -> Result<&Role, ApiError> {
        self.role
            .as_ref()
            .ok_or_else(|| ApiError::forbidden(format!("Actor {} has no role assigned", self.id)))
    }
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Caller identity required"))
    }
}
