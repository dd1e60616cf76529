//! Error responses.
//!
//! Every engine error becomes `{"error": CODE, "message": text, "retryable": bool}`
//! with the status code of its `ErrorKind`. Storage and internal failures are
//! logged and answered with a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;
use vaultline_core::batch::BatchError;
use vaultline_core::error::{ErrorKind, RepositoryError};
use vaultline_core::versioning::VersioningError;
use vaultline_core::workflow::WorkflowError;
use vaultline_shared::AppError;

/// An error rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    retryable: bool,
}

impl ApiError {
    fn from_kind(kind: ErrorKind, code: &'static str, message: String) -> Self {
        Self {
            status: StatusCode::from_u16(kind.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code,
            message,
            retryable: kind.is_retryable(),
        }
    }

    /// 401 for requests without a caller identity.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "UNAUTHORIZED",
            message: message.into(),
            retryable: false,
        }
    }

    /// 403 for callers lacking a role.
    #[must_use]
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            code: "FORBIDDEN",
            message: message.into(),
            retryable: false,
        }
    }

    /// 400 for malformed input caught at the boundary.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "VALIDATION_ERROR",
            message: message.into(),
            retryable: false,
        }
    }

    /// 404 for lookups that found nothing.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "NOT_FOUND",
            message: message.into(),
            retryable: false,
        }
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        self.code
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = if self.status.is_server_error() && self.status != StatusCode::BAD_GATEWAY {
            error!(code = self.code, error = %self.message, "Request failed");
            "An internal error occurred".to_string()
        } else {
            self.message
        };

        (
            self.status,
            Json(json!({
                "error": self.code,
                "message": message,
                "retryable": self.retryable
            })),
        )
            .into_response()
    }
}

impl From<VersioningError> for ApiError {
    fn from(err: VersioningError) -> Self {
        Self::from_kind(err.kind(), err.error_code(), err.to_string())
    }
}

impl From<WorkflowError> for ApiError {
    fn from(err: WorkflowError) -> Self {
        Self::from_kind(err.kind(), err.error_code(), err.to_string())
    }
}

impl From<BatchError> for ApiError {
    fn from(err: BatchError) -> Self {
        Self::from_kind(err.kind(), err.error_code(), err.to_string())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        let code = match err {
            RepositoryError::Conflict(_) => "CONFLICT",
            RepositoryError::Corrupt(_) | RepositoryError::Database(_) => "STORAGE_ERROR",
        };
        Self::from_kind(err.kind(), code, err.to_string())
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self {
            status: StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            code: err.error_code(),
            retryable: err.is_retryable(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vaultline_shared::types::{ActorId, VersionId, WorkflowInstanceId};
    use vaultline_core::versioning::VersionStatus;

    #[test]
    fn test_versioning_errors_keep_code_and_status() {
        let err: ApiError = VersioningError::ImmutableField {
            id: VersionId::new(),
            field: "value".into(),
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "IMMUTABLE_FIELD");
        assert!(!err.retryable);

        let err: ApiError = VersioningError::InvalidState {
            id: VersionId::new(),
            status: VersionStatus::Archived,
            operation: "archive",
        }
        .into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_conflicts_are_retryable() {
        let err: ApiError = BatchError::AlreadyRunning("Daily Accrual".into()).into();
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.retryable);

        let err: ApiError = RepositoryError::Conflict("lost".into()).into();
        assert_eq!(err.code(), "CONFLICT");
        assert!(err.retryable);
    }

    #[test]
    fn test_workflow_authorization_errors_are_forbidden() {
        let err: ApiError = WorkflowError::SelfApproval(ActorId::new("maker").unwrap()).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "SELF_APPROVAL");

        let err: ApiError = WorkflowError::InstanceNotFound(WorkflowInstanceId::new()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_storage_error_maps_to_500() {
        let err: ApiError = RepositoryError::Database("connection reset".into()).into();
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "STORAGE_ERROR");
        assert!(!err.retryable);
    }
}
