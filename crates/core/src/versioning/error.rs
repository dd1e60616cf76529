//! Versioning error types.

use thiserror::Error;
use vaultline_shared::AppError;
use vaultline_shared::types::{EntityId, VersionId};

use crate::error::{ErrorKind, RepositoryError};
use crate::versioning::types::VersionStatus;

/// Errors raised by the versioned configuration store.
#[derive(Debug, Clone, Error)]
pub enum VersioningError {
    /// Payload missing required fields or carrying bad values.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Operation not allowed in the version's current status.
    #[error("Cannot {operation} version {id} in status {status}")]
    InvalidState {
        /// Version row.
        id: VersionId,
        /// Its current status.
        status: VersionStatus,
        /// Attempted operation.
        operation: &'static str,
    },

    /// Protected field changed on an ACTIVE version.
    #[error("Field '{field}' is immutable while version {id} is ACTIVE; clone it instead")]
    ImmutableField {
        /// Version row.
        id: VersionId,
        /// Offending field.
        field: String,
    },

    /// Lost a race against a concurrent writer on the same lineage.
    #[error("Conflicting change on entity {entity_id}: {detail}")]
    Conflict {
        /// Lineage.
        entity_id: EntityId,
        /// What moved underneath the caller.
        detail: String,
    },

    /// Unknown version id.
    #[error("Version {0} not found")]
    VersionNotFound(VersionId),

    /// Unknown lineage id.
    #[error("Entity {0} not found")]
    LineageNotFound(EntityId),

    /// Repository failure.
    #[error(transparent)]
    Storage(RepositoryError),
}

impl VersioningError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
            Self::ImmutableField { .. } => ErrorKind::ImmutableField,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::VersionNotFound(_) | Self::LineageNotFound(_) => ErrorKind::NotFound,
            Self::Storage(e) => e.kind(),
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.kind().status_code()
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::ImmutableField { .. } => "IMMUTABLE_FIELD",
            Self::Conflict { .. } => "CONFLICT",
            Self::VersionNotFound(_) => "VERSION_NOT_FOUND",
            Self::LineageNotFound(_) => "ENTITY_NOT_FOUND",
            Self::Storage(RepositoryError::Conflict(_)) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<RepositoryError> for VersioningError {
    fn from(err: RepositoryError) -> Self {
        Self::Storage(err)
    }
}

impl From<VersioningError> for AppError {
    fn from(err: VersioningError) -> Self {
        err.kind().into_app_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_error() {
        let err = VersioningError::InvalidState {
            id: VersionId::new(),
            status: VersionStatus::Archived,
            operation: "update",
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(err.to_string().contains("ARCHIVED"));
    }

    #[test]
    fn test_immutable_field_error() {
        let err = VersioningError::ImmutableField {
            id: VersionId::new(),
            field: "method".into(),
        };
        assert_eq!(err.status_code(), 422);
        assert!(err.kind().is_invalid_state());
        assert!(err.to_string().contains("'method'"));
    }

    #[test]
    fn test_conflict_is_retryable() {
        let err = VersioningError::Conflict {
            entity_id: EntityId::new(),
            detail: "active pointer moved".into(),
        };
        assert_eq!(err.status_code(), 409);
        assert!(err.kind().is_retryable());
        let app: AppError = err.into();
        assert!(app.is_retryable());
    }

    #[test]
    fn test_storage_conflict_keeps_conflict_kind() {
        let err: VersioningError = RepositoryError::Conflict("duplicate version".into()).into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.error_code(), "CONFLICT");
    }
}
