//! Workflow error types for maker-checker approvals.

use thiserror::Error;
use vaultline_shared::AppError;
use vaultline_shared::types::{ActorId, Role, VersionId, WorkflowInstanceId};

use crate::error::{ErrorKind, RepositoryError};
use crate::versioning::error::VersioningError;
use crate::workflow::ledger::LedgerError;
use crate::workflow::types::InstanceStatus;

/// Errors that can occur during workflow operations.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Instance id is unknown.
    #[error("Workflow instance {0} not found")]
    InstanceNotFound(WorkflowInstanceId),

    /// Attempted an invalid status transition.
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: InstanceStatus,
        /// The attempted target status.
        to: InstanceStatus,
    },

    /// The maker tried to check their own request.
    #[error("Actor {0} submitted this request and cannot resolve it")]
    SelfApproval(ActorId),

    /// The actor has no role at all.
    #[error("Actor {0} has no role assigned")]
    NoRoleAssigned(ActorId),

    /// The actor's role does not satisfy the required role.
    #[error("Role {actual} does not satisfy required role {required}")]
    InsufficientRole {
        /// The actor's role.
        actual: Role,
        /// The required role.
        required: Role,
    },

    /// Rejection reason is required but not provided.
    #[error("Rejection reason is required")]
    ReasonRequired,

    /// The request is malformed (e.g. a non-positive amount).
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The target version is frozen while its activation awaits a checker.
    #[error("Version {version_id} is awaiting activation approval in instance {instance_id}")]
    AwaitingApproval {
        /// Frozen version.
        version_id: VersionId,
        /// The pending activation.
        instance_id: WorkflowInstanceId,
    },

    /// The version changed after the activation request was submitted.
    #[error("Version {0} changed after activation was requested; reject and resubmit")]
    TargetChanged(VersionId),

    /// Another approve or reject of the same instance is in progress.
    #[error("Instance {0} is being resolved by another request")]
    InFlight(WorkflowInstanceId),

    /// Applying a configuration mutation failed.
    #[error(transparent)]
    Versioning(#[from] VersioningError),

    /// Posting a monetary mutation failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Repository failure.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl WorkflowError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InstanceNotFound(_) => ErrorKind::NotFound,
            Self::InvalidTransition { .. }
            | Self::AwaitingApproval { .. }
            | Self::TargetChanged(_) => ErrorKind::InvalidState,
            Self::SelfApproval(_) | Self::NoRoleAssigned(_) | Self::InsufficientRole { .. } => {
                ErrorKind::Authorization
            }
            Self::ReasonRequired | Self::InvalidRequest(_) => ErrorKind::Validation,
            Self::InFlight(_) => ErrorKind::Conflict,
            Self::Versioning(e) => e.kind(),
            Self::Ledger(_) => ErrorKind::External,
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
            Self::InstanceNotFound(_) => "INSTANCE_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_STATE",
            Self::AwaitingApproval { .. } => "AWAITING_APPROVAL",
            Self::TargetChanged(_) => "TARGET_CHANGED",
            Self::SelfApproval(_) => "SELF_APPROVAL",
            Self::NoRoleAssigned(_) => "NO_ROLE_ASSIGNED",
            Self::InsufficientRole { .. } => "INSUFFICIENT_ROLE",
            Self::ReasonRequired => "REJECTION_REASON_REQUIRED",
            Self::InvalidRequest(_) => "VALIDATION_ERROR",
            Self::InFlight(_) => "CONFLICT",
            Self::Versioning(e) => e.error_code(),
            Self::Ledger(_) => "LEDGER_ERROR",
            Self::Storage(RepositoryError::Conflict(_)) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<WorkflowError> for AppError {
    fn from(err: WorkflowError) -> Self {
        err.kind().into_app_error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::types::VersionStatus;

    #[test]
    fn test_invalid_transition_error() {
        let err = WorkflowError::InvalidTransition {
            from: InstanceStatus::Approved,
            to: InstanceStatus::Rejected,
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "INVALID_STATE");
        assert!(err.to_string().contains("APPROVED"));
    }

    #[test]
    fn test_self_approval_error() {
        let err = WorkflowError::SelfApproval(ActorId::new("alice").unwrap());
        assert_eq!(err.status_code(), 403);
        assert_eq!(err.error_code(), "SELF_APPROVAL");
    }

    #[test]
    fn test_insufficient_role_error() {
        let err = WorkflowError::InsufficientRole {
            actual: Role::new("TELLER").unwrap(),
            required: Role::new("CFO").unwrap(),
        };
        assert_eq!(err.status_code(), 403);
        assert!(!err.kind().is_retryable());
    }

    #[test]
    fn test_reason_required_error() {
        let err = WorkflowError::ReasonRequired;
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.error_code(), "REJECTION_REASON_REQUIRED");
    }

    #[test]
    fn test_versioning_error_keeps_its_kind() {
        let err: WorkflowError = VersioningError::InvalidState {
            id: VersionId::new(),
            status: VersionStatus::Archived,
            operation: "activate",
        }
        .into();
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "INVALID_STATE");
    }

    #[test]
    fn test_frozen_target_is_invalid_state() {
        let err = WorkflowError::AwaitingApproval {
            version_id: VersionId::new(),
            instance_id: WorkflowInstanceId::new(),
        };
        assert_eq!(err.status_code(), 422);
        assert_eq!(err.error_code(), "AWAITING_APPROVAL");
        assert!(!err.kind().is_retryable());
        assert_eq!(WorkflowError::TargetChanged(VersionId::new()).status_code(), 422);
    }

    #[test]
    fn test_in_flight_is_retryable() {
        let err = WorkflowError::InFlight(WorkflowInstanceId::new());
        assert_eq!(err.status_code(), 409);
        assert!(err.kind().is_retryable());
    }

    #[test]
    fn test_ledger_error_is_external() {
        let err: WorkflowError = LedgerError::Unavailable("timeout".into()).into();
        assert_eq!(err.status_code(), 502);
    }
}
