//! Batch scheduler error types.

use thiserror::Error;
use vaultline_shared::AppError;
use vaultline_shared::types::BatchRecordId;

use crate::batch::types::BatchStatus;
use crate::error::{ErrorKind, RepositoryError};

/// Errors that can occur when registering or running jobs.
#[derive(Debug, Error)]
pub enum BatchError {
    /// No handler is registered under this name.
    #[error("Job '{0}' is not registered")]
    JobNotFound(String),

    /// A RUNNING record already exists for this job.
    #[error("Job '{0}' is already running")]
    AlreadyRunning(String),

    /// A different handler is already registered under this name.
    #[error("Job '{0}' is already registered with a different handler")]
    HandlerConflict(String),

    /// Malformed input.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Record id is unknown.
    #[error("Batch record {0} not found")]
    RecordNotFound(BatchRecordId),

    /// The record is not in a status that allows the operation.
    #[error("Batch record {id} is {status}")]
    InvalidState {
        /// Record id.
        id: BatchRecordId,
        /// Current status.
        status: BatchStatus,
    },

    /// Repository failure.
    #[error(transparent)]
    Storage(#[from] RepositoryError),
}

impl BatchError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::JobNotFound(_) | Self::RecordNotFound(_) => ErrorKind::NotFound,
            Self::AlreadyRunning(_) | Self::HandlerConflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
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
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::AlreadyRunning(_) => "JOB_ALREADY_RUNNING",
            Self::HandlerConflict(_) => "CONFLICT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::RecordNotFound(_) => "BATCH_RECORD_NOT_FOUND",
            Self::InvalidState { .. } => "INVALID_STATE",
            Self::Storage(RepositoryError::Conflict(_)) => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
        }
    }
}

impl From<BatchError> for AppError {
    fn from(err: BatchError) -> Self {
        err.kind().into_app_error(err.to_string())
    }
}
