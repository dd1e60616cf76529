//! Error taxonomy shared by every engine component.
//!
//! Each module keeps its own `thiserror` enum; `ErrorKind` is the common
//! classification the HTTP boundary and callers use to decide whether to
//! show a reason, offer a retry, or hide the action.

use thiserror::Error;
use vaultline_shared::AppError;

/// Classification of an engine error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing input. Not retried.
    Validation,
    /// Operation illegal for the current lifecycle state. Re-fetch state.
    InvalidState,
    /// Protected field modified on an ACTIVE entity (an `InvalidState` subtype).
    ImmutableField,
    /// Concurrent mutation lost the race. Retry after re-reading.
    Conflict,
    /// Role or actor mismatch. Never retried.
    Authorization,
    /// Unknown job, entity, version or instance.
    NotFound,
    /// External collaborator (ledger gateway) failed.
    External,
    /// Persistence failure.
    Storage,
}

impl ErrorKind {
    /// Returns the HTTP status code for this kind.
    #[must_use]
    pub const fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Authorization => 403,
            Self::NotFound => 404,
            Self::Conflict => 409,
            Self::InvalidState | Self::ImmutableField => 422,
            Self::External => 502,
            Self::Storage => 500,
        }
    }

    /// Whether the caller may retry after re-reading current state.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Conflict)
    }

    /// Returns true for `InvalidState` and its `ImmutableField` subtype.
    #[must_use]
    pub const fn is_invalid_state(self) -> bool {
        matches!(self, Self::InvalidState | Self::ImmutableField)
    }

    /// Folds an error message of this kind into the application error type.
    #[must_use]
    pub fn into_app_error(self, message: String) -> AppError {
        match self {
            Self::Validation => AppError::Validation(message),
            Self::InvalidState => AppError::InvalidState(message),
            Self::ImmutableField => AppError::ImmutableField(message),
            Self::Conflict => AppError::Conflict(message),
            Self::Authorization => AppError::Forbidden(message),
            Self::NotFound => AppError::NotFound(message),
            Self::External => AppError::ExternalService(message),
            Self::Storage => AppError::Database(message),
        }
    }
}

/// Errors raised by repository implementations.
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// A conditional write lost against a concurrent writer, or a uniqueness
    /// constraint rejected the row.
    #[error("Conflicting write: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into its domain type.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),
}

impl RepositoryError {
    /// Returns the classification of this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Corrupt(_) | Self::Database(_) => ErrorKind::Storage,
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        err.kind().into_app_error(err.to_string())
    }
}
