//! Postgres implementations of the core storage traits.
//!
//! Every guarded write is conditional on the row's current status, and
//! unique-index violations surface as `RepositoryError::Conflict`, so the
//! engine sees the same lost-race errors it gets from the in-memory
//! repositories.

mod convert;

pub mod audit;
pub mod batch;
pub mod version;
pub mod workflow;

pub use audit::PgAuditRepository;
pub use batch::PgBatchRepository;
pub use version::PgVersionRepository;
pub use workflow::PgWorkflowRepository;
