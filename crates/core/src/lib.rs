//! Core business logic for Vaultline.
//!
//! This crate contains the configuration and approval engine with ZERO web
//! or database dependencies. Storage is reached through the traits in
//! `repository`; the in-memory implementations live here too.
//!
//! # Modules
//!
//! - `versioning` - Versioned configuration (DRAFT → ACTIVE → ARCHIVED)
//! - `workflow` - Maker-checker approvals
//! - `policy` - Approval policy resolution and the role model
//! - `batch` - Batch job scheduler
//! - `audit` - Append-only audit trail
//! - `repository` - Storage seams and in-memory implementations
//! - `error` - Shared error classification

pub mod audit;
pub mod batch;
pub mod error;
pub mod policy;
pub mod repository;
pub mod versioning;
pub mod workflow;

pub use audit::{AuditEvent, AuditFilter, AuditLog, AuditRecord};
pub use batch::{BatchError, BatchRecord, BatchStatus, JobHandler, JobScheduler};
pub use error::{ErrorKind, RepositoryError};
pub use policy::{ApprovalPolicyResolver, Policy, RoleDirectory, RoleHierarchy};
pub use versioning::{
    ConfigPayload, EntityType, VersionStatus, VersionedEntity, VersionedEntityStore,
    VersioningError,
};
pub use workflow::{
    InstanceStatus, MutationRequest, WorkflowEngine, WorkflowError, WorkflowInstance,
    WorkflowOutcome,
};
