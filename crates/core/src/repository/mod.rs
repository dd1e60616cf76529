//! Storage seams.
//!
//! The engine talks to persistence only through these traits. Every method
//! that guards an invariant (single ACTIVE version, single RUNNING job,
//! single resolution per instance) is a conditional write that reports a
//! lost race as `RepositoryError::Conflict`.
//!
//! `memory` holds the in-process implementations used by tests and by
//! storage-less deployments; `vaultline-db` provides the Postgres ones.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use vaultline_shared::types::{
    BatchRecordId, EntityId, PageRequest, PageResponse, Role, VersionId, WorkflowInstanceId,
};

use crate::audit::{AuditFilter, AuditRecord};
use crate::batch::types::BatchRecord;
use crate::error::RepositoryError;
use crate::versioning::types::{EntityType, VersionStatus, VersionedEntity};
use crate::workflow::types::WorkflowInstance;

pub use memory::{
    InMemoryAuditRepository, InMemoryBatchRepository, InMemoryVersionRepository,
    InMemoryWorkflowRepository,
};

/// Compare-and-swap of a lineage's active pointer.
#[derive(Debug, Clone)]
pub struct ActivationSwap {
    /// Lineage.
    pub entity_id: EntityId,
    /// DRAFT version to make ACTIVE.
    pub activate: VersionId,
    /// Pointer value observed by the caller. `None` means "no ACTIVE version".
    pub expected_active: Option<VersionId>,
    /// Transition timestamp.
    pub at: DateTime<Utc>,
}

/// Rows touched by a successful activation.
#[derive(Debug, Clone)]
pub struct ActivationResult {
    /// The newly ACTIVE version.
    pub activated: VersionedEntity,
    /// The previously ACTIVE version, now ARCHIVED.
    pub archived: Option<VersionedEntity>,
}

/// Persistence for configuration versions and active pointers.
#[async_trait]
pub trait VersionRepository: Send + Sync {
    /// Inserts a new version row.
    ///
    /// Fails with `Conflict` if `(entity_id, version)` already exists.
    async fn insert(&self, entity: &VersionedEntity) -> Result<(), RepositoryError>;

    /// Finds a version by storage id.
    async fn find(&self, id: VersionId) -> Result<Option<VersionedEntity>, RepositoryError>;

    /// Reads the lineage's active pointer.
    async fn active_pointer(&self, entity_id: EntityId)
    -> Result<Option<VersionId>, RepositoryError>;

    /// Resolves the active pointer to its version.
    async fn find_active(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionedEntity>, RepositoryError>;

    /// All versions of a lineage, ascending by version number.
    async fn lineage(&self, entity_id: EntityId) -> Result<Vec<VersionedEntity>, RepositoryError>;

    /// Every ACTIVE version of one entity type.
    async fn list_active(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<VersionedEntity>, RepositoryError>;

    /// Overwrites payload, status and `updated_at` of an existing row.
    ///
    /// Fails with `Conflict` unless the stored status equals `expected_status`.
    async fn save(
        &self,
        entity: &VersionedEntity,
        expected_status: VersionStatus,
    ) -> Result<(), RepositoryError>;

    /// Archives an ACTIVE version and clears the lineage's pointer.
    ///
    /// Fails with `Conflict` unless the pointer still names `version_id`.
    async fn retire_active(
        &self,
        version_id: VersionId,
        at: DateTime<Utc>,
    ) -> Result<VersionedEntity, RepositoryError>;

    /// Atomically moves the active pointer to a DRAFT version, marking it
    /// ACTIVE and archiving the version the pointer named before.
    ///
    /// Fails with `Conflict` if the pointer no longer equals
    /// `swap.expected_active` or the target is no longer DRAFT.
    async fn swap_active(&self, swap: &ActivationSwap)
    -> Result<ActivationResult, RepositoryError>;
}

/// Persistence for maker-checker instances.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Inserts a new instance.
    async fn insert(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError>;

    /// Finds an instance by id.
    async fn find(
        &self,
        id: WorkflowInstanceId,
    ) -> Result<Option<WorkflowInstance>, RepositoryError>;

    /// PENDING instances whose required role is one of `roles`, oldest first,
    /// ties broken by id.
    async fn list_pending(
        &self,
        roles: &[Role],
        page: &PageRequest,
    ) -> Result<PageResponse<WorkflowInstance>, RepositoryError>;

    /// The PENDING activation request targeting `version_id`, if any.
    async fn pending_activation(
        &self,
        version_id: VersionId,
    ) -> Result<Option<WorkflowInstance>, RepositoryError>;

    /// Writes the terminal state of an instance.
    ///
    /// Fails with `Conflict` unless the stored instance is still PENDING.
    async fn resolve(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError>;
}

/// Persistence for batch execution records.
#[async_trait]
pub trait BatchRepository: Send + Sync {
    /// Inserts a RUNNING record.
    ///
    /// Fails with `Conflict` if a RUNNING record exists for the same job.
    async fn start(&self, record: &BatchRecord) -> Result<(), RepositoryError>;

    /// Writes the terminal state of a run.
    ///
    /// Fails with `Conflict` unless the stored record is still RUNNING.
    async fn finish(&self, record: &BatchRecord) -> Result<(), RepositoryError>;

    /// Finds a record by id.
    async fn find(&self, id: BatchRecordId) -> Result<Option<BatchRecord>, RepositoryError>;

    /// Records newest first (`start_time` descending), optionally for one job.
    async fn history(
        &self,
        job_name: Option<&str>,
        page: &PageRequest,
    ) -> Result<PageResponse<BatchRecord>, RepositoryError>;
}

/// Append-only audit storage.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Appends one record.
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError>;

    /// Records matching `filter`, newest first.
    async fn list(
        &self,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<AuditRecord>, RepositoryError>;
}
