//! Append-only audit trail.
//!
//! Every lifecycle transition, approval decision and job run lands here.
//! Appends happen after the mutation has committed; a failed append is
//! logged and never undoes the mutation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vaultline_shared::types::{
    ActorId, AuditRecordId, BatchRecordId, EntityId, PageRequest, PageResponse, VersionId,
    WorkflowInstanceId,
};

use crate::batch::types::BatchStatus;
use crate::error::RepositoryError;
use crate::repository::AuditRepository;
use crate::versioning::types::{VersionStatus, VersionedEntity};
use crate::workflow::types::InstanceStatus;

/// What happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A configuration version changed status (or was created).
    Lifecycle {
        /// Lineage.
        entity_id: EntityId,
        /// Version row.
        version_id: VersionId,
        /// Version number.
        version: i32,
        /// Status before, `None` on creation.
        from_status: Option<VersionStatus>,
        /// Status after.
        to_status: VersionStatus,
    },
    /// Fields of a version were patched in place.
    Edited {
        /// Lineage.
        entity_id: EntityId,
        /// Version row.
        version_id: VersionId,
        /// Version number.
        version: i32,
        /// Status at the time of the edit.
        status: VersionStatus,
        /// Patched field names, sorted.
        fields: Vec<String>,
    },
    /// A workflow instance was resolved.
    Decision {
        /// Instance.
        instance_id: WorkflowInstanceId,
        /// Trigger key, e.g. `fee.activate`.
        definition_id: String,
        /// APPROVED or REJECTED.
        outcome: InstanceStatus,
        /// Rejection reason.
        reason: Option<String>,
    },
    /// A batch run reached a terminal state.
    JobRun {
        /// Execution record.
        record_id: BatchRecordId,
        /// Job.
        job_name: String,
        /// COMPLETED or FAILED.
        status: BatchStatus,
        /// Failure detail.
        error_log: Option<String>,
    },
}

impl AuditEvent {
    /// Lifecycle event for `entity` arriving in its current status.
    #[must_use]
    pub fn lifecycle(entity: &VersionedEntity, from_status: Option<VersionStatus>) -> Self {
        Self::Lifecycle {
            entity_id: entity.entity_id,
            version_id: entity.id,
            version: entity.version,
            from_status,
            to_status: entity.status,
        }
    }

    /// Edit event for `entity` after `fields` were patched.
    #[must_use]
    pub fn edited<'a>(entity: &VersionedEntity, fields: impl IntoIterator<Item = &'a String>) -> Self {
        let mut fields: Vec<String> = fields.into_iter().cloned().collect();
        fields.sort();
        Self::Edited {
            entity_id: entity.entity_id,
            version_id: entity.id,
            version: entity.version,
            status: entity.status,
            fields,
        }
    }

    /// Lineage the event belongs to, for lifecycle and edit events.
    #[must_use]
    pub const fn entity_id(&self) -> Option<EntityId> {
        match self {
            Self::Lifecycle { entity_id, .. } | Self::Edited { entity_id, .. } => Some(*entity_id),
            Self::Decision { .. } | Self::JobRun { .. } => None,
        }
    }
}

/// One audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Entry id.
    pub id: AuditRecordId,
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
    /// Who did it.
    pub actor: ActorId,
    /// What happened.
    pub event: AuditEvent,
}

/// Audit query. All set fields must match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Lifecycle and edit events of this lineage.
    pub entity_id: Option<EntityId>,
    /// Decisions on this instance.
    pub instance_id: Option<WorkflowInstanceId>,
    /// Runs of this job.
    pub job_name: Option<String>,
}

impl AuditFilter {
    /// Returns true if `record` satisfies every set criterion.
    #[must_use]
    pub fn matches(&self, record: &AuditRecord) -> bool {
        let entity_ok = self
            .entity_id
            .is_none_or(|wanted| record.event.entity_id() == Some(wanted));
        let instance_ok = self.instance_id.is_none_or(|wanted| {
            matches!(record.event, AuditEvent::Decision { instance_id, .. } if instance_id == wanted)
        });
        let job_ok = self.job_name.as_deref().is_none_or(|wanted| {
            matches!(&record.event, AuditEvent::JobRun { job_name, .. } if job_name == wanted)
        });
        entity_ok && instance_ok && job_ok
    }
}

/// Handle used by the engine components to append and read audit entries.
#[derive(Clone)]
pub struct AuditLog {
    repo: Arc<dyn AuditRepository>,
}

impl AuditLog {
    /// Creates an audit log over `repo`.
    #[must_use]
    pub fn new(repo: Arc<dyn AuditRepository>) -> Self {
        Self { repo }
    }

    /// Appends an entry. Failures are logged, not returned.
    pub async fn record(&self, actor: &ActorId, event: AuditEvent) {
        let record = AuditRecord {
            id: AuditRecordId::new(),
            occurred_at: Utc::now(),
            actor: actor.clone(),
            event,
        };

        if let Err(e) = self.repo.append(&record).await {
            tracing::error!(
                audit_id = %record.id,
                actor = %record.actor,
                event = ?record.event,
                error = %e,
                "Failed to append audit record"
            );
        }
    }

    /// Lists entries matching `filter`, newest first.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<AuditRecord>, RepositoryError> {
        self.repo.list(filter, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryAuditRepository;
    use async_trait::async_trait;

    struct BrokenAudit;

    #[async_trait]
    impl AuditRepository for BrokenAudit {
        async fn append(&self, _record: &AuditRecord) -> Result<(), RepositoryError> {
            Err(RepositoryError::Database("disk full".into()))
        }

        async fn list(
            &self,
            _filter: &AuditFilter,
            _page: &PageRequest,
        ) -> Result<PageResponse<AuditRecord>, RepositoryError> {
            Err(RepositoryError::Database("disk full".into()))
        }
    }

    fn job_event(name: &str) -> AuditEvent {
        AuditEvent::JobRun {
            record_id: BatchRecordId::new(),
            job_name: name.into(),
            status: BatchStatus::Completed,
            error_log: None,
        }
    }

    #[tokio::test]
    async fn test_record_and_filter() {
        let log = AuditLog::new(Arc::new(InMemoryAuditRepository::default()));
        let actor = ActorId::system();
        log.record(&actor, job_event("Daily Accrual")).await;
        log.record(&actor, job_event("Fee Sweeper")).await;

        let all = log
            .list(&AuditFilter::default(), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all.meta.total, 2);
        // Newest first.
        assert!(matches!(
            &all.data[0].event,
            AuditEvent::JobRun { job_name, .. } if job_name == "Fee Sweeper"
        ));

        let filter = AuditFilter {
            job_name: Some("Daily Accrual".into()),
            ..AuditFilter::default()
        };
        let accrual = log.list(&filter, &PageRequest::default()).await.unwrap();
        assert_eq!(accrual.data.len(), 1);
    }

    #[tokio::test]
    async fn test_append_failure_is_swallowed() {
        let log = AuditLog::new(Arc::new(BrokenAudit));
        log.record(&ActorId::system(), job_event("Daily Accrual")).await;
    }

    #[test]
    fn test_filter_on_entity_excludes_other_events() {
        let filter = AuditFilter {
            entity_id: Some(EntityId::new()),
            ..AuditFilter::default()
        };
        let record = AuditRecord {
            id: AuditRecordId::new(),
            occurred_at: Utc::now(),
            actor: ActorId::system(),
            event: job_event("Daily Accrual"),
        };
        assert!(!filter.matches(&record));
        assert!(AuditFilter::default().matches(&record));
    }
}
