//! In-process repositories.
//!
//! Each repository keeps its state behind one `tokio::sync::RwLock`, so every
//! conditional write is checked and applied under a single write guard.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use vaultline_shared::types::{
    BatchRecordId, EntityId, PageRequest, PageResponse, Role, VersionId, WorkflowInstanceId,
};

use super::{
    ActivationResult, ActivationSwap, AuditRepository, BatchRepository, VersionRepository,
    WorkflowRepository,
};
use crate::audit::{AuditFilter, AuditRecord};
use crate::batch::types::{BatchRecord, BatchStatus};
use crate::error::RepositoryError;
use crate::versioning::types::{EntityType, VersionStatus, VersionedEntity};
use crate::workflow::types::{InstanceStatus, MutationRequest, WorkflowInstance};

fn page_of<T: Clone>(items: &[T], page: &PageRequest) -> PageResponse<T> {
    let page = page.normalized();
    PageResponse::new(
        page.slice(items),
        page.page,
        page.per_page,
        u64::try_from(items.len()).unwrap_or(u64::MAX),
    )
}

#[derive(Default)]
struct VersionState {
    versions: HashMap<VersionId, VersionedEntity>,
    pointers: HashMap<EntityId, VersionId>,
}

impl VersionState {
    fn get(&self, id: VersionId) -> Result<&VersionedEntity, RepositoryError> {
        self.versions
            .get(&id)
            .ok_or_else(|| RepositoryError::Conflict(format!("version {id} vanished")))
    }
}

/// In-memory configuration versions.
#[derive(Default)]
pub struct InMemoryVersionRepository {
    state: RwLock<VersionState>,
}

#[async_trait]
impl VersionRepository for InMemoryVersionRepository {
    async fn insert(&self, entity: &VersionedEntity) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let duplicate = state
            .versions
            .values()
            .any(|v| v.entity_id == entity.entity_id && v.version == entity.version);
        if duplicate || state.versions.contains_key(&entity.id) {
            return Err(RepositoryError::Conflict(format!(
                "version {} of entity {} already exists",
                entity.version, entity.entity_id
            )));
        }
        state.versions.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn find(&self, id: VersionId) -> Result<Option<VersionedEntity>, RepositoryError> {
        Ok(self.state.read().await.versions.get(&id).cloned())
    }

    async fn active_pointer(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionId>, RepositoryError> {
        Ok(self.state.read().await.pointers.get(&entity_id).copied())
    }

    async fn find_active(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionedEntity>, RepositoryError> {
        let state = self.state.read().await;
        Ok(state
            .pointers
            .get(&entity_id)
            .and_then(|id| state.versions.get(id))
            .cloned())
    }

    async fn lineage(&self, entity_id: EntityId) -> Result<Vec<VersionedEntity>, RepositoryError> {
        let state = self.state.read().await;
        let mut versions: Vec<_> = state
            .versions
            .values()
            .filter(|v| v.entity_id == entity_id)
            .cloned()
            .collect();
        versions.sort_by_key(|v| v.version);
        Ok(versions)
    }

    async fn list_active(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<VersionedEntity>, RepositoryError> {
        let state = self.state.read().await;
        let mut active: Vec<_> = state
            .pointers
            .values()
            .filter_map(|id| state.versions.get(id))
            .filter(|v| v.entity_type() == entity_type)
            .cloned()
            .collect();
        active.sort_by_key(|v| (v.created_at, v.id));
        Ok(active)
    }

    async fn save(
        &self,
        entity: &VersionedEntity,
        expected_status: VersionStatus,
    ) -> Result<(), RepositoryError> {
        let mut state = self.state.write().await;
        let current = state.get(entity.id)?;
        if current.status != expected_status {
            return Err(RepositoryError::Conflict(format!(
                "version {} is {}, expected {expected_status}",
                entity.id, current.status
            )));
        }
        state.versions.insert(entity.id, entity.clone());
        Ok(())
    }

    async fn retire_active(
        &self,
        version_id: VersionId,
        at: DateTime<Utc>,
    ) -> Result<VersionedEntity, RepositoryError> {
        let mut state = self.state.write().await;
        let entity_id = state.get(version_id)?.entity_id;
        if state.pointers.get(&entity_id) != Some(&version_id) {
            return Err(RepositoryError::Conflict(format!(
                "version {version_id} is no longer active"
            )));
        }

        state.pointers.remove(&entity_id);
        let retired = state
            .versions
            .get_mut(&version_id)
            .ok_or_else(|| RepositoryError::Conflict(format!("version {version_id} vanished")))?;
        retired.status = VersionStatus::Archived;
        retired.updated_at = at;
        Ok(retired.clone())
    }

    async fn swap_active(
        &self,
        swap: &ActivationSwap,
    ) -> Result<ActivationResult, RepositoryError> {
        let mut state = self.state.write().await;

        let observed = state.pointers.get(&swap.entity_id).copied();
        if observed != swap.expected_active {
            return Err(RepositoryError::Conflict(format!(
                "active pointer of entity {} moved",
                swap.entity_id
            )));
        }
        if state.get(swap.activate)?.status != VersionStatus::Draft {
            return Err(RepositoryError::Conflict(format!(
                "version {} is no longer a draft",
                swap.activate
            )));
        }

        let archived = match observed {
            Some(previous_id) => {
                let previous = state.versions.get_mut(&previous_id).ok_or_else(|| {
                    RepositoryError::Corrupt(format!("pointer names missing version {previous_id}"))
                })?;
                previous.status = VersionStatus::Archived;
                previous.updated_at = swap.at;
                Some(previous.clone())
            }
            None => None,
        };

        let target = state
            .versions
            .get_mut(&swap.activate)
            .ok_or_else(|| RepositoryError::Conflict(format!("version {} vanished", swap.activate)))?;
        target.status = VersionStatus::Active;
        target.updated_at = swap.at;
        let activated = target.clone();

        state.pointers.insert(swap.entity_id, swap.activate);
        Ok(ActivationResult {
            activated,
            archived,
        })
    }
}

/// In-memory approval instances.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    instances: RwLock<HashMap<WorkflowInstanceId, WorkflowInstance>>,
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn insert(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        let mut instances = self.instances.write().await;
        if instances.contains_key(&instance.id) {
            return Err(RepositoryError::Conflict(format!(
                "instance {} already exists",
                instance.id
            )));
        }
        instances.insert(instance.id, instance.clone());
        Ok(())
    }

    async fn find(
        &self,
        id: WorkflowInstanceId,
    ) -> Result<Option<WorkflowInstance>, RepositoryError> {
        Ok(self.instances.read().await.get(&id).cloned())
    }

    async fn list_pending(
        &self,
        roles: &[Role],
        page: &PageRequest,
    ) -> Result<PageResponse<WorkflowInstance>, RepositoryError> {
        let instances = self.instances.read().await;
        let mut pending: Vec<_> = instances
            .values()
            .filter(|i| i.status == InstanceStatus::Pending)
            .filter(|i| i.role_required.as_ref().is_some_and(|r| roles.contains(r)))
            .cloned()
            .collect();
        pending.sort_by_key(|i| (i.created_at, i.id));
        Ok(page_of(&pending, page))
    }

    async fn pending_activation(
        &self,
        version_id: VersionId,
    ) -> Result<Option<WorkflowInstance>, RepositoryError> {
        Ok(self
            .instances
            .read()
            .await
            .values()
            .find(|i| {
                i.status == InstanceStatus::Pending
                    && matches!(i.payload, MutationRequest::Activate { version_id: v } if v == version_id)
            })
            .cloned())
    }

    async fn resolve(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        let mut instances = self.instances.write().await;
        let current = instances
            .get(&instance.id)
            .ok_or_else(|| RepositoryError::Conflict(format!("instance {} vanished", instance.id)))?;
        if current.status != InstanceStatus::Pending {
            return Err(RepositoryError::Conflict(format!(
                "instance {} already {}",
                instance.id, current.status
            )));
        }
        instances.insert(instance.id, instance.clone());
        Ok(())
    }
}

/// In-memory batch records.
#[derive(Default)]
pub struct InMemoryBatchRepository {
    records: RwLock<HashMap<BatchRecordId, BatchRecord>>,
}

#[async_trait]
impl BatchRepository for InMemoryBatchRepository {
    async fn start(&self, record: &BatchRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let running = records
            .values()
            .any(|r| r.job_name == record.job_name && r.status == BatchStatus::Running);
        if running {
            return Err(RepositoryError::Conflict(format!(
                "job '{}' is already running",
                record.job_name
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn finish(&self, record: &BatchRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        let current = records
            .get(&record.id)
            .ok_or_else(|| RepositoryError::Conflict(format!("record {} vanished", record.id)))?;
        if current.status != BatchStatus::Running {
            return Err(RepositoryError::Conflict(format!(
                "record {} already {}",
                record.id, current.status
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn find(&self, id: BatchRecordId) -> Result<Option<BatchRecord>, RepositoryError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn history(
        &self,
        job_name: Option<&str>,
        page: &PageRequest,
    ) -> Result<PageResponse<BatchRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut matching: Vec<_> = records
            .values()
            .filter(|r| job_name.is_none_or(|name| r.job_name == name))
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(page_of(&matching, page))
    }
}

/// In-memory audit trail.
#[derive(Default)]
pub struct InMemoryAuditRepository {
    records: RwLock<Vec<AuditRecord>>,
}

#[async_trait]
impl AuditRepository for InMemoryAuditRepository {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        self.records.write().await.push(record.clone());
        Ok(())
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<AuditRecord>, RepositoryError> {
        let records = self.records.read().await;
        let matching: Vec<_> = records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect();
        Ok(page_of(&matching, page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::types::TriggerSource;
    use crate::versioning::lifecycle::fixtures::fee_version;
    use vaultline_shared::types::ActorId;

    #[tokio::test]
    async fn test_duplicate_version_number_conflicts() {
        let repo = InMemoryVersionRepository::default();
        let v1 = fee_version(VersionStatus::Draft);
        repo.insert(&v1).await.unwrap();

        let mut twin = fee_version(VersionStatus::Draft);
        twin.entity_id = v1.entity_id;
        assert!(matches!(
            repo.insert(&twin).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_swap_requires_observed_pointer() {
        let repo = InMemoryVersionRepository::default();
        let draft = fee_version(VersionStatus::Draft);
        repo.insert(&draft).await.unwrap();

        let stale = ActivationSwap {
            entity_id: draft.entity_id,
            activate: draft.id,
            expected_active: Some(VersionId::new()),
            at: Utc::now(),
        };
        assert!(repo.swap_active(&stale).await.is_err());

        let swap = ActivationSwap {
            expected_active: None,
            ..stale
        };
        let result = repo.swap_active(&swap).await.unwrap();
        assert_eq!(result.activated.status, VersionStatus::Active);
        assert!(result.archived.is_none());
        assert_eq!(
            repo.active_pointer(draft.entity_id).await.unwrap(),
            Some(draft.id)
        );

        // Same swap again: target is no longer a draft and the pointer moved.
        assert!(repo.swap_active(&swap).await.is_err());
    }

    #[tokio::test]
    async fn test_save_is_conditional_on_status() {
        let repo = InMemoryVersionRepository::default();
        let draft = fee_version(VersionStatus::Draft);
        repo.insert(&draft).await.unwrap();
        assert!(repo.save(&draft, VersionStatus::Active).await.is_err());
        assert!(repo.save(&draft, VersionStatus::Draft).await.is_ok());
    }

    #[tokio::test]
    async fn test_single_running_record_per_job() {
        let repo = InMemoryBatchRepository::default();
        let first = BatchRecord::running("Daily Accrual", ActorId::system(), TriggerSource::Manual);
        let second =
            BatchRecord::running("Daily Accrual", ActorId::system(), TriggerSource::Manual);
        repo.start(&first).await.unwrap();
        assert!(repo.start(&second).await.is_err());

        repo.finish(&first.clone().completed()).await.unwrap();
        assert!(repo.finish(&first.failed("late".into())).await.is_err());
        repo.start(&second).await.unwrap();
    }

    #[tokio::test]
    async fn test_history_newest_first() {
        let repo = InMemoryBatchRepository::default();
        let mut older =
            BatchRecord::running("Fee Sweeper", ActorId::system(), TriggerSource::Timer).completed();
        older.start_time -= chrono::Duration::hours(1);
        let newer = BatchRecord::running("Fee Sweeper", ActorId::system(), TriggerSource::Timer);
        repo.records.write().await.insert(older.id, older.clone());
        repo.start(&newer).await.unwrap();

        let page = repo
            .history(Some("Fee Sweeper"), &PageRequest::default())
            .await
            .unwrap();
        assert_eq!(page.data[0].id, newer.id);
        assert_eq!(page.data[1].id, older.id);
        assert!(
            repo.history(Some("Daily Accrual"), &PageRequest::default())
                .await
                .unwrap()
                .data
                .is_empty()
        );
    }
}
