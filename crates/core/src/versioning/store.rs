//! Versioned configuration store.
//!
//! Owns every status change of a configuration version. Activation is only
//! reachable from inside the crate; callers go through the workflow engine.

use std::sync::Arc;

use chrono::Utc;
use vaultline_shared::types::{ActorId, EntityId, VersionId};

use crate::audit::{AuditEvent, AuditLog};
use crate::error::RepositoryError;
use crate::repository::{ActivationSwap, VersionRepository};
use crate::versioning::error::VersioningError;
use crate::versioning::lifecycle::VersionLifecycle;
use crate::versioning::payload::{ConfigPayload, FieldPatch};
use crate::versioning::types::{EntityType, VersionStatus, VersionedEntity};

/// Lineage-aware store for products, fees, rules and GL mappings.
#[derive(Clone)]
pub struct VersionedEntityStore {
    repo: Arc<dyn VersionRepository>,
    audit: AuditLog,
}

impl VersionedEntityStore {
    /// Creates a store over `repo`, auditing into `audit`.
    #[must_use]
    pub fn new(repo: Arc<dyn VersionRepository>, audit: AuditLog) -> Self {
        Self { repo, audit }
    }

    /// Creates a DRAFT version.
    ///
    /// Without `entity_id` a new lineage starts at version 1. With one, the
    /// draft is appended to that lineage above its highest version and
    /// parented on the lineage's ACTIVE version, if any, so it can later
    /// supersede it.
    pub async fn create(
        &self,
        entity_id: Option<EntityId>,
        payload: ConfigPayload,
        actor: &ActorId,
    ) -> Result<VersionedEntity, VersioningError> {
        payload.check()?;

        let (entity_id, version, parent_id) = match entity_id {
            None => (EntityId::new(), 1, None),
            Some(entity_id) => {
                let lineage = self.repo.lineage(entity_id).await?;
                let newest = lineage
                    .last()
                    .ok_or(VersioningError::LineageNotFound(entity_id))?;
                if newest.entity_type() != payload.entity_type() {
                    return Err(VersioningError::Validation(format!(
                        "entity {entity_id} is a {}, not a {}",
                        newest.entity_type(),
                        payload.entity_type()
                    )));
                }
                let active = lineage
                    .iter()
                    .find(|v| v.status == VersionStatus::Active)
                    .map(|v| v.id);
                (entity_id, newest.version + 1, active)
            }
        };

        let now = Utc::now();
        let entity = VersionedEntity {
            id: VersionId::new(),
            entity_id,
            version,
            status: VersionStatus::Draft,
            parent_id,
            payload,
            created_by: actor.clone(),
            created_at: now,
            updated_at: now,
        };

        self.insert(&entity).await?;
        tracing::info!(
            entity_id = %entity.entity_id,
            version_id = %entity.id,
            version = entity.version,
            entity_type = %entity.entity_type(),
            actor = %actor,
            "Draft created"
        );
        self.audit
            .record(actor, AuditEvent::lifecycle(&entity, None))
            .await;
        Ok(entity)
    }

    /// Starts a DRAFT from an ACTIVE version. The source stays ACTIVE until
    /// the draft is activated.
    pub async fn clone_version(
        &self,
        source_id: VersionId,
        actor: &ActorId,
    ) -> Result<VersionedEntity, VersioningError> {
        let source = self.get(source_id).await?;
        VersionLifecycle::ensure_cloneable(&source)?;

        let newest = self
            .repo
            .lineage(source.entity_id)
            .await?
            .iter()
            .map(|v| v.version)
            .max()
            .unwrap_or(source.version);

        let now = Utc::now();
        let draft = VersionedEntity {
            id: VersionId::new(),
            entity_id: source.entity_id,
            version: newest.max(source.version) + 1,
            status: VersionStatus::Draft,
            parent_id: Some(source.id),
            payload: source.payload.clone(),
            created_by: actor.clone(),
            created_at: now,
            updated_at: now,
        };

        self.insert(&draft).await?;
        tracing::info!(
            entity_id = %draft.entity_id,
            source_id = %source.id,
            version_id = %draft.id,
            version = draft.version,
            actor = %actor,
            "Version cloned"
        );
        self.audit
            .record(actor, AuditEvent::lifecycle(&draft, None))
            .await;
        Ok(draft)
    }

    /// Validates a patch against the version without writing anything.
    ///
    /// Returns the entity as it would look after the update.
    pub async fn check_update(
        &self,
        id: VersionId,
        patch: &FieldPatch,
    ) -> Result<VersionedEntity, VersioningError> {
        let current = self.get(id).await?;
        VersionLifecycle::ensure_editable(&current, patch)?;
        let payload = current.payload.patched(patch)?;
        Ok(VersionedEntity {
            payload,
            updated_at: Utc::now(),
            ..current
        })
    }

    /// Applies a field patch.
    ///
    /// DRAFT versions accept any known field; ACTIVE versions only mutable
    /// ones; ARCHIVED versions nothing.
    pub async fn update(
        &self,
        id: VersionId,
        patch: &FieldPatch,
        actor: &ActorId,
    ) -> Result<VersionedEntity, VersioningError> {
        let updated = self.check_update(id, patch).await?;
        self.repo
            .save(&updated, updated.status)
            .await
            .map_err(|e| Self::lost_race(updated.entity_id, e))?;

        tracing::info!(
            entity_id = %updated.entity_id,
            version_id = %updated.id,
            status = %updated.status,
            fields = ?patch.keys().collect::<Vec<_>>(),
            actor = %actor,
            "Version updated"
        );
        self.audit
            .record(actor, AuditEvent::edited(&updated, patch.keys()))
            .await;
        Ok(updated)
    }

    /// Makes a DRAFT version live, archiving its parent.
    ///
    /// Fails with `Conflict` if the lineage's ACTIVE version is not the
    /// draft's parent, or if a concurrent activation wins the swap.
    pub(crate) async fn activate(
        &self,
        id: VersionId,
        actor: &ActorId,
    ) -> Result<VersionedEntity, VersioningError> {
        let target = self.get(id).await?;
        VersionLifecycle::ensure_activatable(&target)?;

        let observed = self.repo.active_pointer(target.entity_id).await?;
        if let Some(active_id) = observed
            && Some(active_id) != target.parent_id
        {
            tracing::warn!(
                entity_id = %target.entity_id,
                version_id = %id,
                active_id = %active_id,
                "Activation rejected: lineage moved past parent"
            );
            return Err(VersioningError::Conflict {
                entity_id: target.entity_id,
                detail: format!(
                    "active version is {active_id}, not this draft's parent; clone it again"
                ),
            });
        }

        let swap = ActivationSwap {
            entity_id: target.entity_id,
            activate: id,
            expected_active: observed,
            at: Utc::now(),
        };
        let result = self
            .repo
            .swap_active(&swap)
            .await
            .map_err(|e| Self::lost_race(target.entity_id, e))?;

        tracing::info!(
            entity_id = %result.activated.entity_id,
            version_id = %result.activated.id,
            version = result.activated.version,
            archived = ?result.archived.as_ref().map(|a| a.id),
            actor = %actor,
            "Version activated"
        );

        if let Some(archived) = &result.archived {
            self.audit
                .record(
                    actor,
                    AuditEvent::lifecycle(archived, Some(VersionStatus::Active)),
                )
                .await;
        }
        self.audit
            .record(
                actor,
                AuditEvent::lifecycle(&result.activated, Some(VersionStatus::Draft)),
            )
            .await;

        Ok(result.activated)
    }

    /// Retires a DRAFT or ACTIVE version. Archiving the ACTIVE version
    /// leaves the lineage without one.
    pub async fn archive(
        &self,
        id: VersionId,
        actor: &ActorId,
    ) -> Result<VersionedEntity, VersioningError> {
        let current = self.get(id).await?;
        VersionLifecycle::ensure_archivable(&current)?;
        let from = current.status;
        let now = Utc::now();

        let archived = match from {
            VersionStatus::Active => self
                .repo
                .retire_active(id, now)
                .await
                .map_err(|e| Self::lost_race(current.entity_id, e))?,
            _ => {
                let archived = VersionedEntity {
                    status: VersionStatus::Archived,
                    updated_at: now,
                    ..current
                };
                self.repo
                    .save(&archived, from)
                    .await
                    .map_err(|e| Self::lost_race(archived.entity_id, e))?;
                archived
            }
        };

        tracing::info!(
            entity_id = %archived.entity_id,
            version_id = %archived.id,
            from = %from,
            actor = %actor,
            "Version archived"
        );
        self.audit
            .record(actor, AuditEvent::lifecycle(&archived, Some(from)))
            .await;
        Ok(archived)
    }

    /// Fetches a version by storage id.
    pub async fn get(&self, id: VersionId) -> Result<VersionedEntity, VersioningError> {
        self.repo
            .find(id)
            .await?
            .ok_or(VersioningError::VersionNotFound(id))
    }

    /// The lineage's ACTIVE version, if any.
    pub async fn get_active(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionedEntity>, VersioningError> {
        Ok(self.repo.find_active(entity_id).await?)
    }

    /// All versions of a lineage, oldest first.
    pub async fn lineage(
        &self,
        entity_id: EntityId,
    ) -> Result<Vec<VersionedEntity>, VersioningError> {
        let versions = self.repo.lineage(entity_id).await?;
        if versions.is_empty() {
            return Err(VersioningError::LineageNotFound(entity_id));
        }
        Ok(versions)
    }

    /// Every ACTIVE version of `entity_type`.
    pub async fn list_active(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<VersionedEntity>, VersioningError> {
        Ok(self.repo.list_active(entity_type).await?)
    }

    async fn insert(&self, entity: &VersionedEntity) -> Result<(), VersioningError> {
        self.repo
            .insert(entity)
            .await
            .map_err(|e| Self::lost_race(entity.entity_id, e))
    }

    fn lost_race(entity_id: EntityId, err: RepositoryError) -> VersioningError {
        match err {
            RepositoryError::Conflict(detail) => {
                tracing::warn!(entity_id = %entity_id, detail = %detail, "Lost write race");
                VersioningError::Conflict { entity_id, detail }
            }
            other => VersioningError::Storage(other),
        }
    }
}
