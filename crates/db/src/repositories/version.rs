//! Configuration version repository.
//!
//! Activation runs in one transaction that locks the lineage's pointer row,
//! archives the previous version before promoting the draft, and moves the
//! pointer. The partial unique index on ACTIVE rows catches the case where
//! two first activations race with no pointer row to lock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use vaultline_core::error::RepositoryError;
use vaultline_core::repository::{ActivationResult, ActivationSwap, VersionRepository};
use vaultline_core::versioning::{ConfigPayload, EntityType, VersionStatus, VersionedEntity};
use vaultline_shared::types::{EntityId, VersionId};

use super::convert::{actor, corrupt, db_err, from_json, parse_column, to_json, utc};
use crate::entities::{config_active_pointers, config_versions};

/// Postgres-backed configuration versions.
#[derive(Debug, Clone)]
pub struct PgVersionRepository {
    db: DatabaseConnection,
}

impl PgVersionRepository {
    /// Creates a new version repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: config_versions::Model) -> Result<VersionedEntity, RepositoryError> {
    let payload: ConfigPayload = from_json("config_versions.payload", model.payload)?;
    let entity_type = parse_column("config_versions.entity_type", &model.entity_type, EntityType::parse)?;
    if payload.entity_type() != entity_type {
        return Err(corrupt(
            "config_versions.payload",
            format!("row {} is {} but payload is {}", model.id, entity_type, payload.entity_type()),
        ));
    }

    Ok(VersionedEntity {
        id: VersionId::from_uuid(model.id),
        entity_id: EntityId::from_uuid(model.entity_id),
        version: model.version,
        status: parse_column("config_versions.status", &model.status, VersionStatus::parse)?,
        parent_id: model.parent_id.map(VersionId::from_uuid),
        payload,
        created_by: actor("config_versions.created_by", &model.created_by)?,
        created_at: utc(model.created_at),
        updated_at: utc(model.updated_at),
    })
}

fn to_active_model(entity: &VersionedEntity) -> Result<config_versions::ActiveModel, RepositoryError> {
    Ok(config_versions::ActiveModel {
        id: Set(entity.id.into_inner()),
        entity_id: Set(entity.entity_id.into_inner()),
        entity_type: Set(entity.entity_type().as_str().to_string()),
        version: Set(entity.version),
        status: Set(entity.status.as_str().to_string()),
        parent_id: Set(entity.parent_id.map(VersionId::into_inner)),
        payload: Set(to_json(&entity.payload)?),
        created_by: Set(entity.created_by.as_str().to_string()),
        created_at: Set(entity.created_at.into()),
        updated_at: Set(entity.updated_at.into()),
    })
}

fn transition(
    model: config_versions::Model,
    status: VersionStatus,
    at: DateTime<Utc>,
) -> config_versions::ActiveModel {
    let mut active: config_versions::ActiveModel = model.into();
    active.status = Set(status.as_str().to_string());
    active.updated_at = Set(at.into());
    active
}

#[async_trait]
impl VersionRepository for PgVersionRepository {
    async fn insert(&self, entity: &VersionedEntity) -> Result<(), RepositoryError> {
        config_versions::Entity::insert(to_active_model(entity)?)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find(&self, id: VersionId) -> Result<Option<VersionedEntity>, RepositoryError> {
        config_versions::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    async fn active_pointer(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionId>, RepositoryError> {
        Ok(config_active_pointers::Entity::find_by_id(entity_id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(|p| VersionId::from_uuid(p.version_id)))
    }

    async fn find_active(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionedEntity>, RepositoryError> {
        config_versions::Entity::find()
            .filter(config_versions::Column::EntityId.eq(entity_id.into_inner()))
            .filter(config_versions::Column::Status.eq(VersionStatus::Active.as_str()))
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    async fn lineage(&self, entity_id: EntityId) -> Result<Vec<VersionedEntity>, RepositoryError> {
        config_versions::Entity::find()
            .filter(config_versions::Column::EntityId.eq(entity_id.into_inner()))
            .order_by_asc(config_versions::Column::Version)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn list_active(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<VersionedEntity>, RepositoryError> {
        config_versions::Entity::find()
            .filter(config_versions::Column::EntityType.eq(entity_type.as_str()))
            .filter(config_versions::Column::Status.eq(VersionStatus::Active.as_str()))
            .order_by_asc(config_versions::Column::CreatedAt)
            .order_by_asc(config_versions::Column::Id)
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_domain)
            .collect()
    }

    async fn save(
        &self,
        entity: &VersionedEntity,
        expected_status: VersionStatus,
    ) -> Result<(), RepositoryError> {
        let updated_at: sea_orm::prelude::DateTimeWithTimeZone = entity.updated_at.into();
        let result = config_versions::Entity::update_many()
            .col_expr(
                config_versions::Column::Status,
                Expr::value(entity.status.as_str()),
            )
            .col_expr(
                config_versions::Column::Payload,
                Expr::value(to_json(&entity.payload)?),
            )
            .col_expr(config_versions::Column::UpdatedAt, Expr::value(updated_at))
            .filter(config_versions::Column::Id.eq(entity.id.into_inner()))
            .filter(config_versions::Column::Status.eq(expected_status.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::Conflict(format!(
                "version {} is no longer {expected_status}",
                entity.id
            )));
        }
        Ok(())
    }

    async fn retire_active(
        &self,
        version_id: VersionId,
        at: DateTime<Utc>,
    ) -> Result<VersionedEntity, RepositoryError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let model = config_versions::Entity::find_by_id(version_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| RepositoryError::Conflict(format!("version {version_id} vanished")))?;
        let pointer = config_active_pointers::Entity::find_by_id(model.entity_id)
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?;
        if pointer.map(|p| p.version_id) != Some(model.id) {
            return Err(RepositoryError::Conflict(format!(
                "version {version_id} is no longer active"
            )));
        }

        config_active_pointers::Entity::delete_by_id(model.entity_id)
            .exec(&txn)
            .await
            .map_err(db_err)?;
        let retired = transition(model, VersionStatus::Archived, at)
            .update(&txn)
            .await
            .map_err(db_err)?;

        txn.commit().await.map_err(db_err)?;
        to_domain(retired)
    }

    async fn swap_active(
        &self,
        swap: &ActivationSwap,
    ) -> Result<ActivationResult, RepositoryError> {
        let txn = self.db.begin().await.map_err(db_err)?;

        let pointer = config_active_pointers::Entity::find_by_id(swap.entity_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?;
        let observed = pointer.as_ref().map(|p| VersionId::from_uuid(p.version_id));
        if observed != swap.expected_active {
            return Err(RepositoryError::Conflict(format!(
                "active pointer of entity {} moved",
                swap.entity_id
            )));
        }

        let target = config_versions::Entity::find_by_id(swap.activate.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| RepositoryError::Conflict(format!("version {} vanished", swap.activate)))?;
        if target.status != VersionStatus::Draft.as_str()
            || target.entity_id != swap.entity_id.into_inner()
        {
            return Err(RepositoryError::Conflict(format!(
                "version {} is no longer a draft of entity {}",
                swap.activate, swap.entity_id
            )));
        }

        // Archive first: the one-ACTIVE index is checked per statement.
        let archived = match observed {
            Some(previous_id) => {
                let previous = config_versions::Entity::find_by_id(previous_id.into_inner())
                    .one(&txn)
                    .await
                    .map_err(db_err)?
                    .ok_or_else(|| {
                        corrupt("config_active_pointers", format!("missing version {previous_id}"))
                    })?;
                let archived = transition(previous, VersionStatus::Archived, swap.at)
                    .update(&txn)
                    .await
                    .map_err(db_err)?;
                Some(to_domain(archived)?)
            }
            None => None,
        };

        let activated = transition(target, VersionStatus::Active, swap.at)
            .update(&txn)
            .await
            .map_err(db_err)?;

        match pointer {
            Some(pointer) => {
                let mut moved: config_active_pointers::ActiveModel = pointer.into();
                moved.version_id = Set(swap.activate.into_inner());
                moved.updated_at = Set(swap.at.into());
                moved.update(&txn).await.map_err(db_err)?;
            }
            None => {
                config_active_pointers::ActiveModel {
                    entity_id: Set(swap.entity_id.into_inner()),
                    version_id: Set(swap.activate.into_inner()),
                    updated_at: Set(swap.at.into()),
                }
                .insert(&txn)
                .await
                .map_err(db_err)?;
            }
        }

        txn.commit().await.map_err(db_err)?;
        Ok(ActivationResult {
            activated: to_domain(activated)?,
            archived,
        })
    }
}
