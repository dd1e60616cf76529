//! Audit log repository.
//!
//! The event is stored whole as JSON; `kind`, `entity_id`, `instance_id`
//! and `job_name` are copied out of it so filters hit an index.

use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;
use vaultline_core::audit::{AuditEvent, AuditFilter, AuditRecord};
use vaultline_core::error::RepositoryError;
use vaultline_core::repository::AuditRepository;
use vaultline_shared::types::{AuditRecordId, PageRequest, PageResponse};

use super::convert::{actor, db_err, from_json, page_of, to_json, utc};
use crate::entities::audit_log;

/// Postgres-backed audit trail.
#[derive(Debug, Clone)]
pub struct PgAuditRepository {
    db: DatabaseConnection,
}

impl PgAuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

/// Denormalized filter columns of an event.
struct EventKeys {
    kind: &'static str,
    entity_id: Option<Uuid>,
    instance_id: Option<Uuid>,
    job_name: Option<String>,
}

fn keys_of(event: &AuditEvent) -> EventKeys {
    match event {
        AuditEvent::Lifecycle { entity_id, .. } => EventKeys {
            kind: "lifecycle",
            entity_id: Some(entity_id.into_inner()),
            instance_id: None,
            job_name: None,
        },
        AuditEvent::Edited { entity_id, .. } => EventKeys {
            kind: "edited",
            entity_id: Some(entity_id.into_inner()),
            instance_id: None,
            job_name: None,
        },
        AuditEvent::Decision { instance_id, .. } => EventKeys {
            kind: "decision",
            entity_id: None,
            instance_id: Some(instance_id.into_inner()),
            job_name: None,
        },
        AuditEvent::JobRun { job_name, .. } => EventKeys {
            kind: "job_run",
            entity_id: None,
            instance_id: None,
            job_name: Some(job_name.clone()),
        },
    }
}

fn to_domain(model: audit_log::Model) -> Result<AuditRecord, RepositoryError> {
    Ok(AuditRecord {
        id: AuditRecordId::from_uuid(model.id),
        occurred_at: utc(model.occurred_at),
        actor: actor("audit_log.actor", &model.actor)?,
        event: from_json("audit_log.event", model.event)?,
    })
}

#[async_trait]
impl AuditRepository for PgAuditRepository {
    async fn append(&self, record: &AuditRecord) -> Result<(), RepositoryError> {
        let keys = keys_of(&record.event);
        let model = audit_log::ActiveModel {
            id: Set(record.id.into_inner()),
            occurred_at: Set(record.occurred_at.into()),
            actor: Set(record.actor.as_str().to_string()),
            kind: Set(keys.kind.to_string()),
            entity_id: Set(keys.entity_id),
            instance_id: Set(keys.instance_id),
            job_name: Set(keys.job_name),
            event: Set(to_json(&record.event)?),
        };
        audit_log::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list(
        &self,
        filter: &AuditFilter,
        page: &PageRequest,
    ) -> Result<PageResponse<AuditRecord>, RepositoryError> {
        let mut query = audit_log::Entity::find();
        if let Some(entity_id) = filter.entity_id {
            query = query.filter(audit_log::Column::EntityId.eq(entity_id.into_inner()));
        }
        if let Some(instance_id) = filter.instance_id {
            query = query.filter(audit_log::Column::InstanceId.eq(instance_id.into_inner()));
        }
        if let Some(job_name) = &filter.job_name {
            query = query.filter(audit_log::Column::JobName.eq(job_name.as_str()));
        }

        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let data = query
            .order_by_desc(audit_log::Column::OccurredAt)
            .order_by_desc(audit_log::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(db_err)?
            .into_iter()
            .map(to_domain)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(page_of(data, page, total))
    }
}
