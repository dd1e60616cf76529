//! Workflow instance repository.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use vaultline_core::error::RepositoryError;
use vaultline_core::repository::WorkflowRepository;
use vaultline_core::workflow::{InstanceStatus, WorkflowInstance};
use vaultline_shared::types::{PageRequest, PageResponse, Role, VersionId, WorkflowInstanceId};

use super::convert::{actor, corrupt, db_err, from_json, page_of, parse_column, to_json, utc};
use crate::entities::workflow_instances;

/// Postgres-backed maker-checker instances.
#[derive(Debug, Clone)]
pub struct PgWorkflowRepository {
    db: DatabaseConnection,
}

impl PgWorkflowRepository {
    /// Creates a new workflow repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: workflow_instances::Model) -> Result<WorkflowInstance, RepositoryError> {
    let role_required = model
        .role_required
        .as_deref()
        .map(|raw| Role::new(raw).ok_or_else(|| corrupt("workflow_instances.role_required", "blank role")))
        .transpose()?;
    let resolved_by = model
        .resolved_by
        .as_deref()
        .map(|raw| actor("workflow_instances.resolved_by", raw))
        .transpose()?;

    Ok(WorkflowInstance {
        id: WorkflowInstanceId::from_uuid(model.id),
        definition_id: model.definition_id,
        status: parse_column("workflow_instances.status", &model.status, InstanceStatus::parse)?,
        payload: from_json("workflow_instances.payload", model.payload)?,
        role_required,
        submitted_by: actor("workflow_instances.submitted_by", &model.submitted_by)?,
        created_at: utc(model.created_at),
        resolved_at: model.resolved_at.map(utc),
        resolved_by,
        resolution_reason: model.resolution_reason,
    })
}

#[async_trait]
impl WorkflowRepository for PgWorkflowRepository {
    async fn insert(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        let model = workflow_instances::ActiveModel {
            id: Set(instance.id.into_inner()),
            definition_id: Set(instance.definition_id.clone()),
            status: Set(instance.status.as_str().to_string()),
            payload: Set(to_json(&instance.payload)?),
            role_required: Set(instance.role_required.as_ref().map(|r| r.as_str().to_string())),
            submitted_by: Set(instance.submitted_by.as_str().to_string()),
            created_at: Set(instance.created_at.into()),
            resolved_at: Set(instance.resolved_at.map(Into::into)),
            resolved_by: Set(instance.resolved_by.as_ref().map(|a| a.as_str().to_string())),
            resolution_reason: Set(instance.resolution_reason.clone()),
        };
        workflow_instances::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn find(
        &self,
        id: WorkflowInstanceId,
    ) -> Result<Option<WorkflowInstance>, RepositoryError> {
        workflow_instances::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    async fn list_pending(
        &self,
        roles: &[Role],
        page: &PageRequest,
    ) -> Result<PageResponse<WorkflowInstance>, RepositoryError> {
        if roles.is_empty() {
            return Ok(page_of(Vec::new(), page, 0));
        }

        let query = workflow_instances::Entity::find()
            .filter(workflow_instances::Column::Status.eq(InstanceStatus::Pending.as_str()))
            .filter(workflow_instances::Column::RoleRequired.is_in(roles.iter().map(Role::as_str)));
        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let data = query
            .order_by_asc(workflow_instances::Column::CreatedAt)
            .order_by_asc(workflow_instances::Column::Id)
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

    async fn pending_activation(
        &self,
        version_id: VersionId,
    ) -> Result<Option<WorkflowInstance>, RepositoryError> {
        let model = workflow_instances::Entity::find()
            .filter(workflow_instances::Column::Status.eq(InstanceStatus::Pending.as_str()))
            .filter(Expr::cust_with_values(
                "payload->>'action' = 'activate' AND payload->>'version_id' = $1",
                [version_id.to_string()],
            ))
            .order_by_asc(workflow_instances::Column::CreatedAt)
            .one(&self.db)
            .await
            .map_err(db_err)?;
        model.map(to_domain).transpose()
    }

    async fn resolve(&self, instance: &WorkflowInstance) -> Result<(), RepositoryError> {
        let resolved_at: Option<sea_orm::prelude::DateTimeWithTimeZone> =
            instance.resolved_at.map(Into::into);
        let result = workflow_instances::Entity::update_many()
            .col_expr(
                workflow_instances::Column::Status,
                Expr::value(instance.status.as_str()),
            )
            .col_expr(workflow_instances::Column::ResolvedAt, Expr::value(resolved_at))
            .col_expr(
                workflow_instances::Column::ResolvedBy,
                Expr::value(instance.resolved_by.as_ref().map(|a| a.as_str().to_string())),
            )
            .col_expr(
                workflow_instances::Column::ResolutionReason,
                Expr::value(instance.resolution_reason.clone()),
            )
            .filter(workflow_instances::Column::Id.eq(instance.id.into_inner()))
            .filter(workflow_instances::Column::Status.eq(InstanceStatus::Pending.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::Conflict(format!(
                "instance {} is no longer pending",
                instance.id
            )));
        }
        Ok(())
    }
}
