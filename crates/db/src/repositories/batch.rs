//! Batch run repository.
//!
//! `uq_batch_records_one_running` makes `start` fail for a job that already
//! has a RUNNING row, on every node sharing the database.

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use vaultline_core::batch::{BatchRecord, BatchStatus, TriggerSource};
use vaultline_core::error::RepositoryError;
use vaultline_core::repository::BatchRepository;
use vaultline_shared::types::{BatchRecordId, PageRequest, PageResponse};

use super::convert::{actor, db_err, page_of, parse_column, utc};
use crate::entities::batch_records;

/// Postgres-backed batch records.
#[derive(Debug, Clone)]
pub struct PgBatchRepository {
    db: DatabaseConnection,
}

impl PgBatchRepository {
    /// Creates a new batch repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn to_domain(model: batch_records::Model) -> Result<BatchRecord, RepositoryError> {
    Ok(BatchRecord {
        id: BatchRecordId::from_uuid(model.id),
        job_name: model.job_name,
        start_time: utc(model.start_time),
        end_time: model.end_time.map(utc),
        status: parse_column("batch_records.status", &model.status, BatchStatus::parse)?,
        error_log: model.error_log,
        triggered_by: actor("batch_records.triggered_by", &model.triggered_by)?,
        trigger: parse_column(
            "batch_records.trigger_source",
            &model.trigger_source,
            TriggerSource::parse,
        )?,
    })
}

#[async_trait]
impl BatchRepository for PgBatchRepository {
    async fn start(&self, record: &BatchRecord) -> Result<(), RepositoryError> {
        let model = batch_records::ActiveModel {
            id: Set(record.id.into_inner()),
            job_name: Set(record.job_name.clone()),
            start_time: Set(record.start_time.into()),
            end_time: Set(None),
            status: Set(BatchStatus::Running.as_str().to_string()),
            error_log: Set(None),
            triggered_by: Set(record.triggered_by.as_str().to_string()),
            trigger_source: Set(record.trigger.as_str().to_string()),
        };
        batch_records::Entity::insert(model)
            .exec(&self.db)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn finish(&self, record: &BatchRecord) -> Result<(), RepositoryError> {
        let end_time: Option<sea_orm::prelude::DateTimeWithTimeZone> =
            record.end_time.map(Into::into);
        let result = batch_records::Entity::update_many()
            .col_expr(batch_records::Column::Status, Expr::value(record.status.as_str()))
            .col_expr(batch_records::Column::EndTime, Expr::value(end_time))
            .col_expr(
                batch_records::Column::ErrorLog,
                Expr::value(record.error_log.clone()),
            )
            .filter(batch_records::Column::Id.eq(record.id.into_inner()))
            .filter(batch_records::Column::Status.eq(BatchStatus::Running.as_str()))
            .exec(&self.db)
            .await
            .map_err(db_err)?;

        if result.rows_affected == 0 {
            return Err(RepositoryError::Conflict(format!(
                "record {} is no longer running",
                record.id
            )));
        }
        Ok(())
    }

    async fn find(&self, id: BatchRecordId) -> Result<Option<BatchRecord>, RepositoryError> {
        batch_records::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(db_err)?
            .map(to_domain)
            .transpose()
    }

    async fn history(
        &self,
        job_name: Option<&str>,
        page: &PageRequest,
    ) -> Result<PageResponse<BatchRecord>, RepositoryError> {
        let mut query = batch_records::Entity::find();
        if let Some(name) = job_name {
            query = query.filter(batch_records::Column::JobName.eq(name));
        }
        let total = query.clone().count(&self.db).await.map_err(db_err)?;
        let data = query
            .order_by_desc(batch_records::Column::StartTime)
            .order_by_desc(batch_records::Column::Id)
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
