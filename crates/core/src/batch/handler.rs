//! Job handlers and the context they run with.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use vaultline_shared::types::{ActorId, BatchRecordId, EntityId};

use crate::versioning::error::VersioningError;
use crate::versioning::store::VersionedEntityStore;
use crate::versioning::types::{EntityType, VersionedEntity};

/// Read-only view of live configuration handed to jobs.
///
/// Jobs price and post against ACTIVE versions only; they never see drafts
/// and cannot mutate configuration.
#[derive(Clone)]
pub struct ConfigReader {
    store: VersionedEntityStore,
}

impl ConfigReader {
    /// Wraps a store.
    #[must_use]
    pub fn new(store: VersionedEntityStore) -> Self {
        Self { store }
    }

    /// The lineage's ACTIVE version, if any.
    pub async fn get_active(
        &self,
        entity_id: EntityId,
    ) -> Result<Option<VersionedEntity>, VersioningError> {
        self.store.get_active(entity_id).await
    }

    /// Every ACTIVE version of `entity_type`.
    pub async fn list_active(
        &self,
        entity_type: EntityType,
    ) -> Result<Vec<VersionedEntity>, VersioningError> {
        self.store.list_active(entity_type).await
    }
}

/// Everything a handler gets for one run.
#[derive(Clone)]
pub struct JobContext {
    /// Record tracking this run.
    pub record_id: BatchRecordId,
    /// Registered job name.
    pub job_name: String,
    /// Operator or `system` for timer runs.
    pub triggered_by: ActorId,
    /// Live configuration.
    pub config: ConfigReader,
}

/// A unit of batch work.
///
/// Returning `Err` marks the run FAILED with the error chain as its log.
/// Panics are caught by the scheduler and recorded the same way.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Executes one run.
    async fn run(&self, ctx: JobContext) -> anyhow::Result<()>;
}

/// Adapter turning an async closure into a `JobHandler`.
pub struct FnJob<F>(F);

#[async_trait]
impl<F, Fut> JobHandler for FnJob<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<()>> + Send,
{
    async fn run(&self, ctx: JobContext) -> anyhow::Result<()> {
        (self.0)(ctx).await
    }
}

/// Wraps an async closure as a shareable handler.
///
/// ```ignore
/// scheduler.register("Fee Sweeper", job_fn(|ctx| async move {
///     let fees = ctx.config.list_active(EntityType::Fee).await?;
///     tracing::info!(count = fees.len(), "Sweeping fees");
///     Ok(())
/// }))?;
/// ```
pub fn job_fn<F, Fut>(f: F) -> Arc<dyn JobHandler>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnJob(f))
}
