//! Storage backend selection.

use std::sync::Arc;

use tracing::{info, warn};
use vaultline_core::repository::{
    AuditRepository, BatchRepository, InMemoryAuditRepository, InMemoryBatchRepository,
    InMemoryVersionRepository, InMemoryWorkflowRepository, VersionRepository, WorkflowRepository,
};
use vaultline_db::{
    PgAuditRepository, PgBatchRepository, PgVersionRepository, PgWorkflowRepository,
};
use vaultline_shared::config::DatabaseConfig;

/// The four repositories the engine runs on.
pub struct Repositories {
    pub versions: Arc<dyn VersionRepository>,
    pub workflow: Arc<dyn WorkflowRepository>,
    pub batch: Arc<dyn BatchRepository>,
    pub audit: Arc<dyn AuditRepository>,
}

impl Repositories {
    /// Process-local storage; everything is lost on restart.
    pub fn in_memory() -> Self {
        Self {
            versions: Arc::new(InMemoryVersionRepository::default()),
            workflow: Arc::new(InMemoryWorkflowRepository::default()),
            batch: Arc::new(InMemoryBatchRepository::default()),
            audit: Arc::new(InMemoryAuditRepository::default()),
        }
    }
}

/// Connects to Postgres when `[database]` is configured, otherwise falls
/// back to in-memory storage.
pub async fn open(config: Option<&DatabaseConfig>) -> anyhow::Result<Repositories> {
    let Some(config) = config else {
        warn!("No [database] section configured; using in-memory storage");
        return Ok(Repositories::in_memory());
    };

    let db = vaultline_db::connect_with(config).await?;
    info!(
        max_connections = config.max_connections,
        "Connected to database"
    );

    Ok(Repositories {
        versions: Arc::new(PgVersionRepository::new(db.clone())),
        workflow: Arc::new(PgWorkflowRepository::new(db.clone())),
        batch: Arc::new(PgBatchRepository::new(db.clone())),
        audit: Arc::new(PgAuditRepository::new(db)),
    })
}
