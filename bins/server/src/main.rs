//! Vaultline API Server
//!
//! Main entry point for the configuration, approval and batch engine.

mod jobs;
mod storage;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vaultline_api::{AppState, HttpLedgerGateway, create_router};
use vaultline_core::audit::AuditLog;
use vaultline_core::batch::{ConfigReader, JobScheduler};
use vaultline_core::policy::{
    ApprovalPolicyResolver, RoleDirectory, RoleHierarchy, StaticRoleDirectory,
};
use vaultline_core::versioning::VersionedEntityStore;
use vaultline_core::workflow::{LedgerGateway, UnconfiguredLedger, WorkflowDeps, WorkflowEngine};
use vaultline_shared::AppConfig;
use vaultline_shared::config::SchedulerConfig;

use crate::storage::Repositories;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vaultline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let repositories = storage::open(config.database.as_ref()).await?;
    let state = build_state(&config, repositories)?;
    let timers = start_jobs(&config.scheduler, &state.scheduler)?;

    let app = create_router(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    for timer in timers {
        timer.abort();
    }
    info!("Server stopped");
    Ok(())
}

/// Wires the engine components over the chosen repositories.
fn build_state(config: &AppConfig, repositories: Repositories) -> anyhow::Result<AppState> {
    let audit = AuditLog::new(repositories.audit);
    let versions = VersionedEntityStore::new(repositories.versions, audit.clone());

    let resolver = ApprovalPolicyResolver::from_config(&config.policy)
        .context("Invalid [policy] configuration")?;
    let roles: Arc<dyn RoleDirectory> = Arc::new(StaticRoleDirectory::from_config(&config.roles));

    let ledger: Arc<dyn LedgerGateway> = if let Some(ledger) = &config.ledger {
        info!(base_url = %ledger.base_url, "Ledger gateway configured");
        Arc::new(HttpLedgerGateway::from_config(ledger))
    } else {
        warn!("No [ledger] configured; approved withdrawals and transfers will fail to post");
        Arc::new(UnconfiguredLedger)
    };

    let workflow = WorkflowEngine::new(WorkflowDeps {
        store: versions.clone(),
        resolver: Arc::new(resolver),
        roles: roles.clone(),
        hierarchy: Arc::new(RoleHierarchy::from_config(&config.roles)),
        repo: repositories.workflow,
        ledger,
        audit: audit.clone(),
    });

    let scheduler = JobScheduler::new(
        repositories.batch,
        ConfigReader::new(versions.clone()),
        audit.clone(),
    );

    Ok(AppState {
        versions,
        workflow,
        scheduler,
        audit,
        roles,
    })
}

/// Registers configured jobs and starts their timers.
fn start_jobs(
    config: &SchedulerConfig,
    scheduler: &JobScheduler,
) -> anyhow::Result<Vec<JoinHandle<()>>> {
    let mut timers = Vec::new();
    for job in &config.jobs {
        let handler = jobs::builtin(&job.name)
            .with_context(|| format!("No handler available for configured job '{}'", job.name))?;
        scheduler.register(&job.name, handler)?;

        match job.interval_secs {
            Some(secs) if secs > 0 => {
                timers.push(scheduler.schedule(&job.name, Duration::from_secs(secs))?);
                info!(job_name = %job.name, interval_secs = secs, "Job registered with timer");
            }
            _ => info!(job_name = %job.name, "Job registered (manual trigger only)"),
        }
    }
    Ok(timers)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal");
}
