//! Reference job bodies shipped with the server.
//!
//! Deployments plug their own accounting jobs in; these read the live
//! configuration those jobs depend on and fail when it is inconsistent.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use anyhow::bail;
use tracing::{info, warn};
use vaultline_core::batch::{JobContext, JobHandler, job_fn};
use vaultline_core::versioning::{ConfigPayload, EntityType};

pub const DAILY_ACCRUAL: &str = "Daily Accrual";
pub const FEE_SWEEPER: &str = "Fee Sweeper";
pub const GL_MAPPING_CHECK: &str = "GL Mapping Check";

/// Handler for a configured job name.
pub fn builtin(name: &str) -> Option<Arc<dyn JobHandler>> {
    match name.trim() {
        DAILY_ACCRUAL => Some(job_fn(daily_accrual)),
        FEE_SWEEPER => Some(job_fn(fee_sweeper)),
        GL_MAPPING_CHECK => Some(job_fn(gl_mapping_check)),
        _ => None,
    }
}

async fn daily_accrual(ctx: JobContext) -> anyhow::Result<()> {
    let products = ctx.config.list_active(EntityType::Product).await?;
    for product in &products {
        if let ConfigPayload::Product(terms) = &product.payload {
            info!(
                record_id = %ctx.record_id,
                product = %terms.code,
                version = product.version,
                rate = %terms.interest_rate,
                basis = ?terms.interest_basis,
                "Accrual terms loaded"
            );
        }
    }
    info!(record_id = %ctx.record_id, products = products.len(), "Daily accrual inputs read");
    Ok(())
}

/// Fees whose trigger event has no live GL mapping cannot be posted.
async fn fee_sweeper(ctx: JobContext) -> anyhow::Result<()> {
    let fees = ctx.config.list_active(EntityType::Fee).await?;
    let mapped: HashSet<String> = ctx
        .config
        .list_active(EntityType::GlMapping)
        .await?
        .into_iter()
        .filter_map(|v| match v.payload {
            ConfigPayload::GlMapping(m) => Some(m.event_type),
            _ => None,
        })
        .collect();

    let mut unmapped = 0usize;
    for fee in &fees {
        if let ConfigPayload::Fee(schedule) = &fee.payload
            && !mapped.contains(&schedule.trigger_event)
        {
            unmapped += 1;
            warn!(
                record_id = %ctx.record_id,
                fee = %schedule.code,
                trigger_event = %schedule.trigger_event,
                "Fee has no GL mapping for its trigger event; skipped"
            );
        }
    }
    info!(
        record_id = %ctx.record_id,
        fees = fees.len(),
        unmapped,
        "Fee sweep finished"
    );
    Ok(())
}

/// Two live mappings for one ledger event make postings ambiguous.
async fn gl_mapping_check(ctx: JobContext) -> anyhow::Result<()> {
    let mappings = ctx.config.list_active(EntityType::GlMapping).await?;
    let mut by_event: BTreeMap<String, usize> = BTreeMap::new();
    for mapping in &mappings {
        if let ConfigPayload::GlMapping(m) = &mapping.payload {
            *by_event.entry(m.event_type.clone()).or_default() += 1;
        }
    }

    let duplicated: Vec<&String> = by_event
        .iter()
        .filter(|(_, count)| **count > 1)
        .map(|(event, _)| event)
        .collect();
    if !duplicated.is_empty() {
        bail!("ledger events mapped by more than one active GL mapping: {duplicated:?}");
    }

    info!(record_id = %ctx.record_id, mappings = mappings.len(), "GL mappings consistent");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vaultline_core::audit::AuditLog;
    use vaultline_core::batch::{BatchStatus, ConfigReader, JobScheduler};
    use vaultline_core::policy::{ApprovalPolicyResolver, RoleHierarchy, StaticRoleDirectory};
    use vaultline_core::repository::{
        InMemoryAuditRepository, InMemoryBatchRepository, InMemoryVersionRepository,
        InMemoryWorkflowRepository,
    };
    use vaultline_core::versioning::VersionedEntityStore;
    use vaultline_core::workflow::{
        MutationRequest, UnconfiguredLedger, WorkflowDeps, WorkflowEngine,
    };
    use vaultline_shared::config::PolicyConfig;
    use vaultline_shared::types::{ActorId, Role};

    struct Harness {
        store: VersionedEntityStore,
        engine: WorkflowEngine,
        scheduler: JobScheduler,
    }

    fn harness() -> Harness {
        let audit = AuditLog::new(Arc::new(InMemoryAuditRepository::default()));
        let store = VersionedEntityStore::new(
            Arc::new(InMemoryVersionRepository::default()),
            audit.clone(),
        );
        let engine = WorkflowEngine::new(WorkflowDeps {
            store: store.clone(),
            resolver: Arc::new(ApprovalPolicyResolver::from_config(&PolicyConfig::default()).unwrap()),
            roles: Arc::new(StaticRoleDirectory::default().with(
                ActorId::new("controller").unwrap(),
                Role::new("CHIEF_ACCOUNTANT").unwrap(),
            )),
            hierarchy: Arc::new(RoleHierarchy::default()),
            repo: Arc::new(InMemoryWorkflowRepository::default()),
            ledger: Arc::new(UnconfiguredLedger),
            audit: audit.clone(),
        });
        let scheduler = JobScheduler::new(
            Arc::new(InMemoryBatchRepository::default()),
            ConfigReader::new(store.clone()),
            audit,
        );
        Harness {
            store,
            engine,
            scheduler,
        }
    }

    async fn live_mapping(h: &Harness, event_type: &str) {
        let payload = ConfigPayload::from_fields(
            EntityType::GlMapping,
            json!({
                "event_type": event_type,
                "debit_account": "1000-CASH",
                "credit_account": "4000-FEES",
                "description": null
            }),
        )
        .unwrap();
        let maker = ActorId::new("maker").unwrap();
        let draft = h.store.create(None, payload, &maker).await.unwrap();
        let outcome = h
            .engine
            .submit(MutationRequest::Activate { version_id: draft.id }, &maker)
            .await
            .unwrap();
        h.engine
            .approve(outcome.instance.id, &ActorId::new("controller").unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn test_unknown_job_has_no_builtin() {
        assert!(builtin(DAILY_ACCRUAL).is_some());
        assert!(builtin(" Fee Sweeper ").is_some());
        assert!(builtin("Statement Run").is_none());
    }

    #[tokio::test]
    async fn test_gl_check_passes_on_distinct_events() {
        let h = harness();
        live_mapping(&h, "fee.charged").await;
        live_mapping(&h, "interest.capitalized").await;
        h.scheduler
            .register(GL_MAPPING_CHECK, builtin(GL_MAPPING_CHECK).unwrap())
            .unwrap();

        let record = h
            .scheduler
            .run(GL_MAPPING_CHECK, &ActorId::new("ops").unwrap())
            .await
            .unwrap();
        assert_eq!(record.status, BatchStatus::Completed);
    }

    #[tokio::test]
    async fn test_gl_check_fails_on_duplicate_event() {
        let h = harness();
        live_mapping(&h, "fee.charged").await;
        live_mapping(&h, "fee.charged").await;
        h.scheduler
            .register(GL_MAPPING_CHECK, builtin(GL_MAPPING_CHECK).unwrap())
            .unwrap();

        let record = h
            .scheduler
            .run(GL_MAPPING_CHECK, &ActorId::new("ops").unwrap())
            .await
            .unwrap();
        assert_eq!(record.status, BatchStatus::Failed);
        assert!(record.error_log.unwrap().contains("fee.charged"));
    }

    #[tokio::test]
    async fn test_accrual_and_sweep_complete_without_configuration() {
        let h = harness();
        for name in [DAILY_ACCRUAL, FEE_SWEEPER] {
            h.scheduler.register(name, builtin(name).unwrap()).unwrap();
            let record = h
                .scheduler
                .run(name, &ActorId::new("ops").unwrap())
                .await
                .unwrap();
            assert_eq!(record.status, BatchStatus::Completed, "{name}");
        }
    }
}
