//! Maker-checker workflow engine.
//!
//! `submit` either applies a mutation immediately (no policy) or parks it as
//! a PENDING instance. `approve` applies the parked mutation and resolves the
//! instance; `reject` resolves it without applying anything.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashSet;
use vaultline_shared::types::{ActorId, PageRequest, PageResponse, Role, WorkflowInstanceId};

use crate::audit::{AuditEvent, AuditLog};
use crate::policy::{ApprovalPolicyResolver, RoleDirectory, RoleHierarchy};
use crate::repository::WorkflowRepository;
use crate::versioning::lifecycle::VersionLifecycle;
use crate::versioning::store::VersionedEntityStore;
use crate::versioning::types::{VersionStatus, VersionedEntity};
use crate::workflow::error::WorkflowError;
use crate::workflow::ledger::{LedgerGateway, PostingInstruction};
use crate::workflow::service::WorkflowService;
use crate::workflow::types::{
    AppliedMutation, InstanceStatus, MutationRequest, WorkflowInstance, WorkflowOutcome,
};

/// Collaborators of the workflow engine.
#[derive(Clone)]
pub struct WorkflowDeps {
    /// Configuration store mutations are applied to.
    pub store: VersionedEntityStore,
    /// Policy resolution.
    pub resolver: Arc<ApprovalPolicyResolver>,
    /// Actor to role lookup.
    pub roles: Arc<dyn RoleDirectory>,
    /// Role subsumption.
    pub hierarchy: Arc<RoleHierarchy>,
    /// Instance persistence.
    pub repo: Arc<dyn WorkflowRepository>,
    /// Posting of approved monetary requests.
    pub ledger: Arc<dyn LedgerGateway>,
    /// Audit trail.
    pub audit: AuditLog,
}

/// Creates, advances and resolves approval instances.
#[derive(Clone)]
pub struct WorkflowEngine {
    deps: WorkflowDeps,
    in_flight: Arc<DashSet<WorkflowInstanceId>>,
}

/// Releases an in-flight claim when dropped.
struct Claim {
    claims: Arc<DashSet<WorkflowInstanceId>>,
    id: WorkflowInstanceId,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.claims.remove(&self.id);
    }
}

impl WorkflowEngine {
    /// Creates an engine over `deps`.
    #[must_use]
    pub fn new(deps: WorkflowDeps) -> Self {
        Self {
            deps,
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Submits a mutation on behalf of `actor`.
    ///
    /// The request is validated against current state first. Ungated
    /// requests are applied and recorded as an APPROVED instance; gated ones
    /// are persisted as PENDING with the role that must approve them.
    pub async fn submit(
        &self,
        request: MutationRequest,
        actor: &ActorId,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let target = match request.version_id() {
            Some(id) => Some(self.deps.store.get(id).await?),
            None => None,
        };
        if let Some(entity) = &target {
            self.ensure_not_frozen(entity).await?;
        }
        self.prevalidate(&request, target.as_ref()).await?;

        let definition_id = request.definition_id(target.as_ref().map(VersionedEntity::entity_type));
        let policy = self.deps.resolver.resolve(&request, target.as_ref());

        let mut instance = WorkflowInstance {
            id: WorkflowInstanceId::new(),
            definition_id,
            status: InstanceStatus::Pending,
            payload: request,
            role_required: policy.as_ref().map(|p| p.role_required.clone()),
            submitted_by: actor.clone(),
            created_at: Utc::now(),
            resolved_at: None,
            resolved_by: None,
            resolution_reason: None,
        };

        if let Some(policy) = policy {
            self.deps.repo.insert(&instance).await?;
            tracing::info!(
                instance_id = %instance.id,
                definition_id = %instance.definition_id,
                role_required = %policy.role_required,
                threshold = ?policy.threshold,
                submitted_by = %actor,
                "Request parked for approval"
            );
            return Ok(WorkflowOutcome {
                instance,
                applied: None,
            });
        }

        let applied = self.apply(instance.id, &instance.payload, actor).await?;
        instance.status = InstanceStatus::Approved;
        instance.resolved_at = Some(Utc::now());
        instance.resolved_by = Some(actor.clone());
        self.deps.repo.insert(&instance).await?;

        tracing::info!(
            instance_id = %instance.id,
            definition_id = %instance.definition_id,
            submitted_by = %actor,
            "Request applied without approval"
        );
        self.audit_decision(&instance, actor).await;
        Ok(WorkflowOutcome {
            instance,
            applied: Some(applied),
        })
    }

    /// PENDING instances `role` may approve, oldest first.
    pub async fn list_pending(
        &self,
        role: &Role,
        page: &PageRequest,
    ) -> Result<PageResponse<WorkflowInstance>, WorkflowError> {
        let roles = self.deps.hierarchy.subsumed_by(role);
        Ok(self.deps.repo.list_pending(&roles, page).await?)
    }

    /// Fetches an instance.
    pub async fn get(&self, id: WorkflowInstanceId) -> Result<WorkflowInstance, WorkflowError> {
        self.deps
            .repo
            .find(id)
            .await?
            .ok_or(WorkflowError::InstanceNotFound(id))
    }

    /// Approves a PENDING instance and applies its mutation.
    ///
    /// If applying fails the instance stays PENDING and the error is
    /// returned.
    pub async fn approve(
        &self,
        id: WorkflowInstanceId,
        actor: &ActorId,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let _claim = self.claim(id)?;
        let instance = self.get(id).await?;
        let action = WorkflowService::approve(instance.status, actor.clone())?;
        self.authorize(&instance, actor)?;
        self.ensure_unchanged(&instance).await?;

        let applied = match self.apply(instance.id, &instance.payload, actor).await {
            Ok(applied) => applied,
            Err(e) => {
                tracing::warn!(
                    instance_id = %id,
                    definition_id = %instance.definition_id,
                    approver = %actor,
                    error = %e,
                    "Approved mutation could not be applied; instance stays pending"
                );
                return Err(e);
            }
        };

        let resolved = action.apply_to(instance);
        self.deps.repo.resolve(&resolved).await?;
        tracing::info!(
            instance_id = %id,
            definition_id = %resolved.definition_id,
            approver = %actor,
            "Request approved"
        );
        self.audit_decision(&resolved, actor).await;

        Ok(WorkflowOutcome {
            instance: resolved,
            applied: Some(applied),
        })
    }

    /// Rejects a PENDING instance. The mutation is never applied.
    pub async fn reject(
        &self,
        id: WorkflowInstanceId,
        actor: &ActorId,
        reason: &str,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let _claim = self.claim(id)?;
        let instance = self.get(id).await?;
        let action = WorkflowService::reject(instance.status, actor.clone(), reason)?;
        self.authorize(&instance, actor)?;

        let resolved = action.apply_to(instance);
        self.deps.repo.resolve(&resolved).await?;
        tracing::info!(
            instance_id = %id,
            definition_id = %resolved.definition_id,
            checker = %actor,
            "Request rejected"
        );
        self.audit_decision(&resolved, actor).await;
        Ok(resolved)
    }

    fn claim(&self, id: WorkflowInstanceId) -> Result<Claim, WorkflowError> {
        if !self.in_flight.insert(id) {
            tracing::warn!(instance_id = %id, "Instance already being resolved");
            return Err(WorkflowError::InFlight(id));
        }
        Ok(Claim {
            claims: Arc::clone(&self.in_flight),
            id,
        })
    }

    fn authorize(&self, instance: &WorkflowInstance, actor: &ActorId) -> Result<(), WorkflowError> {
        let role = self.deps.roles.role_of(actor);
        WorkflowService::authorize(instance, actor, role.as_ref(), &self.deps.hierarchy).inspect_err(
            |e| {
                tracing::warn!(
                    instance_id = %instance.id,
                    actor = %actor,
                    role = ?role,
                    error = %e,
                    "Checker refused"
                );
            },
        )
    }

    /// A DRAFT awaiting activation accepts no further requests until the
    /// checker resolves it.
    async fn ensure_not_frozen(&self, target: &VersionedEntity) -> Result<(), WorkflowError> {
        if target.status != VersionStatus::Draft {
            return Ok(());
        }
        if let Some(pending) = self.deps.repo.pending_activation(target.id).await? {
            tracing::warn!(
                version_id = %target.id,
                instance_id = %pending.id,
                "Request refused: version awaits activation approval"
            );
            return Err(WorkflowError::AwaitingApproval {
                version_id: target.id,
                instance_id: pending.id,
            });
        }
        Ok(())
    }

    /// The checker approves the draft as it was when the maker submitted it.
    async fn ensure_unchanged(&self, instance: &WorkflowInstance) -> Result<(), WorkflowError> {
        let MutationRequest::Activate { version_id } = &instance.payload else {
            return Ok(());
        };
        let target = self.deps.store.get(*version_id).await?;
        if target.updated_at > instance.created_at {
            tracing::warn!(
                instance_id = %instance.id,
                version_id = %version_id,
                updated_at = %target.updated_at,
                "Activation refused: draft changed after submission"
            );
            return Err(WorkflowError::TargetChanged(*version_id));
        }
        Ok(())
    }

    async fn prevalidate(
        &self,
        request: &MutationRequest,
        target: Option<&VersionedEntity>,
    ) -> Result<(), WorkflowError> {
        match (request, target) {
            (MutationRequest::Activate { .. }, Some(entity)) => {
                VersionLifecycle::ensure_activatable(entity)?;
            }
            (MutationRequest::Update { version_id, patch }, Some(_)) => {
                self.deps.store.check_update(*version_id, patch).await?;
            }
            (MutationRequest::Archive { .. }, Some(entity)) => {
                VersionLifecycle::ensure_archivable(entity)?;
            }
            (MutationRequest::Withdrawal { account, amount, .. }, None) => {
                Self::require_account(account)?;
                Self::require_positive(amount)?;
            }
            (
                MutationRequest::Transfer {
                    from_account,
                    to_account,
                    amount,
                    ..
                },
                None,
            ) => {
                Self::require_account(from_account)?;
                Self::require_account(to_account)?;
                if from_account.trim() == to_account.trim() {
                    return Err(WorkflowError::InvalidRequest(
                        "transfer accounts must differ".into(),
                    ));
                }
                Self::require_positive(amount)?;
            }
            _ => {
                return Err(WorkflowError::InvalidRequest(
                    "request does not match its target".into(),
                ));
            }
        }
        Ok(())
    }

    fn require_account(account: &str) -> Result<(), WorkflowError> {
        if account.trim().is_empty() {
            return Err(WorkflowError::InvalidRequest("account must not be blank".into()));
        }
        Ok(())
    }

    fn require_positive(amount: &vaultline_shared::types::Money) -> Result<(), WorkflowError> {
        if !amount.is_positive() {
            return Err(WorkflowError::InvalidRequest(format!(
                "amount must be positive, got {amount}"
            )));
        }
        Ok(())
    }

    async fn apply(
        &self,
        instance_id: WorkflowInstanceId,
        request: &MutationRequest,
        actor: &ActorId,
    ) -> Result<AppliedMutation, WorkflowError> {
        let store = &self.deps.store;
        let applied = match request {
            MutationRequest::Activate { version_id } => {
                AppliedMutation::Entity(store.activate(*version_id, actor).await?)
            }
            MutationRequest::Update { version_id, patch } => {
                AppliedMutation::Entity(store.update(*version_id, patch, actor).await?)
            }
            MutationRequest::Archive { version_id } => {
                AppliedMutation::Entity(store.archive(*version_id, actor).await?)
            }
            MutationRequest::Withdrawal { .. } | MutationRequest::Transfer { .. } => {
                let instruction = PostingInstruction::from_request(instance_id, request)
                    .ok_or_else(|| WorkflowError::InvalidRequest("not a monetary request".into()))?;
                let receipt = self.deps.ledger.post(&instruction).await?;
                tracing::info!(
                    instance_id = %instance_id,
                    posting_id = %receipt.posting_id,
                    amount = %instruction.amount,
                    "Posting accepted by ledger"
                );
                AppliedMutation::Posting(receipt)
            }
        };
        Ok(applied)
    }

    async fn audit_decision(&self, instance: &WorkflowInstance, actor: &ActorId) {
        self.deps
            .audit
            .record(
                actor,
                AuditEvent::Decision {
                    instance_id: instance.id,
                    definition_id: instance.definition_id.clone(),
                    outcome: instance.status,
                    reason: instance.resolution_reason.clone(),
                },
            )
            .await;
    }
}
