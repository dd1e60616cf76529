//! Workflow service for approval instance state transitions.
//!
//! This module implements the state machine and the maker-checker
//! authorization rule. It performs no I/O.

use chrono::Utc;
use vaultline_shared::types::{ActorId, Role};

use crate::policy::RoleHierarchy;
use crate::workflow::error::WorkflowError;
use crate::workflow::types::{InstanceStatus, WorkflowAction, WorkflowInstance};

/// Stateless service for managing approval instance transitions.
///
/// All methods are associated functions that validate a transition and
/// return the `WorkflowAction` carrying its audit fields.
pub struct WorkflowService;

impl WorkflowService {
    /// Approve a pending instance.
    ///
    /// # Returns
    /// * `Ok(WorkflowAction::Approve)` if the transition is valid
    /// * `Err(WorkflowError::InvalidTransition)` if not in Pending status
    pub fn approve(
        current_status: InstanceStatus,
        approved_by: ActorId,
    ) -> Result<WorkflowAction, WorkflowError> {
        match current_status {
            InstanceStatus::Pending => Ok(WorkflowAction::Approve {
                new_status: InstanceStatus::Approved,
                approved_by,
                approved_at: Utc::now(),
            }),
            _ => Err(WorkflowError::InvalidTransition {
                from: current_status,
                to: InstanceStatus::Approved,
            }),
        }
    }

    /// Reject a pending instance.
    ///
    /// # Returns
    /// * `Ok(WorkflowAction::Reject)` if the transition is valid
    /// * `Err(WorkflowError::InvalidTransition)` if not in Pending status
    /// * `Err(WorkflowError::ReasonRequired)` if the reason is blank
    pub fn reject(
        current_status: InstanceStatus,
        rejected_by: ActorId,
        rejection_reason: &str,
    ) -> Result<WorkflowAction, WorkflowError> {
        let rejection_reason = rejection_reason.trim();
        if rejection_reason.is_empty() {
            return Err(WorkflowError::ReasonRequired);
        }

        match current_status {
            InstanceStatus::Pending => Ok(WorkflowAction::Reject {
                new_status: InstanceStatus::Rejected,
                rejected_by,
                rejected_at: Utc::now(),
                rejection_reason: rejection_reason.to_string(),
            }),
            _ => Err(WorkflowError::InvalidTransition {
                from: current_status,
                to: InstanceStatus::Rejected,
            }),
        }
    }

    /// Check that `actor` may resolve `instance`.
    ///
    /// # Returns
    /// * `Err(WorkflowError::SelfApproval)` if the actor is the maker
    /// * `Err(WorkflowError::NoRoleAssigned)` if the actor has no role
    /// * `Err(WorkflowError::InsufficientRole)` if the actor's role does not
    ///   satisfy `role_required`
    pub fn authorize(
        instance: &WorkflowInstance,
        actor: &ActorId,
        actor_role: Option<&Role>,
        hierarchy: &RoleHierarchy,
    ) -> Result<(), WorkflowError> {
        if &instance.submitted_by == actor {
            return Err(WorkflowError::SelfApproval(actor.clone()));
        }

        let Some(required) = &instance.role_required else {
            return Ok(());
        };
        let actual = actor_role.ok_or_else(|| WorkflowError::NoRoleAssigned(actor.clone()))?;
        if !hierarchy.satisfies(actual, required) {
            return Err(WorkflowError::InsufficientRole {
                actual: actual.clone(),
                required: required.clone(),
            });
        }
        Ok(())
    }

    /// Check if a status transition is valid.
    ///
    /// Valid transitions:
    /// - Pending → Approved (approve)
    /// - Pending → Rejected (reject)
    #[must_use]
    pub fn is_valid_transition(from: InstanceStatus, to: InstanceStatus) -> bool {
        matches!(
            (from, to),
            (
                InstanceStatus::Pending,
                InstanceStatus::Approved | InstanceStatus::Rejected
            )
        )
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::pending_instance;
    use super::*;

    fn actor(id: &str) -> ActorId {
        ActorId::new(id).unwrap()
    }

    fn role(name: &str) -> Role {
        Role::new(name).unwrap()
    }

    #[test]
    fn test_approve_from_pending() {
        let action = WorkflowService::approve(InstanceStatus::Pending, actor("bob")).unwrap();
        assert_eq!(action.new_status(), InstanceStatus::Approved);
    }

    #[test]
    fn test_approve_from_terminal_fails() {
        for status in [InstanceStatus::Approved, InstanceStatus::Rejected] {
            assert!(matches!(
                WorkflowService::approve(status, actor("bob")),
                Err(WorkflowError::InvalidTransition { .. })
            ));
        }
    }

    #[test]
    fn test_reject_from_pending() {
        let action =
            WorkflowService::reject(InstanceStatus::Pending, actor("bob"), " Wrong fee ").unwrap();
        let instance = action.apply_to(pending_instance("alice", "FINANCE_MANAGER"));
        assert_eq!(instance.status, InstanceStatus::Rejected);
        assert_eq!(instance.resolution_reason.as_deref(), Some("Wrong fee"));
        assert_eq!(instance.resolved_by, Some(actor("bob")));
        assert!(instance.resolved_at.is_some());
    }

    #[test]
    fn test_reject_whitespace_reason_fails() {
        assert!(matches!(
            WorkflowService::reject(InstanceStatus::Pending, actor("bob"), "   "),
            Err(WorkflowError::ReasonRequired)
        ));
    }

    #[test]
    fn test_maker_cannot_check() {
        let instance = pending_instance("alice", "FINANCE_MANAGER");
        let err = WorkflowService::authorize(
            &instance,
            &actor("alice"),
            Some(&role("FINANCE_MANAGER")),
            &RoleHierarchy::default(),
        )
        .unwrap_err();
        assert!(matches!(err, WorkflowError::SelfApproval(_)));
    }

    #[test]
    fn test_role_checks() {
        let instance = pending_instance("alice", "FINANCE_MANAGER");
        let hierarchy =
            RoleHierarchy::new([(role("CFO"), vec![role("FINANCE_MANAGER")])]);

        assert!(matches!(
            WorkflowService::authorize(&instance, &actor("bob"), None, &hierarchy),
            Err(WorkflowError::NoRoleAssigned(_))
        ));
        assert!(matches!(
            WorkflowService::authorize(&instance, &actor("bob"), Some(&role("TELLER")), &hierarchy),
            Err(WorkflowError::InsufficientRole { .. })
        ));
        assert!(
            WorkflowService::authorize(
                &instance,
                &actor("bob"),
                Some(&role("FINANCE_MANAGER")),
                &hierarchy
            )
            .is_ok()
        );
        assert!(
            WorkflowService::authorize(&instance, &actor("carol"), Some(&role("CFO")), &hierarchy)
                .is_ok()
        );
    }

    #[test]
    fn test_is_valid_transition() {
        assert!(WorkflowService::is_valid_transition(
            InstanceStatus::Pending,
            InstanceStatus::Approved
        ));
        assert!(WorkflowService::is_valid_transition(
            InstanceStatus::Pending,
            InstanceStatus::Rejected
        ));
        assert!(!WorkflowService::is_valid_transition(
            InstanceStatus::Approved,
            InstanceStatus::Rejected
        ));
        assert!(!WorkflowService::is_valid_transition(
            InstanceStatus::Rejected,
            InstanceStatus::Pending
        ));
    }
}
