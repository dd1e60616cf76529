//! Property-based tests for WorkflowService.

use proptest::prelude::*;
use vaultline_shared::types::{ActorId, Role};

use crate::policy::RoleHierarchy;
use crate::workflow::error::WorkflowError;
use crate::workflow::service::WorkflowService;
use crate::workflow::service::fixtures::pending_instance;
use crate::workflow::types::{InstanceStatus, WorkflowAction};

fn arb_status() -> impl Strategy<Value = InstanceStatus> {
    prop_oneof![
        Just(InstanceStatus::Pending),
        Just(InstanceStatus::Approved),
        Just(InstanceStatus::Rejected),
    ]
}

fn arb_actor() -> impl Strategy<Value = ActorId> {
    "[a-z]{1,12}".prop_map(|s| ActorId::new(s).expect("non-blank"))
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just("TELLER"),
        Just("SUPERVISOR"),
        Just("FINANCE_MANAGER"),
        Just("CFO"),
    ]
    .prop_map(|r| Role::new(r).expect("non-blank"))
}

fn arb_reason() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{1,100}"
}

fn hierarchy() -> RoleHierarchy {
    let role = |r: &str| Role::new(r).expect("non-blank");
    RoleHierarchy::new([
        (role("CFO"), vec![role("FINANCE_MANAGER")]),
        (role("FINANCE_MANAGER"), vec![role("SUPERVISOR")]),
    ])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Pending + approve → Approved carrying the checker.
    #[test]
    fn prop_approve_from_pending_succeeds(checker in arb_actor()) {
        let action = WorkflowService::approve(InstanceStatus::Pending, checker.clone());
        prop_assert!(action.is_ok());
        let action = action.unwrap();
        prop_assert_eq!(action.new_status(), InstanceStatus::Approved);
        if let WorkflowAction::Approve { approved_by, .. } = action {
            prop_assert_eq!(approved_by, checker);
        } else {
            prop_assert!(false, "Expected Approve action");
        }
    }

    /// Resolved instances never transition again.
    #[test]
    fn prop_terminal_is_final(
        status in arb_status(),
        checker in arb_actor(),
        reason in arb_reason()
    ) {
        prop_assume!(status.is_terminal());
        prop_assume!(!reason.trim().is_empty());

        let approve_is_invalid = matches!(
            WorkflowService::approve(status, checker.clone()),
            Err(WorkflowError::InvalidTransition { .. })
        );
        let reject_is_invalid = matches!(
            WorkflowService::reject(status, checker, &reason),
            Err(WorkflowError::InvalidTransition { .. })
        );
        prop_assert!(approve_is_invalid);
        prop_assert!(reject_is_invalid);
    }

    /// The maker is refused whatever role they hold.
    #[test]
    fn prop_maker_never_checks(maker in arb_actor(), role in arb_role()) {
        let instance = pending_instance(maker.as_str(), "SUPERVISOR");
        let result = WorkflowService::authorize(&instance, &maker, Some(&role), &hierarchy());
        let is_self_approval = matches!(result, Err(WorkflowError::SelfApproval(_)));
        prop_assert!(is_self_approval);
    }

    /// A different actor passes exactly when the hierarchy says so.
    #[test]
    fn prop_authorize_follows_hierarchy(
        required in arb_role(),
        held in arb_role()
    ) {
        let instance = pending_instance("maker", required.as_str());
        let checker = ActorId::new("checker").expect("non-blank");
        let hierarchy = hierarchy();
        let result = WorkflowService::authorize(&instance, &checker, Some(&held), &hierarchy);
        prop_assert_eq!(result.is_ok(), hierarchy.satisfies(&held, &required));
    }

    /// is_valid_transition returns true only for Pending → terminal.
    #[test]
    fn prop_is_valid_transition_consistency(from in arb_status(), to in arb_status()) {
        let expected = from == InstanceStatus::Pending && to.is_terminal();
        prop_assert_eq!(WorkflowService::is_valid_transition(from, to), expected);
    }
}

#[cfg(test)]
mod edge_case_tests {
    use super::*;

    #[test]
    fn test_reject_tab_only_reason_fails() {
        let result = WorkflowService::reject(
            InstanceStatus::Pending,
            ActorId::new("bob").unwrap(),
            "\t\t",
        );
        assert!(matches!(result, Err(WorkflowError::ReasonRequired)));
    }

    #[test]
    fn test_same_status_transitions_invalid() {
        for status in [
            InstanceStatus::Pending,
            InstanceStatus::Approved,
            InstanceStatus::Rejected,
        ] {
            assert!(!WorkflowService::is_valid_transition(status, status));
        }
    }
}
