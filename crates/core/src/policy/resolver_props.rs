//! Property-based tests for ApprovalPolicyResolver.

use proptest::prelude::*;
use rust_decimal::Decimal;
use vaultline_shared::types::{Currency, Money};

use crate::policy::resolver::ApprovalPolicyResolver;
use crate::policy::resolver::fixtures::policy_config;
use crate::versioning::lifecycle::fixtures::fee_version;
use crate::versioning::types::VersionStatus;
use crate::workflow::types::MutationRequest;

/// Amounts from 0.00 to 2,000,000.00 with cent precision.
fn arb_amount() -> impl Strategy<Value = Decimal> {
    (0i64..200_000_000).prop_map(|cents| Decimal::new(cents, 2))
}

fn arb_status() -> impl Strategy<Value = VersionStatus> {
    prop_oneof![
        Just(VersionStatus::Draft),
        Just(VersionStatus::Active),
        Just(VersionStatus::Archived),
    ]
}

fn resolver() -> ApprovalPolicyResolver {
    ApprovalPolicyResolver::from_config(&policy_config()).expect("valid policy")
}

fn withdrawal(amount: Decimal) -> MutationRequest {
    MutationRequest::Withdrawal {
        account: "ACC-1".into(),
        amount: Money::new(amount, Currency::Usd),
        reference: None,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Resolution is a pure function of its inputs.
    #[test]
    fn prop_resolve_is_deterministic(amount in arb_amount()) {
        let resolver = resolver();
        let request = withdrawal(amount);
        prop_assert_eq!(resolver.resolve(&request, None), resolver.resolve(&request, None));
    }

    /// Gated exactly when the amount exceeds the threshold.
    #[test]
    fn prop_gated_iff_above_threshold(amount in arb_amount()) {
        let policy = resolver().resolve(&withdrawal(amount), None);
        prop_assert_eq!(policy.is_some(), amount > Decimal::from(10_000));
    }

    /// The required role's limit covers the amount, and no cheaper role does.
    #[test]
    fn prop_required_role_is_smallest_covering_limit(amount in arb_amount()) {
        prop_assume!(amount > Decimal::from(10_000));
        let policy = resolver().resolve(&withdrawal(amount), None).expect("gated");
        let expected = if amount <= Decimal::from(50_000) {
            "SUPERVISOR"
        } else if amount <= Decimal::from(1_000_000) {
            "CFO"
        } else {
            "ADMIN"
        };
        prop_assert_eq!(policy.role_required.as_str(), expected);
    }

    /// Activation is gated whatever state the target is in.
    #[test]
    fn prop_activation_always_gated(status in arb_status()) {
        let entity = fee_version(status);
        let request = MutationRequest::Activate { version_id: entity.id };
        let policy = resolver().resolve(&request, Some(&entity));
        prop_assert!(policy.is_some_and(|p| p.requires_approval));
    }
}
