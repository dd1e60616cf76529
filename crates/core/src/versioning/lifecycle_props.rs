//! Property-based tests for the version lifecycle rules.

use proptest::prelude::*;
use serde_json::json;

use crate::versioning::error::VersioningError;
use crate::versioning::lifecycle::VersionLifecycle;
use crate::versioning::lifecycle::fixtures::fee_version;
use crate::versioning::payload::FieldPatch;
use crate::versioning::types::{EntityType, VersionStatus};

const FEE_FIELDS: [&str; 7] = [
    "code",
    "name",
    "description",
    "method",
    "value",
    "currency",
    "trigger_event",
];

fn arb_status() -> impl Strategy<Value = VersionStatus> {
    prop_oneof![
        Just(VersionStatus::Draft),
        Just(VersionStatus::Active),
        Just(VersionStatus::Archived),
    ]
}

fn arb_patch() -> impl Strategy<Value = FieldPatch> {
    proptest::sample::subsequence(FEE_FIELDS.to_vec(), 1..=FEE_FIELDS.len()).prop_map(|keys| {
        keys.into_iter()
            .map(|k| (k.to_string(), json!("x")))
            .collect()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// An ACTIVE fee accepts a patch exactly when it touches no protected field.
    #[test]
    fn prop_active_edit_allowed_iff_no_immutable_key(patch in arb_patch()) {
        let active = fee_version(VersionStatus::Active);
        let touches_protected = patch.keys().any(|k| EntityType::Fee.is_immutable_field(k));
        let result = VersionLifecycle::ensure_editable(&active, &patch);

        if touches_protected {
            let is_immutable_error = matches!(result, Err(VersioningError::ImmutableField { .. }));
            prop_assert!(is_immutable_error);
        } else {
            prop_assert!(result.is_ok());
        }
    }

    /// ARCHIVED rejects every edit and every further transition.
    #[test]
    fn prop_archived_is_terminal(patch in arb_patch(), to in arb_status()) {
        let archived = fee_version(VersionStatus::Archived);
        prop_assert!(VersionLifecycle::ensure_editable(&archived, &patch).is_err());
        prop_assert!(VersionLifecycle::ensure_archivable(&archived).is_err());
        prop_assert!(VersionLifecycle::ensure_activatable(&archived).is_err());
        prop_assert!(!VersionLifecycle::is_valid_transition(VersionStatus::Archived, to));
    }

    /// Guards agree with the transition table.
    #[test]
    fn prop_guards_match_transition_table(status in arb_status()) {
        let entity = fee_version(status);
        prop_assert_eq!(
            VersionLifecycle::ensure_activatable(&entity).is_ok(),
            VersionLifecycle::is_valid_transition(status, VersionStatus::Active)
        );
        prop_assert_eq!(
            VersionLifecycle::ensure_archivable(&entity).is_ok(),
            VersionLifecycle::is_valid_transition(status, VersionStatus::Archived)
        );
    }

    /// No transition ever leads back to DRAFT.
    #[test]
    fn prop_nothing_returns_to_draft(from in arb_status()) {
        prop_assert!(!VersionLifecycle::is_valid_transition(from, VersionStatus::Draft));
    }
}
