//! Lifecycle rules for configuration versions.
//!
//! Pure checks with no storage access. The store calls these before every
//! write so the rules live in exactly one place.

use vaultline_shared::types::VersionId;

use crate::versioning::error::VersioningError;
use crate::versioning::payload::FieldPatch;
use crate::versioning::types::{VersionStatus, VersionedEntity};

/// Stateless service holding the version state machine.
pub struct VersionLifecycle;

impl VersionLifecycle {
    /// Checks that `patch` may be applied to `entity`.
    ///
    /// # Returns
    /// * `Err(VersioningError::InvalidState)` if the version is ARCHIVED
    /// * `Err(VersioningError::ImmutableField)` if an ACTIVE version's
    ///   protected field is in the patch
    /// * `Err(VersioningError::Validation)` for an empty patch
    pub fn ensure_editable(
        entity: &VersionedEntity,
        patch: &FieldPatch,
    ) -> Result<(), VersioningError> {
        if patch.is_empty() {
            return Err(VersioningError::Validation("patch is empty".into()));
        }

        match entity.status {
            VersionStatus::Archived => Err(VersioningError::InvalidState {
                id: entity.id,
                status: entity.status,
                operation: "update",
            }),
            VersionStatus::Active => {
                let entity_type = entity.entity_type();
                // Sorted so the reported field does not depend on map order.
                let mut keys: Vec<&String> = patch.keys().collect();
                keys.sort();
                match keys.into_iter().find(|k| entity_type.is_immutable_field(k)) {
                    Some(field) => Err(VersioningError::ImmutableField {
                        id: entity.id,
                        field: field.clone(),
                    }),
                    None => Ok(()),
                }
            }
            VersionStatus::Draft => Ok(()),
        }
    }

    /// Only ACTIVE versions may be cloned.
    pub fn ensure_cloneable(entity: &VersionedEntity) -> Result<(), VersioningError> {
        Self::require(entity, VersionStatus::Active, "clone")
    }

    /// Only DRAFT versions may be activated.
    pub fn ensure_activatable(entity: &VersionedEntity) -> Result<(), VersioningError> {
        Self::require(entity, VersionStatus::Draft, "activate")
    }

    /// DRAFT and ACTIVE versions may be archived; ARCHIVED is terminal.
    pub fn ensure_archivable(entity: &VersionedEntity) -> Result<(), VersioningError> {
        if entity.status.is_read_only() {
            return Err(Self::invalid(entity.id, entity.status, "archive"));
        }
        Ok(())
    }

    /// Check if a status transition is valid.
    ///
    /// Valid transitions:
    /// - Draft → Active (activate)
    /// - Draft → Archived (archive)
    /// - Active → Archived (archive, superseded)
    #[must_use]
    pub fn is_valid_transition(from: VersionStatus, to: VersionStatus) -> bool {
        matches!(
            (from, to),
            (VersionStatus::Draft, VersionStatus::Active | VersionStatus::Archived)
                | (VersionStatus::Active, VersionStatus::Archived)
        )
    }

    fn require(
        entity: &VersionedEntity,
        expected: VersionStatus,
        operation: &'static str,
    ) -> Result<(), VersioningError> {
        if entity.status == expected {
            Ok(())
        } else {
            Err(Self::invalid(entity.id, entity.status, operation))
        }
    }

    const fn invalid(
        id: VersionId,
        status: VersionStatus,
        operation: &'static str,
    ) -> VersioningError {
        VersioningError::InvalidState {
            id,
            status,
            operation,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::Utc;
    use serde_json::json;
    use vaultline_shared::types::{ActorId, EntityId, VersionId};

    use crate::versioning::payload::ConfigPayload;
    use crate::versioning::types::{EntityType, VersionStatus, VersionedEntity};

    pub(crate) fn fee_payload(value: &str) -> ConfigPayload {
        ConfigPayload::from_fields(
            EntityType::Fee,
            json!({
                "code": "ATM-INTL",
                "name": "International ATM fee",
                "description": null,
                "method": "FLAT",
                "value": value,
                "currency": "USD",
                "trigger_event": "atm.withdrawal"
            }),
        )
        .expect("valid fee")
    }

    pub(crate) fn fee_version(status: VersionStatus) -> VersionedEntity {
        let now = Utc::now();
        VersionedEntity {
            id: VersionId::new(),
            entity_id: EntityId::new(),
            version: 1,
            status,
            parent_id: None,
            payload: fee_payload("500"),
            created_by: ActorId::new("maker").expect("actor"),
            created_at: now,
            updated_at: now,
        }
    }
}
