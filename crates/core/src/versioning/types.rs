//! Versioned configuration domain types.
//!
//! A configuration entity (product, fee, rule, GL mapping) is a lineage of
//! immutable-once-live versions. The lineage is identified by `entity_id`;
//! each version row has its own storage `id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vaultline_shared::types::{ActorId, EntityId, VersionId};

use super::payload::ConfigPayload;

/// Lifecycle status of a configuration version.
///
/// The valid transitions are:
/// - Draft → Active (activate, only through an approved workflow)
/// - Draft → Archived (archive)
/// - Active → Archived (archive, or superseded by a newer version)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    /// Being prepared by a maker; freely editable.
    Draft,
    /// Live. Protected fields are frozen.
    Active,
    /// Retired. Read-only forever.
    Archived,
}

impl VersionStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::Active => "ACTIVE",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(Self::Draft),
            "ACTIVE" => Some(Self::Active),
            "ARCHIVED" => Some(Self::Archived),
            _ => None,
        }
    }

    /// Returns true if no further change of any kind is allowed.
    #[must_use]
    pub const fn is_read_only(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

impl fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of configuration entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// Deposit/loan product definition.
    Product,
    /// Fee schedule.
    Fee,
    /// Business rule.
    Rule,
    /// General-ledger account mapping.
    GlMapping,
}

impl EntityType {
    /// All entity types, in declaration order.
    pub const ALL: [Self; 4] = [Self::Product, Self::Fee, Self::Rule, Self::GlMapping];

    /// Returns the string representation of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Fee => "fee",
            Self::Rule => "rule",
            Self::GlMapping => "gl_mapping",
        }
    }

    /// Parses a type from a string. Accepts plural and kebab-case route forms
    /// (`fees`, `gl-mappings`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "product" | "products" => Some(Self::Product),
            "fee" | "fees" => Some(Self::Fee),
            "rule" | "rules" => Some(Self::Rule),
            "gl_mapping" | "gl_mappings" => Some(Self::GlMapping),
            _ => None,
        }
    }

    /// Fields that cannot change while a version of this type is ACTIVE.
    #[must_use]
    pub const fn immutable_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Product => &[
                "code",
                "currency",
                "interest_basis",
                "interest_rate",
                "capitalization",
            ],
            Self::Fee => &["code", "method", "value", "currency", "trigger_event"],
            Self::Rule => &["code", "condition", "action"],
            Self::GlMapping => &["event_type", "debit_account", "credit_account"],
        }
    }

    /// Returns true if `field` is frozen once a version goes live.
    #[must_use]
    pub fn is_immutable_field(&self, field: &str) -> bool {
        self.immutable_fields().contains(&field)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One version of a configuration entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionedEntity {
    /// Storage id, unique per version row.
    pub id: VersionId,
    /// Lineage id, stable across versions.
    pub entity_id: EntityId,
    /// Positive, monotonically increasing per lineage.
    pub version: i32,
    /// Lifecycle status.
    pub status: VersionStatus,
    /// Version this one was cloned from. Lineage only, not ownership.
    pub parent_id: Option<VersionId>,
    /// Typed configuration body.
    pub payload: ConfigPayload,
    /// Maker who created this version.
    pub created_by: ActorId,
    /// When the version was created.
    pub created_at: DateTime<Utc>,
    /// When the version last changed (payload or status).
    pub updated_at: DateTime<Utc>,
}

impl VersionedEntity {
    /// Returns the entity type carried by the payload.
    #[must_use]
    pub fn entity_type(&self) -> EntityType {
        self.payload.entity_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            VersionStatus::Draft,
            VersionStatus::Active,
            VersionStatus::Archived,
        ] {
            assert_eq!(VersionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VersionStatus::parse("active"), Some(VersionStatus::Active));
        assert_eq!(VersionStatus::parse("live"), None);
    }

    #[test]
    fn test_status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&VersionStatus::Archived).unwrap(),
            "\"ARCHIVED\""
        );
    }

    #[test]
    fn test_only_archived_is_read_only() {
        assert!(!VersionStatus::Draft.is_read_only());
        assert!(!VersionStatus::Active.is_read_only());
        assert!(VersionStatus::Archived.is_read_only());
    }

    #[test]
    fn test_entity_type_parse_route_forms() {
        assert_eq!(EntityType::parse("fees"), Some(EntityType::Fee));
        assert_eq!(EntityType::parse("gl-mappings"), Some(EntityType::GlMapping));
        assert_eq!(EntityType::parse("Product"), Some(EntityType::Product));
        assert_eq!(EntityType::parse("ledger"), None);
    }

    #[test]
    fn test_immutable_fields() {
        assert!(EntityType::Fee.is_immutable_field("method"));
        assert!(EntityType::Fee.is_immutable_field("value"));
        assert!(!EntityType::Fee.is_immutable_field("name"));
        assert!(EntityType::Product.is_immutable_field("interest_basis"));
        assert!(!EntityType::Product.is_immutable_field("description"));
    }
}
