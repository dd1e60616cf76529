//! Versioned configuration for products, fees, business rules and GL
//! mappings.
//!
//! A live value is never mutated in a way that changes its financial
//! meaning: protected fields change only by cloning the ACTIVE version,
//! editing the DRAFT, and activating it through an approved workflow.
//!
//! # Modules
//!
//! - `types` - Version status, entity type and the version record
//! - `payload` - Typed, validated payloads per entity type
//! - `error` - Versioning error types
//! - `lifecycle` - Pure transition and edit rules
//! - `store` - `VersionedEntityStore`

pub mod error;
pub mod lifecycle;
pub mod payload;
pub mod store;
pub mod types;

#[cfg(test)]
mod lifecycle_props;

pub use error::VersioningError;
pub use lifecycle::VersionLifecycle;
pub use payload::{
    BusinessRule, CapitalizationFrequency, ConfigPayload, FeeMethod, FeeSchedule, FieldPatch,
    GlMapping, InterestBasis, ProductTerms, RuleAction, RuleCondition,
};
pub use store::VersionedEntityStore;
pub use types::{EntityType, VersionStatus, VersionedEntity};
