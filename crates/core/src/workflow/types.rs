//! Workflow domain types for maker-checker approvals.
//!
//! This module defines the approval instance, the typed mutation it carries,
//! and the transition actions produced by `WorkflowService`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use vaultline_shared::types::{ActorId, Money, Role, VersionId, WorkflowInstanceId};

use crate::versioning::payload::FieldPatch;
use crate::versioning::types::{EntityType, VersionedEntity};
use crate::workflow::ledger::PostingReceipt;

/// Status of an approval instance.
///
/// The valid transitions are:
/// - Pending → Approved (approve)
/// - Pending → Rejected (reject)
///
/// Both targets are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstanceStatus {
    /// Waiting for a checker.
    Pending,
    /// Approved; the mutation has been applied.
    Approved,
    /// Rejected; the mutation was never applied.
    Rejected,
}

impl InstanceStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
        }
    }

    /// Parses a status from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(Self::Pending),
            "APPROVED" => Some(Self::Approved),
            "REJECTED" => Some(Self::Rejected),
            _ => None,
        }
    }

    /// Returns true if the instance can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A mutation that may need maker-checker approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum MutationRequest {
    /// Make a DRAFT version live.
    Activate {
        /// Target version.
        version_id: VersionId,
    },
    /// Patch fields of a version.
    Update {
        /// Target version.
        version_id: VersionId,
        /// Field changes.
        patch: FieldPatch,
    },
    /// Retire a version.
    Archive {
        /// Target version.
        version_id: VersionId,
    },
    /// Cash withdrawal posted through the ledger gateway.
    Withdrawal {
        /// Account debited.
        account: String,
        /// Amount withdrawn.
        amount: Money,
        /// Caller reference.
        #[serde(default)]
        reference: Option<String>,
    },
    /// Account-to-account transfer posted through the ledger gateway.
    Transfer {
        /// Account debited.
        from_account: String,
        /// Account credited.
        to_account: String,
        /// Amount moved.
        amount: Money,
        /// Caller reference.
        #[serde(default)]
        reference: Option<String>,
    },
}

impl MutationRequest {
    /// Target version for configuration mutations.
    #[must_use]
    pub const fn version_id(&self) -> Option<VersionId> {
        match self {
            Self::Activate { version_id }
            | Self::Update { version_id, .. }
            | Self::Archive { version_id } => Some(*version_id),
            Self::Withdrawal { .. } | Self::Transfer { .. } => None,
        }
    }

    /// Amount for monetary requests.
    #[must_use]
    pub const fn amount(&self) -> Option<&Money> {
        match self {
            Self::Withdrawal { amount, .. } | Self::Transfer { amount, .. } => Some(amount),
            Self::Activate { .. } | Self::Update { .. } | Self::Archive { .. } => None,
        }
    }

    /// Verb part of the definition id.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Update { .. } => "update",
            Self::Archive { .. } => "archive",
            Self::Withdrawal { .. } | Self::Transfer { .. } => "request",
        }
    }

    /// Trigger key such as `fee.activate` or `withdrawal.request`.
    ///
    /// `entity_type` is the type of the target version for configuration
    /// mutations and ignored otherwise.
    #[must_use]
    pub fn definition_id(&self, entity_type: Option<EntityType>) -> String {
        let subject = match self {
            Self::Withdrawal { .. } => "withdrawal",
            Self::Transfer { .. } => "transfer",
            _ => entity_type.map_or("config", |t| t.as_str()),
        };
        format!("{subject}.{}", self.verb())
    }
}

/// A maker-checker approval instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowInstance {
    /// Instance id.
    pub id: WorkflowInstanceId,
    /// Trigger key, e.g. `product.activate`.
    pub definition_id: String,
    /// Current status.
    pub status: InstanceStatus,
    /// The deferred mutation.
    pub payload: MutationRequest,
    /// Role that must approve. `None` for auto-approved instances.
    pub role_required: Option<Role>,
    /// Maker.
    pub submitted_by: ActorId,
    /// When the instance was submitted.
    pub created_at: DateTime<Utc>,
    /// When the instance was resolved.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Checker (or the maker, for auto-approved instances).
    pub resolved_by: Option<ActorId>,
    /// Rejection reason.
    pub resolution_reason: Option<String>,
}

/// What an applied mutation produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "result", rename_all = "snake_case")]
pub enum AppliedMutation {
    /// The configuration version after the change.
    Entity(VersionedEntity),
    /// The ledger's receipt for a monetary posting.
    Posting(PostingReceipt),
}

/// Result of `submit` or `approve`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowOutcome {
    /// The instance in its new state.
    pub instance: WorkflowInstance,
    /// Set when the mutation was applied by this call.
    pub applied: Option<AppliedMutation>,
}

/// Workflow action representing a state transition with audit data.
#[derive(Debug, Clone)]
pub enum WorkflowAction {
    /// Approve a pending instance.
    Approve {
        /// The new status after approval.
        new_status: InstanceStatus,
        /// The checker.
        approved_by: ActorId,
        /// When the instance was approved.
        approved_at: DateTime<Utc>,
    },
    /// Reject a pending instance.
    Reject {
        /// The new status after rejection.
        new_status: InstanceStatus,
        /// The checker.
        rejected_by: ActorId,
        /// When the instance was rejected.
        rejected_at: DateTime<Utc>,
        /// The reason for rejection.
        rejection_reason: String,
    },
}

impl WorkflowAction {
    /// Returns the new status resulting from this action.
    #[must_use]
    pub const fn new_status(&self) -> InstanceStatus {
        match self {
            Self::Approve { new_status, .. } | Self::Reject { new_status, .. } => *new_status,
        }
    }

    /// Returns `instance` with this action's status and audit fields set.
    #[must_use]
    pub fn apply_to(self, mut instance: WorkflowInstance) -> WorkflowInstance {
        match self {
            Self::Approve {
                new_status,
                approved_by,
                approved_at,
            } => {
                instance.status = new_status;
                instance.resolved_by = Some(approved_by);
                instance.resolved_at = Some(approved_at);
            }
            Self::Reject {
                new_status,
                rejected_by,
                rejected_at,
                rejection_reason,
            } => {
                instance.status = new_status;
                instance.resolved_by = Some(rejected_by);
                instance.resolved_at = Some(rejected_at);
                instance.resolution_reason = Some(rejection_reason);
            }
        }
        instance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use vaultline_shared::types::Currency;

    #[test]
    fn test_status_as_str() {
        assert_eq!(InstanceStatus::Pending.as_str(), "PENDING");
        assert_eq!(InstanceStatus::parse("approved"), Some(InstanceStatus::Approved));
        assert_eq!(InstanceStatus::parse("posted"), None);
    }

    #[test]
    fn test_status_terminal() {
        assert!(!InstanceStatus::Pending.is_terminal());
        assert!(InstanceStatus::Approved.is_terminal());
        assert!(InstanceStatus::Rejected.is_terminal());
    }

    #[test]
    fn test_definition_ids() {
        let activate = MutationRequest::Activate {
            version_id: VersionId::new(),
        };
        assert_eq!(activate.definition_id(Some(EntityType::Fee)), "fee.activate");

        let update = MutationRequest::Update {
            version_id: VersionId::new(),
            patch: FieldPatch::new(),
        };
        assert_eq!(
            update.definition_id(Some(EntityType::GlMapping)),
            "gl_mapping.update"
        );

        let withdrawal = MutationRequest::Withdrawal {
            account: "ACC-1".into(),
            amount: Money::new(dec!(100), Currency::Usd),
            reference: None,
        };
        assert_eq!(withdrawal.definition_id(None), "withdrawal.request");
    }

    #[test]
    fn test_mutation_request_wire_format() {
        let request: MutationRequest = serde_json::from_value(json!({
            "action": "transfer",
            "from_account": "ACC-1",
            "to_account": "ACC-2",
            "amount": {"amount": "2500.00", "currency": "EUR"}
        }))
        .unwrap();

        assert_eq!(request.amount().map(|m| m.amount), Some(dec!(2500.00)));
        assert!(request.version_id().is_none());
    }
}
