//! Approval policy resolution.
//!
//! Decides whether a mutation needs a checker and which role that checker
//! must hold. Pure and immutable after construction, so one resolver is
//! shared by every request without locking.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use vaultline_shared::config::PolicyConfig;
use vaultline_shared::types::{Currency, Money, Role};

use crate::versioning::types::{EntityType, VersionStatus, VersionedEntity};
use crate::workflow::types::MutationRequest;

/// Approval requirement for a gated action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Always true for a returned policy.
    pub requires_approval: bool,
    /// Role the checker must hold (or subsume).
    pub role_required: Role,
    /// Threshold the amount exceeded, for monetary actions.
    pub threshold: Option<Decimal>,
}

impl Policy {
    fn gate(role_required: Role, threshold: Option<Decimal>) -> Self {
        Self {
            requires_approval: true,
            role_required,
            threshold,
        }
    }
}

/// Invalid policy configuration.
#[derive(Debug, Clone, Error)]
pub enum PolicyConfigError {
    /// Unknown entity type key.
    #[error("Unknown entity type '{0}' in activation_roles")]
    UnknownEntityType(String),

    /// Unknown ISO currency code.
    #[error("Unknown currency '{0}'")]
    UnknownCurrency(String),

    /// Blank role name.
    #[error("Blank role name for '{0}'")]
    BlankRole(String),

    /// Negative threshold or limit.
    #[error("Negative amount configured for '{0}'")]
    NegativeAmount(String),
}

/// Resolves maker-checker policy for mutation requests.
#[derive(Debug, Clone)]
pub struct ApprovalPolicyResolver {
    activation_roles: HashMap<EntityType, Role>,
    escalation_role: Role,
    withdrawal_thresholds: HashMap<Currency, Decimal>,
    transfer_thresholds: HashMap<Currency, Decimal>,
    limits_currency: Currency,
    /// Ascending by limit, then role name.
    role_limits: Vec<(Decimal, Role)>,
}

fn parse_role(key: &str, name: &str) -> Result<Role, PolicyConfigError> {
    Role::new(name).ok_or_else(|| PolicyConfigError::BlankRole(key.to_string()))
}

fn parse_currency(code: &str) -> Result<Currency, PolicyConfigError> {
    code.parse()
        .map_err(|_| PolicyConfigError::UnknownCurrency(code.to_string()))
}

fn non_negative(key: &str, amount: Decimal) -> Result<Decimal, PolicyConfigError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(PolicyConfigError::NegativeAmount(key.to_string()));
    }
    Ok(amount)
}

fn parse_thresholds(
    raw: &HashMap<String, Decimal>,
) -> Result<HashMap<Currency, Decimal>, PolicyConfigError> {
    raw.iter()
        .map(|(code, amount)| Ok((parse_currency(code)?, non_negative(code, *amount)?)))
        .collect()
}

impl ApprovalPolicyResolver {
    /// Builds a resolver from configuration.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, PolicyConfigError> {
        let activation_roles = config
            .activation_roles
            .iter()
            .map(|(key, role)| {
                let entity_type = EntityType::parse(key)
                    .ok_or_else(|| PolicyConfigError::UnknownEntityType(key.clone()))?;
                Ok((entity_type, parse_role(key, role)?))
            })
            .collect::<Result<HashMap<_, _>, PolicyConfigError>>()?;

        let mut role_limits = config
            .role_limits
            .iter()
            .map(|(role, limit)| Ok((non_negative(role, *limit)?, parse_role(role, role)?)))
            .collect::<Result<Vec<_>, PolicyConfigError>>()?;
        role_limits.sort();

        Ok(Self {
            activation_roles,
            escalation_role: parse_role("escalation_role", &config.escalation_role)?,
            withdrawal_thresholds: parse_thresholds(&config.withdrawal_thresholds)?,
            transfer_thresholds: parse_thresholds(&config.transfer_thresholds)?,
            limits_currency: parse_currency(&config.limits_currency)?,
            role_limits,
        })
    }

    /// Role required to approve changes to `entity_type`.
    #[must_use]
    pub fn role_for(&self, entity_type: EntityType) -> &Role {
        self.activation_roles
            .get(&entity_type)
            .unwrap_or(&self.escalation_role)
    }

    /// Role required to approve a monetary amount above its threshold.
    ///
    /// The role with the smallest limit at or above the amount; the
    /// escalation role when no limit covers it or the amount is not in the
    /// limits currency.
    #[must_use]
    pub fn role_for_amount(&self, amount: &Money) -> &Role {
        if amount.currency != self.limits_currency {
            return &self.escalation_role;
        }
        self.role_limits
            .iter()
            .find(|(limit, _)| *limit >= amount.amount)
            .map_or(&self.escalation_role, |(_, role)| role)
    }

    /// Returns the approval policy for `request`, or `None` when it may be
    /// applied immediately.
    ///
    /// `target` is the version a configuration request acts on. A
    /// configuration request without a target escalates.
    #[must_use]
    pub fn resolve(
        &self,
        request: &MutationRequest,
        target: Option<&VersionedEntity>,
    ) -> Option<Policy> {
        match request {
            MutationRequest::Activate { .. } => Some(self.config_gate(target)),
            MutationRequest::Update { .. } | MutationRequest::Archive { .. } => match target {
                Some(entity) if entity.status != VersionStatus::Active => None,
                _ => Some(self.config_gate(target)),
            },
            MutationRequest::Withdrawal { amount, .. } => {
                self.monetary_gate(&self.withdrawal_thresholds, amount)
            }
            MutationRequest::Transfer { amount, .. } => {
                self.monetary_gate(&self.transfer_thresholds, amount)
            }
        }
    }

    fn config_gate(&self, target: Option<&VersionedEntity>) -> Policy {
        let role = target.map_or(&self.escalation_role, |e| self.role_for(e.entity_type()));
        Policy::gate(role.clone(), None)
    }

    fn monetary_gate(
        &self,
        thresholds: &HashMap<Currency, Decimal>,
        amount: &Money,
    ) -> Option<Policy> {
        match thresholds.get(&amount.currency) {
            None => Some(Policy::gate(self.escalation_role.clone(), None)),
            Some(threshold) if amount.amount > *threshold => Some(Policy::gate(
                self.role_for_amount(amount).clone(),
                Some(*threshold),
            )),
            Some(_) => None,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::HashMap;

    use rust_decimal_macros::dec;
    use vaultline_shared::config::PolicyConfig;

    /// USD withdrawals above 10k and transfers above 50k are gated;
    /// supervisors approve up to 50k, the CFO up to 1M.
    pub(crate) fn policy_config() -> PolicyConfig {
        PolicyConfig {
            withdrawal_thresholds: HashMap::from([("usd".to_string(), dec!(10000))]),
            transfer_thresholds: HashMap::from([("USD".to_string(), dec!(50000))]),
            role_limits: HashMap::from([
                ("supervisor".to_string(), dec!(50000)),
                ("cfo".to_string(), dec!(1000000)),
            ]),
            ..PolicyConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::policy_config;
    use super::*;
    use crate::versioning::lifecycle::fixtures::fee_version;
    use crate::versioning::payload::FieldPatch;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use vaultline_shared::types::VersionId;

    fn resolver() -> ApprovalPolicyResolver {
        ApprovalPolicyResolver::from_config(&policy_config()).unwrap()
    }

    fn withdrawal(amount: Decimal, currency: Currency) -> MutationRequest {
        MutationRequest::Withdrawal {
            account: "ACC-1".into(),
            amount: Money::new(amount, currency),
            reference: None,
        }
    }

    #[test]
    fn test_activation_always_gated_by_type_role() {
        let draft = fee_version(VersionStatus::Draft);
        let request = MutationRequest::Activate {
            version_id: draft.id,
        };
        let policy = resolver().resolve(&request, Some(&draft)).unwrap();
        assert!(policy.requires_approval);
        assert_eq!(policy.role_required.as_str(), "FINANCE_MANAGER");
        assert!(policy.threshold.is_none());
    }

    #[rstest]
    #[case(VersionStatus::Draft, false)]
    #[case(VersionStatus::Active, true)]
    fn test_update_gated_only_when_active(#[case] status: VersionStatus, #[case] gated: bool) {
        let entity = fee_version(status);
        let request = MutationRequest::Update {
            version_id: entity.id,
            patch: FieldPatch::new(),
        };
        assert_eq!(resolver().resolve(&request, Some(&entity)).is_some(), gated);

        let archive = MutationRequest::Archive {
            version_id: entity.id,
        };
        assert_eq!(resolver().resolve(&archive, Some(&entity)).is_some(), gated);
    }

    #[test]
    fn test_config_request_without_target_escalates() {
        let request = MutationRequest::Archive {
            version_id: VersionId::new(),
        };
        let policy = resolver().resolve(&request, None).unwrap();
        assert_eq!(policy.role_required.as_str(), "ADMIN");
    }

    #[rstest]
    #[case(dec!(9999.99), None)]
    #[case(dec!(10000), None)]
    #[case(dec!(10000.01), Some("SUPERVISOR"))]
    #[case(dec!(50000), Some("SUPERVISOR"))]
    #[case(dec!(50000.01), Some("CFO"))]
    #[case(dec!(1000000), Some("CFO"))]
    #[case(dec!(1000000.01), Some("ADMIN"))]
    fn test_withdrawal_thresholds(#[case] amount: Decimal, #[case] role: Option<&str>) {
        let policy = resolver().resolve(&withdrawal(amount, Currency::Usd), None);
        assert_eq!(policy.as_ref().map(|p| p.role_required.as_str()), role);
        if let Some(policy) = policy {
            assert_eq!(policy.threshold, Some(dec!(10000)));
        }
    }

    #[test]
    fn test_unconfigured_currency_escalates() {
        let policy = resolver()
            .resolve(&withdrawal(dec!(1), Currency::Jpy), None)
            .unwrap();
        assert_eq!(policy.role_required.as_str(), "ADMIN");
        assert!(policy.threshold.is_none());
    }

    #[test]
    fn test_transfer_uses_its_own_threshold() {
        let request = MutationRequest::Transfer {
            from_account: "A".into(),
            to_account: "B".into(),
            amount: Money::new(dec!(20000), Currency::Usd),
            reference: None,
        };
        assert!(resolver().resolve(&request, None).is_none());
    }

    #[test]
    fn test_bad_config_rejected() {
        let mut config = policy_config();
        config
            .withdrawal_thresholds
            .insert("XYZ".into(), dec!(1));
        assert!(matches!(
            ApprovalPolicyResolver::from_config(&config),
            Err(PolicyConfigError::UnknownCurrency(_))
        ));

        let mut config = policy_config();
        config
            .activation_roles
            .insert("ledger".into(), "CFO".into());
        assert!(matches!(
            ApprovalPolicyResolver::from_config(&config),
            Err(PolicyConfigError::UnknownEntityType(_))
        ));
    }
}
