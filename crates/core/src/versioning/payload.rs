//! Typed configuration payloads.
//!
//! Payloads arrive as loosely typed JSON at the boundary and are decoded
//! into one strongly typed struct per entity type. Unknown fields are
//! rejected, required fields must be present, and values are validated
//! before anything is stored.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};
use vaultline_shared::types::{Currency, Role};

use super::error::VersioningError;
use super::types::EntityType;

/// A partial update: field name to new JSON value.
pub type FieldPatch = serde_json::Map<String, Value>;

/// Typed body of a configuration version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity_type", content = "fields", rename_all = "snake_case")]
pub enum ConfigPayload {
    /// Product definition.
    Product(ProductTerms),
    /// Fee schedule.
    Fee(FeeSchedule),
    /// Business rule.
    Rule(BusinessRule),
    /// GL mapping.
    GlMapping(GlMapping),
}

/// Day-count convention used for interest accrual.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InterestBasis {
    /// Actual days / 360.
    Act360,
    /// Actual days / 365.
    Act365,
    /// 30/360.
    Thirty360,
}

/// How often accrued interest is capitalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CapitalizationFrequency {
    /// Every business day.
    Daily,
    /// Month end.
    Monthly,
    /// Quarter end.
    Quarterly,
    /// Year end.
    Annually,
}

/// Product definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProductTerms {
    /// Product code, e.g. `SAV-STD`.
    #[validate(length(min = 1, max = 32), custom(function = "not_blank"))]
    pub code: String,
    /// Display name.
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: String,
    /// Free-text description.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Account currency.
    pub currency: Currency,
    /// Day-count convention.
    pub interest_basis: InterestBasis,
    /// Annual rate in percent.
    #[validate(custom(function = "percentage"))]
    pub interest_rate: Decimal,
    /// Capitalization schedule.
    pub capitalization: CapitalizationFrequency,
}

/// Fee calculation method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FeeMethod {
    /// Fixed amount in the fee currency.
    Flat,
    /// Percentage of the transaction amount.
    Percentage,
}

/// Fee schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct FeeSchedule {
    /// Fee code, e.g. `ATM-INTL`.
    #[validate(length(min = 1, max = 32), custom(function = "not_blank"))]
    pub code: String,
    /// Display name.
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: String,
    /// Free-text description.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Calculation method.
    pub method: FeeMethod,
    /// Amount (FLAT) or percent (PERCENTAGE).
    #[validate(custom(function = "non_negative"))]
    pub value: Decimal,
    /// Fee currency.
    pub currency: Currency,
    /// Ledger event that charges the fee, e.g. `atm.withdrawal`.
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub trigger_event: String,
}

/// Predicate over a transaction evaluated by a business rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// Transaction amount strictly above `amount`.
    AmountAbove {
        /// Bound.
        amount: Decimal,
    },
    /// Transaction amount strictly below `amount`.
    AmountBelow {
        /// Bound.
        amount: Decimal,
    },
    /// Transaction type equals `transaction_type`.
    TransactionTypeIs {
        /// e.g. `withdrawal`.
        transaction_type: String,
    },
    /// Every nested condition holds.
    All {
        /// Nested conditions.
        conditions: Vec<RuleCondition>,
    },
    /// At least one nested condition holds.
    Any {
        /// Nested conditions.
        conditions: Vec<RuleCondition>,
    },
}

/// Effect of a business rule when its condition holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Route the transaction to a checker with this role.
    RequireApproval {
        /// Approving role.
        role: Role,
    },
    /// Refuse the transaction.
    Block {
        /// Reason shown to the operator.
        reason: String,
    },
    /// Charge the fee with this code.
    ApplyFee {
        /// Fee code.
        fee_code: String,
    },
}

/// Business rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct BusinessRule {
    /// Rule code.
    #[validate(length(min = 1, max = 32), custom(function = "not_blank"))]
    pub code: String,
    /// Display name.
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub name: String,
    /// Free-text description.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Evaluation order (lower first).
    pub priority: i16,
    /// When the rule fires.
    pub condition: RuleCondition,
    /// What the rule does.
    pub action: RuleAction,
}

/// GL account mapping for a ledger event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GlMapping {
    /// Ledger event, e.g. `interest.capitalized`.
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub event_type: String,
    /// Account debited.
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub debit_account: String,
    /// Account credited.
    #[validate(length(min = 1, max = 64), custom(function = "not_blank"))]
    pub credit_account: String,
    /// Free-text description.
    #[validate(length(max = 2000))]
    pub description: Option<String>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ValidationError::new("negative"));
    }
    Ok(())
}

fn percentage(value: &Decimal) -> Result<(), ValidationError> {
    non_negative(value)?;
    if *value > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("above_100_percent"));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> VersioningError {
    VersioningError::Validation(message.into())
}

impl RuleCondition {
    fn check(&self) -> Result<(), VersioningError> {
        match self {
            Self::AmountAbove { amount } | Self::AmountBelow { amount } => {
                non_negative(amount).map_err(|_| invalid("condition amount must not be negative"))
            }
            Self::TransactionTypeIs { transaction_type } => not_blank(transaction_type)
                .map_err(|_| invalid("condition transaction_type must not be blank")),
            Self::All { conditions } | Self::Any { conditions } => {
                if conditions.is_empty() {
                    return Err(invalid("composite condition needs at least one member"));
                }
                conditions.iter().try_for_each(Self::check)
            }
        }
    }
}

impl RuleAction {
    fn check(&self) -> Result<(), VersioningError> {
        match self {
            Self::RequireApproval { .. } => Ok(()),
            Self::Block { reason } => {
                not_blank(reason).map_err(|_| invalid("block reason must not be blank"))
            }
            Self::ApplyFee { fee_code } => {
                not_blank(fee_code).map_err(|_| invalid("fee_code must not be blank"))
            }
        }
    }
}

impl ConfigPayload {
    /// Returns the entity type of this payload.
    #[must_use]
    pub const fn entity_type(&self) -> EntityType {
        match self {
            Self::Product(_) => EntityType::Product,
            Self::Fee(_) => EntityType::Fee,
            Self::Rule(_) => EntityType::Rule,
            Self::GlMapping(_) => EntityType::GlMapping,
        }
    }

    /// Decodes and validates a payload from its JSON field object.
    pub fn from_fields(entity_type: EntityType, fields: Value) -> Result<Self, VersioningError> {
        let decoded = match entity_type {
            EntityType::Product => serde_json::from_value(fields).map(Self::Product),
            EntityType::Fee => serde_json::from_value(fields).map(Self::Fee),
            EntityType::Rule => serde_json::from_value(fields).map(Self::Rule),
            EntityType::GlMapping => serde_json::from_value(fields).map(Self::GlMapping),
        }
        .map_err(|e| invalid(format!("{entity_type} payload: {e}")))?;

        decoded.check()?;
        Ok(decoded)
    }

    /// Encodes the payload's fields as a JSON object.
    pub fn fields(&self) -> Result<Value, VersioningError> {
        match self {
            Self::Product(p) => serde_json::to_value(p),
            Self::Fee(f) => serde_json::to_value(f),
            Self::Rule(r) => serde_json::to_value(r),
            Self::GlMapping(g) => serde_json::to_value(g),
        }
        .map_err(|e| invalid(format!("cannot encode payload: {e}")))
    }

    /// Validates field constraints.
    pub fn check(&self) -> Result<(), VersioningError> {
        let result = match self {
            Self::Product(p) => p.validate(),
            Self::Fee(f) => f.validate(),
            Self::Rule(r) => r.validate(),
            Self::GlMapping(g) => g.validate(),
        };
        result.map_err(|e| invalid(format!("{} payload: {e}", self.entity_type())))?;

        match self {
            Self::Fee(f) if f.method == FeeMethod::Percentage => {
                percentage(&f.value).map_err(|_| invalid("percentage fee must be 0..=100"))
            }
            Self::Rule(r) => {
                r.condition.check()?;
                r.action.check()
            }
            Self::GlMapping(g) if g.debit_account.trim() == g.credit_account.trim() => Err(
                invalid("debit_account and credit_account must differ"),
            ),
            _ => Ok(()),
        }
    }

    /// Returns a copy with `patch` applied and re-validated.
    ///
    /// Every key must name an existing field of this entity type.
    pub fn patched(&self, patch: &FieldPatch) -> Result<Self, VersioningError> {
        let entity_type = self.entity_type();
        let Value::Object(mut fields) = self.fields()? else {
            return Err(invalid("payload is not an object"));
        };

        for (key, value) in patch {
            if !fields.contains_key(key) {
                return Err(invalid(format!("unknown {entity_type} field '{key}'")));
            }
            fields.insert(key.clone(), value.clone());
        }

        Self::from_fields(entity_type, Value::Object(fields))
    }
}
