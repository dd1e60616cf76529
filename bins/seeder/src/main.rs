//! Database seeder for Vaultline development and testing.
//!
//! Seeds one DRAFT lineage per configuration entity type so the maker-checker
//! flow can be exercised against a fresh database.
//!
//! Usage: cargo run --bin seeder

use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;
use vaultline_core::audit::{AuditEvent, AuditLog};
use vaultline_core::repository::VersionRepository;
use vaultline_core::versioning::{
    BusinessRule, CapitalizationFrequency, ConfigPayload, FeeMethod, FeeSchedule, GlMapping,
    InterestBasis, ProductTerms, RuleAction, RuleCondition, VersionStatus, VersionedEntity,
};
use vaultline_db::{PgAuditRepository, PgVersionRepository};
use vaultline_shared::types::{ActorId, Currency, EntityId, Role, VersionId};

/// Savings product lineage (consistent for all seeds)
const PRODUCT_ID: u128 = 0x0000_0000_0000_0000_0000_0000_0000_0101;
/// ATM fee lineage
const FEE_ID: u128 = 0x0000_0000_0000_0000_0000_0000_0000_0102;
/// Large-withdrawal rule lineage
const RULE_ID: u128 = 0x0000_0000_0000_0000_0000_0000_0000_0103;
/// ATM fee GL mapping lineage
const GL_MAPPING_ID: u128 = 0x0000_0000_0000_0000_0000_0000_0000_0104;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

    println!("Connecting to database...");
    let db = vaultline_db::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    let repo = PgVersionRepository::new(db.clone());
    let audit = AuditLog::new(Arc::new(PgAuditRepository::new(db)));
    let maker = ActorId::new("seeder").context("seeder actor id")?;

    for (label, entity_id, payload) in seeds()? {
        println!("Seeding {label}...");
        seed_draft(&repo, &audit, &maker, entity_id, payload).await?;
    }

    println!("Seeding complete!");
    Ok(())
}

fn seeds() -> anyhow::Result<Vec<(&'static str, EntityId, ConfigPayload)>> {
    Ok(vec![
        (
            "savings product",
            EntityId::from_uuid(Uuid::from_u128(PRODUCT_ID)),
            ConfigPayload::Product(ProductTerms {
                code: "SAV-STD".to_string(),
                name: "Standard Savings".to_string(),
                description: Some("Retail savings account".to_string()),
                currency: Currency::Usd,
                interest_basis: InterestBasis::Act365,
                interest_rate: Decimal::new(225, 2),
                capitalization: CapitalizationFrequency::Monthly,
            }),
        ),
        (
            "ATM fee",
            EntityId::from_uuid(Uuid::from_u128(FEE_ID)),
            ConfigPayload::Fee(FeeSchedule {
                code: "ATM-INTL".to_string(),
                name: "International ATM withdrawal".to_string(),
                description: None,
                method: FeeMethod::Flat,
                value: Decimal::new(350, 2),
                currency: Currency::Usd,
                trigger_event: "atm.withdrawal".to_string(),
            }),
        ),
        (
            "large withdrawal rule",
            EntityId::from_uuid(Uuid::from_u128(RULE_ID)),
            ConfigPayload::Rule(BusinessRule {
                code: "WDL-LARGE".to_string(),
                name: "Large cash withdrawal".to_string(),
                description: None,
                priority: 10,
                condition: RuleCondition::All {
                    conditions: vec![
                        RuleCondition::TransactionTypeIs {
                            transaction_type: "withdrawal".to_string(),
                        },
                        RuleCondition::AmountAbove {
                            amount: Decimal::from(10_000),
                        },
                    ],
                },
                action: RuleAction::RequireApproval {
                    role: Role::new("SUPERVISOR").context("seed role")?,
                },
            }),
        ),
        (
            "ATM fee GL mapping",
            EntityId::from_uuid(Uuid::from_u128(GL_MAPPING_ID)),
            ConfigPayload::GlMapping(GlMapping {
                event_type: "atm.withdrawal".to_string(),
                debit_account: "1000-CASH".to_string(),
                credit_account: "4100-FEE-INCOME".to_string(),
                description: None,
            }),
        ),
    ])
}

/// Inserts version 1 of `entity_id` as a DRAFT unless the lineage exists.
async fn seed_draft(
    repo: &PgVersionRepository,
    audit: &AuditLog,
    maker: &ActorId,
    entity_id: EntityId,
    payload: ConfigPayload,
) -> anyhow::Result<()> {
    if !repo.lineage(entity_id).await?.is_empty() {
        println!("  Lineage {entity_id} already exists, skipping...");
        return Ok(());
    }

    let now = Utc::now();
    let draft = VersionedEntity {
        id: VersionId::new(),
        entity_id,
        version: 1,
        status: VersionStatus::Draft,
        parent_id: None,
        payload,
        created_by: maker.clone(),
        created_at: now,
        updated_at: now,
    };
    repo.insert(&draft).await?;
    audit.record(maker, AuditEvent::lifecycle(&draft, None)).await;

    println!("  Created {} v1 ({})", draft.entity_type(), draft.id);
    Ok(())
}
