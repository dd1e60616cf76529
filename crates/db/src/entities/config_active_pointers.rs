//! `SeaORM` Entity for config_active_pointers table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "config_active_pointers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entity_id: Uuid,
    #[sea_orm(unique)]
    pub version_id: Uuid,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::config_versions::Entity",
        from = "Column::VersionId",
        to = "super::config_versions::Column::Id"
    )]
    ConfigVersions,
}

impl Related<super::config_versions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ConfigVersions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
