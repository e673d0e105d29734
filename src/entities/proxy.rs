use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A delegation of one unit's vote to a named person for one assembly.
/// The holder does not have to be a registered owner.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "proxies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub proxy_id: i64,
    pub assembly_id: i64,
    pub unit_id: i64,
    pub proxy_cedula: String,
    pub proxy_name: String,
    pub granted_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assembly::Entity",
        from = "Column::AssemblyId",
        to = "super::assembly::Column::AssemblyId"
    )]
    Assembly,
    #[sea_orm(
        belongs_to = "super::unit::Entity",
        from = "Column::UnitId",
        to = "super::unit::Column::UnitId"
    )]
    Unit,
}

impl Related<super::assembly::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assembly.def()
    }
}

impl Related<super::unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Unit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
