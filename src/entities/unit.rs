use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "units")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub unit_id: i64,
    pub name: String,
    /// Ownership share of the whole building. Exact decimal, never a float.
    #[sea_orm(column_type = "Decimal(Some((12, 6)))")]
    pub coefficient: Decimal,
    pub owner_cedula: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::owner::Entity",
        from = "Column::OwnerCedula",
        to = "super::owner::Column::Cedula"
    )]
    Owner,
    #[sea_orm(has_many = "super::proxy::Entity")]
    Proxy,
    #[sea_orm(has_many = "super::vote::Entity")]
    Vote,
}

impl Related<super::owner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::proxy::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Proxy.def()
    }
}

impl Related<super::vote::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vote.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
