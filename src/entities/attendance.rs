use sea_orm::entity::prelude::*;
use sea_orm::prelude::StringLen;
use serde::{Deserialize, Serialize};

/// Whether the person on the roster stands for their own units or holds
/// someone else's delegation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::None)")]
#[serde(rename_all = "lowercase")]
pub enum AttendeeKind {
    #[sea_orm(string_value = "owner")]
    Owner,
    #[sea_orm(string_value = "proxy")]
    Proxy,
}

impl AttendeeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendeeKind::Owner => "owner",
            AttendeeKind::Proxy => "proxy",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attendance")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub assembly_id: i64,
    #[sea_orm(primary_key, auto_increment = false)]
    pub cedula: String,
    pub name: String,
    pub attendee_kind: AttendeeKind,
    pub present: bool,
    pub marked_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::assembly::Entity",
        from = "Column::AssemblyId",
        to = "super::assembly::Column::AssemblyId"
    )]
    Assembly,
}

impl Related<super::assembly::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Assembly.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
