use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One ledger row per unit per question, seeded at activation. A null
/// `option_label` is the reserved abstention bucket; a null `executor_cedula`
/// means nobody has touched the row since seeding.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "votes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub vote_id: i64,
    pub question_id: i64,
    pub unit_id: i64,
    pub executor_cedula: Option<String>,
    pub option_label: Option<String>,
    pub recorded_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::question::Entity",
        from = "Column::QuestionId",
        to = "super::question::Column::QuestionId"
    )]
    Question,
    #[sea_orm(
        belongs_to = "super::unit::Entity",
        from = "Column::UnitId",
        to = "super::unit::Column::UnitId"
    )]
    Unit,
}

impl Related<super::question::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Question.def()
    }
}

impl Related<super::unit::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Unit.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
