use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Questions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Questions::QuestionId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Questions::AssemblyId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Questions::Text).string_len(512).not_null())
                    .col(ColumnDef::new(Questions::State).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Questions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Questions::ActivatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Questions::ClosedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_questions_assembly")
                            .from(Questions::Table, Questions::AssemblyId)
                            .to(Assemblies::Table, Assemblies::AssemblyId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Lookup of the single active question within an assembly.
        manager
            .create_index(
                Index::create()
                    .name("idx_questions_assembly_state")
                    .table(Questions::Table)
                    .col(Questions::AssemblyId)
                    .col(Questions::State)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(QuestionOptions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(QuestionOptions::OptionId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(QuestionOptions::QuestionId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionOptions::Position)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(QuestionOptions::Label)
                            .string_len(128)
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_question_options_question")
                            .from(QuestionOptions::Table, QuestionOptions::QuestionId)
                            .to(Questions::Table, Questions::QuestionId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_options_position")
                    .table(QuestionOptions::Table)
                    .col(QuestionOptions::QuestionId)
                    .col(QuestionOptions::Position)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_question_options_label")
                    .table(QuestionOptions::Table)
                    .col(QuestionOptions::QuestionId)
                    .col(QuestionOptions::Label)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // One ledger row per unit per question. Rows are seeded at activation
        // with a null executor and a null option; a null option reads as the
        // reserved abstention bucket.
        manager
            .create_table(
                Table::create()
                    .table(Votes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Votes::VoteId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Votes::QuestionId).big_integer().not_null())
                    .col(ColumnDef::new(Votes::UnitId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Votes::ExecutorCedula)
                            .string_len(32)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Votes::OptionLabel)
                            .string_len(128)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Votes::RecordedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_question")
                            .from(Votes::Table, Votes::QuestionId)
                            .to(Questions::Table, Questions::QuestionId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_votes_unit")
                            .from(Votes::Table, Votes::UnitId)
                            .to(Units::Table, Units::UnitId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_votes_question_unit")
                    .table(Votes::Table)
                    .col(Votes::QuestionId)
                    .col(Votes::UnitId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Votes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(QuestionOptions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Questions::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Questions {
    Table,
    QuestionId,
    AssemblyId,
    Text,
    State,
    CreatedAt,
    ActivatedAt,
    ClosedAt,
}

#[derive(DeriveIden)]
enum QuestionOptions {
    Table,
    OptionId,
    QuestionId,
    Position,
    Label,
}

#[derive(DeriveIden)]
enum Votes {
    Table,
    VoteId,
    QuestionId,
    UnitId,
    ExecutorCedula,
    OptionLabel,
    RecordedAt,
}

#[derive(DeriveIden)]
enum Assemblies {
    Table,
    AssemblyId,
}

#[derive(DeriveIden)]
enum Units {
    Table,
    UnitId,
}
