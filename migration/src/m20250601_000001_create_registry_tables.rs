use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_query::Expr;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Owners keyed by national id; deactivation is a flag, never a delete.
        manager
            .create_table(
                Table::create()
                    .table(Owners::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Owners::Cedula)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Owners::Name).string_len(128).not_null())
                    .col(ColumnDef::new(Owners::Phone).string_len(32).null())
                    .col(
                        ColumnDef::new(Owners::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Owners::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Owners::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Phones are optional; non-null phones may not repeat.
        manager
            .create_index(
                Index::create()
                    .name("idx_owners_phone")
                    .table(Owners::Table)
                    .col(Owners::Phone)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Units::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Units::UnitId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Units::Name).string_len(64).not_null())
                    .col(
                        ColumnDef::new(Units::Coefficient)
                            .decimal_len(12, 6)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Units::OwnerCedula).string_len(32).null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_units_owner")
                            .from(Units::Table, Units::OwnerCedula)
                            .to(Owners::Table, Owners::Cedula)
                            .on_delete(ForeignKeyAction::Restrict)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_units_name")
                    .table(Units::Table)
                    .col(Units::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_units_owner")
                    .table(Units::Table)
                    .col(Units::OwnerCedula)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Units::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Owners::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Owners {
    Table,
    Cedula,
    Name,
    Phone,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Units {
    Table,
    UnitId,
    Name,
    Coefficient,
    OwnerCedula,
}
