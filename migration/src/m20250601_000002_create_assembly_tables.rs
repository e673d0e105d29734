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
                    .table(Assemblies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Assemblies::AssemblyId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Assemblies::HeldOn).date().not_null())
                    .col(
                        ColumnDef::new(Assemblies::Description)
                            .string_len(256)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Assemblies::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // One delegation per unit per assembly.
        manager
            .create_table(
                Table::create()
                    .table(Proxies::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Proxies::ProxyId)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Proxies::AssemblyId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Proxies::UnitId).big_integer().not_null())
                    .col(
                        ColumnDef::new(Proxies::ProxyCedula)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Proxies::ProxyName)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Proxies::GrantedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proxies_assembly")
                            .from(Proxies::Table, Proxies::AssemblyId)
                            .to(Assemblies::Table, Assemblies::AssemblyId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_proxies_unit")
                            .from(Proxies::Table, Proxies::UnitId)
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
                    .name("idx_proxies_assembly_unit")
                    .table(Proxies::Table)
                    .col(Proxies::AssemblyId)
                    .col(Proxies::UnitId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Roster rows are keyed by person within an assembly; proxies who are
        // not registered owners still get a row, so there is no cedula FK.
        manager
            .create_table(
                Table::create()
                    .table(Attendance::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Attendance::AssemblyId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Attendance::Cedula)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Attendance::Name).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Attendance::AttendeeKind)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Attendance::Present)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Attendance::MarkedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .primary_key(
                        Index::create()
                            .name("pk_attendance")
                            .col(Attendance::AssemblyId)
                            .col(Attendance::Cedula),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_attendance_assembly")
                            .from(Attendance::Table, Attendance::AssemblyId)
                            .to(Assemblies::Table, Assemblies::AssemblyId)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Attendance::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Proxies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Assemblies::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Assemblies {
    Table,
    AssemblyId,
    HeldOn,
    Description,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Proxies {
    Table,
    ProxyId,
    AssemblyId,
    UnitId,
    ProxyCedula,
    ProxyName,
    GrantedAt,
}

#[derive(DeriveIden)]
enum Attendance {
    Table,
    AssemblyId,
    Cedula,
    Name,
    AttendeeKind,
    Present,
    MarkedAt,
}

#[derive(DeriveIden)]
enum Units {
    Table,
    UnitId,
}
