//! Create the maintenance key/value table.
//!
//! Holds at most two rows: `flag` (maintenance on) and `ips` (allow-list).
//! The table name honours `CLUSTER_MAINTENANCE_TABLE_PREFIX`.
use sea_orm_migration::prelude::*;

/// Same variable the `configs` crate reads for the runtime table name.
pub const ENV_TABLE_PREFIX: &str = "CLUSTER_MAINTENANCE_TABLE_PREFIX";

#[derive(DeriveMigrationName)]
pub struct Migration;

fn table_from_env() -> String {
    let prefix = std::env::var(ENV_TABLE_PREFIX).unwrap_or_default();
    format!("{}maintenance_mode", prefix.trim())
}

/// `CREATE TABLE IF NOT EXISTS <table> (flag_key PK, flag_value TEXT)`.
pub fn maintenance_table(table: &str) -> TableCreateStatement {
    Table::create()
        .table(Alias::new(table))
        .if_not_exists()
        .col(
            ColumnDef::new(MaintenanceMode::FlagKey)
                .string_len(64)
                .not_null()
                .primary_key(),
        )
        .col(ColumnDef::new(MaintenanceMode::FlagValue).text().not_null())
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.create_table(maintenance_table(&table_from_env())).await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Alias::new(table_from_env())).to_owned()).await
    }
}

#[derive(DeriveIden)]
enum MaintenanceMode { FlagKey, FlagValue }
