//! Migrator for the maintenance gate's relational backend.
pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_maintenance_mode;

pub use m20240101_000001_create_maintenance_mode::{maintenance_table, ENV_TABLE_PREFIX};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240101_000001_create_maintenance_mode::Migration)]
    }
}
