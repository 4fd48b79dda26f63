//! Accessors for the maintenance key/value table.
//!
//! The table name carries an optional deployment prefix, so statements are
//! built with `sea_query` against a runtime table name.
use sea_orm::sea_query::{Alias, Expr, OnConflict, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DeriveIden};

use crate::errors::ModelError;

/// Unprefixed table name.
pub const BASE_TABLE: &str = "maintenance_mode";
/// Row key holding the maintenance flag.
pub const FLAG_KEY: &str = "flag";
/// Row key holding the comma-joined allow-list.
pub const IPS_KEY: &str = "ips";

#[derive(DeriveIden)]
enum Column {
    FlagKey,
    FlagValue,
}

/// `prefix` + `maintenance_mode`.
pub fn table_name(prefix: &str) -> String {
    format!("{prefix}{BASE_TABLE}")
}

/// Read the value stored under `key`, if the row exists.
pub async fn get_value<C: ConnectionTrait>(db: &C, table: &str, key: &str) -> Result<Option<String>, ModelError> {
    let stmt = Query::select()
        .column(Column::FlagValue)
        .from(Alias::new(table))
        .and_where(Expr::col(Column::FlagKey).eq(key))
        .to_owned();
    let row = db.query_one(db.get_database_backend().build(&stmt)).await?;
    Ok(row.map(|r| r.try_get::<String>("", "flag_value")).transpose()?)
}

/// Insert or overwrite the row for `key` in a single statement.
pub async fn upsert_value<C: ConnectionTrait>(db: &C, table: &str, key: &str, value: &str) -> Result<(), ModelError> {
    if key.trim().is_empty() {
        return Err(ModelError::Validation("flag key required".into()));
    }
    let stmt = Query::insert()
        .into_table(Alias::new(table))
        .columns([Column::FlagKey, Column::FlagValue])
        .values([SimpleExpr::from(key), SimpleExpr::from(value)])
        .map_err(|e| ModelError::Validation(e.to_string()))?
        .on_conflict(OnConflict::column(Column::FlagKey).update_column(Column::FlagValue).to_owned())
        .to_owned();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}

/// Delete the row for `key`; deleting a missing row is not an error.
pub async fn delete_value<C: ConnectionTrait>(db: &C, table: &str, key: &str) -> Result<(), ModelError> {
    let stmt = Query::delete()
        .from_table(Alias::new(table))
        .and_where(Expr::col(Column::FlagKey).eq(key))
        .to_owned();
    db.execute(db.get_database_backend().build(&stmt)).await?;
    Ok(())
}
