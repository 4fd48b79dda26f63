use std::time::Duration;

use async_trait::async_trait;
use configs::{AppConfig, DatabaseConfig};
use models::maintenance_mode::{self, FLAG_KEY, IPS_KEY};
use sea_orm::DatabaseConnection;
use tokio::sync::OnceCell;
use tracing::info;

use super::{with_timeout, MaintenanceStorage};
use crate::errors::StorageError;

/// Relational maintenance state in the `<prefix>maintenance_mode` key/value table.
///
/// Each field is written by a single upsert or delete, so no transaction is
/// needed. Reuses the application's connection when one is supplied,
/// otherwise connects lazily from [`DatabaseConfig`].
pub struct DatabaseStorage {
    config: DatabaseConfig,
    table: String,
    connect_timeout: Duration,
    operation_timeout: Duration,
    connection: OnceCell<DatabaseConnection>,
}

impl DatabaseStorage {
    pub fn new(config: DatabaseConfig, table: String, connect_timeout: Duration, operation_timeout: Duration) -> Self {
        Self { config, table, connect_timeout, operation_timeout, connection: OnceCell::new() }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.database.clone(),
            maintenance_mode::table_name(&cfg.maintenance.table_prefix),
            cfg.maintenance.connect_timeout(),
            cfg.maintenance.operation_timeout(),
        )
    }

    /// Use an existing connection pool (and schema) owned by the application.
    pub fn with_connection(db: DatabaseConnection, table: String, operation_timeout: Duration) -> Self {
        Self {
            config: DatabaseConfig::default(),
            table,
            connect_timeout: operation_timeout,
            operation_timeout,
            connection: OnceCell::from(db),
        }
    }

    async fn connection(&self) -> Result<&DatabaseConnection, StorageError> {
        self.connection
            .get_or_try_init(|| async {
                let db = with_timeout("connect", self.connect_timeout, async {
                    models::db::connect_with_config(&self.config)
                        .await
                        .map_err(|e| StorageError::Connection(format!("database connection failed: {e}")))
                })
                .await?;
                info!(event = "maintenance_database_connected", "connected to database maintenance backend");
                Ok::<_, StorageError>(db)
            })
            .await
    }

    async fn read(&self, operation: &'static str, key: &'static str) -> Result<Option<String>, StorageError> {
        let db = self.connection().await?;
        with_timeout(operation, self.operation_timeout, async {
            maintenance_mode::get_value(db, &self.table, key).await.map_err(StorageError::from)
        })
        .await
    }

    async fn upsert(&self, operation: &'static str, key: &'static str, value: &str) -> Result<(), StorageError> {
        let db = self.connection().await?;
        with_timeout(operation, self.operation_timeout, async {
            maintenance_mode::upsert_value(db, &self.table, key, value).await.map_err(StorageError::from)
        })
        .await
    }

    async fn delete(&self, operation: &'static str, key: &'static str) -> Result<(), StorageError> {
        let db = self.connection().await?;
        with_timeout(operation, self.operation_timeout, async {
            maintenance_mode::delete_value(db, &self.table, key).await.map_err(StorageError::from)
        })
        .await
    }
}

#[async_trait]
impl MaintenanceStorage for DatabaseStorage {
    fn name(&self) -> &'static str {
        "database"
    }

    async fn has_flag(&self) -> Result<bool, StorageError> {
        let value = self.read("has_flag", FLAG_KEY).await?;
        Ok(matches!(value.as_deref().map(str::trim), Some(v) if !v.is_empty() && v != "0"))
    }

    async fn set_flag(&self, enabled: bool) -> Result<(), StorageError> {
        if enabled {
            self.upsert("set_flag", FLAG_KEY, "1").await
        } else {
            self.delete("set_flag", FLAG_KEY).await
        }
    }

    async fn get_addresses(&self) -> Result<String, StorageError> {
        let value = self.read("get_addresses", IPS_KEY).await?;
        Ok(value.map(|v| v.trim().to_string()).unwrap_or_default())
    }

    async fn set_addresses(&self, addresses: &str) -> Result<(), StorageError> {
        if addresses.is_empty() {
            self.delete("set_addresses", IPS_KEY).await
        } else {
            self.upsert("set_addresses", IPS_KEY, addresses).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::MigratorTrait;
    use models::maintenance_mode::BASE_TABLE;
    use sea_orm::ConnectionTrait;

    fn sqlite_memory_config() -> DatabaseConfig {
        DatabaseConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout_secs: 2,
            acquire_timeout_secs: 2,
            idle_timeout_secs: 600,
            max_lifetime_secs: 3600,
            sqlx_logging: false,
        }
    }

    async fn migrated_storage() -> anyhow::Result<DatabaseStorage> {
        let db = models::db::connect_with_config(&sqlite_memory_config()).await?;
        migration::Migrator::up(&db, None).await?;
        Ok(DatabaseStorage::with_connection(db, BASE_TABLE.to_string(), Duration::from_secs(2)))
    }

    #[tokio::test]
    async fn flag_set_and_unset_are_idempotent() -> anyhow::Result<()> {
        let storage = migrated_storage().await?;
        assert!(!storage.has_flag().await?);

        storage.set_flag(true).await?;
        storage.set_flag(true).await?;
        assert!(storage.has_flag().await?);

        storage.set_flag(false).await?;
        storage.set_flag(false).await?;
        assert!(!storage.has_flag().await?);
        Ok(())
    }

    #[tokio::test]
    async fn addresses_round_trip_trimmed_and_clear() -> anyhow::Result<()> {
        let storage = migrated_storage().await?;
        assert_eq!(storage.get_addresses().await?, "");

        storage.set_addresses("1.2.3.4,10.0.0.0/8").await?;
        assert_eq!(storage.get_addresses().await?, "1.2.3.4,10.0.0.0/8");

        storage.set_addresses(" 5.6.7.8 \n").await?;
        assert_eq!(storage.get_addresses().await?, "5.6.7.8");

        storage.set_addresses("").await?;
        assert_eq!(storage.get_addresses().await?, "");
        Ok(())
    }

    #[tokio::test]
    async fn flag_and_addresses_are_independent_rows() -> anyhow::Result<()> {
        let storage = migrated_storage().await?;
        storage.set_addresses("1.2.3.4").await?;
        storage.set_flag(true).await?;
        storage.set_flag(false).await?;
        assert_eq!(storage.get_addresses().await?, "1.2.3.4");

        storage.set_flag(true).await?;
        storage.set_addresses("").await?;
        assert!(storage.has_flag().await?);
        Ok(())
    }

    #[tokio::test]
    async fn zero_flag_value_reads_as_off() -> anyhow::Result<()> {
        let storage = migrated_storage().await?;
        let db = storage.connection().await?;
        maintenance_mode::upsert_value(db, BASE_TABLE, FLAG_KEY, "0").await?;
        assert!(!storage.has_flag().await?);
        Ok(())
    }

    #[tokio::test]
    async fn missing_table_is_a_storage_error() -> anyhow::Result<()> {
        let db = models::db::connect_with_config(&sqlite_memory_config()).await?;
        let storage = DatabaseStorage::with_connection(db, BASE_TABLE.to_string(), Duration::from_secs(2));
        assert!(matches!(storage.has_flag().await, Err(StorageError::Command(_))));
        assert!(storage.set_addresses("1.2.3.4").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn unconfigured_database_fails_on_first_use() {
        let storage = DatabaseStorage::new(
            DatabaseConfig::default(),
            BASE_TABLE.to_string(),
            Duration::from_millis(200),
            Duration::from_millis(200),
        );
        assert!(matches!(storage.has_flag().await, Err(StorageError::Connection(_))));
    }

    #[tokio::test]
    async fn table_prefix_from_config_selects_table() -> anyhow::Result<()> {
        let cfg = configs::load_from_str("[maintenance]\ntable_prefix = \"shop_\"\n")?;
        let db = models::db::connect_with_config(&sqlite_memory_config()).await?;
        let create = migration::maintenance_table("shop_maintenance_mode");
        db.execute(db.get_database_backend().build(&create)).await?;

        let storage = DatabaseStorage::from_config(&cfg);
        assert_eq!(storage.table, "shop_maintenance_mode");
        let storage = DatabaseStorage::with_connection(db, storage.table, Duration::from_secs(2));
        storage.set_flag(true).await?;
        storage.set_addresses("1.2.3.4").await?;
        assert!(storage.has_flag().await?);
        assert_eq!(storage.get_addresses().await?, "1.2.3.4");
        Ok(())
    }
}
