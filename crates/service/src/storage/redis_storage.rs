use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use configs::{AppConfig, RedisSettings};
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{with_timeout, MaintenanceStorage};
use crate::errors::StorageError;

/// Flag key; namespaced so it cannot collide with cache entries in the same db.
pub const FLAG_KEY: &str = "maintenance:flag";
pub const IPS_KEY: &str = "maintenance:ips";

/// Redis-backed maintenance state.
///
/// Connects lazily on first use and shares one multiplexed connection between
/// callers. A connection that drops or stalls is discarded, and the next call
/// connects again. A single operation never retries.
pub struct RedisStorage {
    settings: RedisSettings,
    connect_timeout: Duration,
    operation_timeout: Duration,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisStorage {
    pub fn new(settings: RedisSettings, connect_timeout: Duration, operation_timeout: Duration) -> Self {
        Self { settings, connect_timeout, operation_timeout, connection: Mutex::new(None) }
    }

    /// Build from deployment config; environment variables take precedence.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            RedisSettings::from_config(cfg),
            cfg.maintenance.connect_timeout(),
            cfg.maintenance.operation_timeout(),
        )
    }

    pub fn settings(&self) -> &RedisSettings {
        &self.settings
    }

    /// Shared connection handle. Concurrent first callers wait on the same
    /// connect attempt; a failed attempt leaves the slot empty.
    async fn connection(&self) -> Result<MultiplexedConnection, StorageError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }
        let client = redis::Client::open(self.settings.url())
            .map_err(|e| StorageError::Connection(format!("redis connection failed: {e}")))?;
        let conn = with_timeout("connect", self.connect_timeout, async {
            client
                .get_multiplexed_async_connection()
                .await
                .map_err(|e| StorageError::Connection(format!("redis connection failed: {e}")))
        })
        .await?;
        info!(
            event = "maintenance_redis_connected",
            host = %self.settings.host,
            port = self.settings.port,
            db = self.settings.db,
            "connected to redis maintenance backend"
        );
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn discard_connection(&self, operation: &'static str, reason: String) {
        if self.connection.lock().await.take().is_some() {
            warn!(
                event = "maintenance_redis_connection_lost",
                operation,
                error = %reason,
                "dropping redis connection; next call reconnects"
            );
        }
    }

    /// Run one command on the shared connection within the operation timeout.
    async fn run<T, F, Fut>(&self, operation: &'static str, command: F) -> Result<T, StorageError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut + Send,
        Fut: Future<Output = RedisResult<T>> + Send,
        T: Send,
    {
        let conn = self.connection().await?;
        let res = with_timeout(operation, self.operation_timeout, async move {
            Ok::<_, StorageError>(command(conn).await)
        })
        .await;
        match res {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if connection_lost(&e) {
                    self.discard_connection(operation, e.to_string()).await;
                }
                Err(StorageError::Command(e.to_string()))
            }
            Err(timeout) => {
                self.discard_connection(operation, timeout.to_string()).await;
                Err(timeout)
            }
        }
    }
}

fn connection_lost(e: &RedisError) -> bool {
    e.is_io_error() || e.is_connection_dropped()
}

#[async_trait]
impl MaintenanceStorage for RedisStorage {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn has_flag(&self) -> Result<bool, StorageError> {
        self.run("has_flag", |mut conn| async move { conn.exists::<_, bool>(FLAG_KEY).await }).await
    }

    async fn set_flag(&self, enabled: bool) -> Result<(), StorageError> {
        self.run("set_flag", move |mut conn| async move {
            if enabled {
                conn.set::<_, _, ()>(FLAG_KEY, "1").await
            } else {
                conn.del::<_, ()>(FLAG_KEY).await
            }
        })
        .await?;
        debug!(enabled, "redis maintenance flag written");
        Ok(())
    }

    async fn get_addresses(&self) -> Result<String, StorageError> {
        let value = self
            .run("get_addresses", |mut conn| async move { conn.get::<_, Option<Vec<u8>>>(IPS_KEY).await })
            .await?;
        match value {
            None => Ok(String::new()),
            Some(bytes) => String::from_utf8(bytes)
                .map(|s| s.trim().to_string())
                .map_err(|e| StorageError::Malformed { key: IPS_KEY, detail: e.to_string() }),
        }
    }

    async fn set_addresses(&self, addresses: &str) -> Result<(), StorageError> {
        let addresses = addresses.to_string();
        self.run("set_addresses", move |mut conn| async move {
            if addresses.is_empty() {
                conn.del::<_, ()>(IPS_KEY).await
            } else {
                conn.set::<_, _, ()>(IPS_KEY, addresses).await
            }
        })
        .await
    }
}
