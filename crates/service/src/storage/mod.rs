//! Shared-state storage backends for cluster-wide maintenance mode.
//!
//! Every operation fails with [`StorageError`] when the store is unreachable,
//! times out, or returns malformed data, so the gate can fall back to local
//! state. Implementations never substitute a default on failure.

pub mod database_storage;
pub mod mock;
pub mod redis_storage;
pub mod resolver;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::errors::StorageError;

pub use database_storage::DatabaseStorage;
pub use redis_storage::RedisStorage;
pub use resolver::StorageResolver;

/// Four-operation contract shared by every backend.
#[async_trait]
pub trait MaintenanceStorage: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// True if the maintenance flag is set.
    async fn has_flag(&self) -> Result<bool, StorageError>;

    /// `true` upserts the flag, `false` deletes it. Both are idempotent.
    async fn set_flag(&self, enabled: bool) -> Result<(), StorageError>;

    /// Comma-separated allow-list, trimmed; empty string when absent.
    async fn get_addresses(&self) -> Result<String, StorageError>;

    /// Empty string deletes the list, anything else overwrites it.
    async fn set_addresses(&self, addresses: &str) -> Result<(), StorageError>;
}

/// Bound a store round trip; elapsed time becomes [`StorageError::Timeout`].
pub(crate) async fn with_timeout<T, F>(
    operation: &'static str,
    timeout: Duration,
    fut: F,
) -> Result<T, StorageError>
where
    F: Future<Output = Result<T, StorageError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(StorageError::Timeout { operation, timeout_ms: timeout.as_millis() as u64 }),
    }
}
