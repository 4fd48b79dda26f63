use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use configs::AppConfig;
use tracing::{error, info};

use super::{DatabaseStorage, MaintenanceStorage, RedisStorage};
use crate::errors::StorageError;

pub const BACKEND_REDIS: &str = "redis";
pub const BACKEND_DATABASE: &str = "database";
/// Redis when the deployment declares a Redis cache, database otherwise.
pub const BACKEND_AUTO: &str = "auto";

pub const REGISTERED_BACKENDS: [&str; 3] = [BACKEND_REDIS, BACKEND_DATABASE, BACKEND_AUTO];

/// Backend selection inputs, captured once from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendSelection {
    /// Requested identifier; `None` selects the key-value backend.
    pub requested: Option<String>,
    pub redis_cache_declared: bool,
}

impl BackendSelection {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            requested: cfg.maintenance.backend.clone(),
            redis_cache_declared: cfg.declares_redis_cache(),
        }
    }

    fn identifier(&self) -> String {
        self.requested
            .as_deref()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| BACKEND_REDIS.to_string())
    }
}

enum Resolution {
    Backend(Arc<dyn MaintenanceStorage>),
    Unknown(String),
}

/// Picks exactly one backend for the process on first use and memoizes it.
///
/// Resolution reads only the captured [`BackendSelection`]; it never touches
/// the network. An unknown identifier is memoized as well, so every call keeps
/// failing the same way until the process restarts.
pub struct StorageResolver {
    selection: BackendSelection,
    redis: Arc<dyn MaintenanceStorage>,
    database: Arc<dyn MaintenanceStorage>,
    resolved: OnceLock<Resolution>,
}

impl StorageResolver {
    pub fn new(
        selection: BackendSelection,
        redis: Arc<dyn MaintenanceStorage>,
        database: Arc<dyn MaintenanceStorage>,
    ) -> Self {
        Self { selection, redis, database, resolved: OnceLock::new() }
    }

    /// Register the Redis and database backends built from `cfg`. Both connect lazily.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            BackendSelection::from_config(cfg),
            Arc::new(RedisStorage::from_config(cfg)),
            Arc::new(DatabaseStorage::from_config(cfg)),
        )
    }

    fn resolve(&self) -> Resolution {
        let identifier = self.selection.identifier();
        let chosen = match identifier.as_str() {
            BACKEND_REDIS => Arc::clone(&self.redis),
            BACKEND_DATABASE => Arc::clone(&self.database),
            BACKEND_AUTO if self.selection.redis_cache_declared => Arc::clone(&self.redis),
            BACKEND_AUTO => Arc::clone(&self.database),
            _ => {
                error!(
                    event = "maintenance_backend_unknown",
                    requested = %identifier,
                    valid = ?REGISTERED_BACKENDS,
                    "unknown maintenance storage backend; every call will use the local fallback"
                );
                return Resolution::Unknown(identifier);
            }
        };
        info!(
            event = "maintenance_backend_resolved",
            requested = %identifier,
            backend = chosen.name(),
            "maintenance storage backend resolved"
        );
        Resolution::Backend(chosen)
    }

    /// The memoized backend, or the memoized misconfiguration.
    pub fn adapter(&self) -> Result<&Arc<dyn MaintenanceStorage>, StorageError> {
        match self.resolved.get_or_init(|| self.resolve()) {
            Resolution::Backend(backend) => Ok(backend),
            Resolution::Unknown(requested) => Err(StorageError::UnknownBackend {
                requested: requested.clone(),
                valid: REGISTERED_BACKENDS.to_vec(),
            }),
        }
    }
}

#[async_trait]
impl MaintenanceStorage for StorageResolver {
    fn name(&self) -> &'static str {
        match self.adapter() {
            Ok(backend) => backend.name(),
            Err(_) => "unresolved",
        }
    }

    async fn has_flag(&self) -> Result<bool, StorageError> {
        self.adapter()?.has_flag().await
    }

    async fn set_flag(&self, enabled: bool) -> Result<(), StorageError> {
        self.adapter()?.set_flag(enabled).await
    }

    async fn get_addresses(&self) -> Result<String, StorageError> {
        self.adapter()?.get_addresses().await
    }

    async fn set_addresses(&self, addresses: &str) -> Result<(), StorageError> {
        self.adapter()?.set_addresses(addresses).await
    }
}
