use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;

pub use configs::DatabaseConfig;

use crate::errors::ModelError;

/// Connect using pool and timeout settings from `cfg`.
pub async fn connect_with_config(cfg: &DatabaseConfig) -> Result<DatabaseConnection, ModelError> {
    if cfg.url.trim().is_empty() {
        return Err(ModelError::Validation("database url is empty".into()));
    }
    let max = cfg.max_connections.max(1);
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.max_connections(max)
        .min_connections(cfg.min_connections.min(max))
        .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs.max(1)))
        .acquire_timeout(Duration::from_secs(cfg.acquire_timeout_secs.max(1)))
        .idle_timeout(Duration::from_secs(cfg.idle_timeout_secs))
        .max_lifetime(Duration::from_secs(cfg.max_lifetime_secs))
        .sqlx_logging(cfg.sqlx_logging);
    Database::connect(opts).await.map_err(|e| ModelError::Db(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_url_is_rejected_without_connecting() {
        let cfg = DatabaseConfig::default();
        let err = connect_with_config(&cfg).await.err();
        assert!(matches!(err, Some(ModelError::Validation(_))));
    }
}
