use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;
use ipnet::IpNet;
use std::net::IpAddr;
use std::time::Duration;

/// Environment variable naming the maintenance storage backend.
pub const ENV_BACKEND: &str = "CLUSTER_MAINTENANCE_BACKEND";
pub const ENV_REDIS_HOST: &str = "CLUSTER_MAINTENANCE_REDIS_HOST";
pub const ENV_REDIS_PORT: &str = "CLUSTER_MAINTENANCE_REDIS_PORT";
pub const ENV_REDIS_DB: &str = "CLUSTER_MAINTENANCE_REDIS_DB";
pub const ENV_FALLBACK_DIR: &str = "CLUSTER_MAINTENANCE_FALLBACK_DIR";
pub const ENV_TABLE_PREFIX: &str = "CLUSTER_MAINTENANCE_TABLE_PREFIX";
/// Comma-separated CIDRs or addresses of reverse proxies.
pub const ENV_TRUSTED_PROXIES: &str = "CLUSTER_MAINTENANCE_TRUSTED_PROXIES";

pub const DEFAULT_REDIS_HOST: &str = "127.0.0.1";
pub const DEFAULT_REDIS_PORT: u16 = 6379;
/// Logical database reserved for maintenance state, away from general cache usage (db 0).
pub const DEFAULT_REDIS_DB: i64 = 2;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { host: "127.0.0.1".into(), port: 8080, worker_threads: Some(4) }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_max_connections() -> u32 { 10 }
fn default_min_connections() -> u32 { 1 }
fn default_connect_timeout() -> u64 { 2 }
fn default_idle_timeout() -> u64 { 600 }
fn default_max_lifetime() -> u64 { 3600 }
fn default_acquire_timeout() -> u64 { 2 }

/// General cache layer settings. Maintenance state reuses the Redis
/// connection details declared here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub redis: Option<RedisCacheConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct RedisCacheConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Registered backend identifier (`redis`, `database`, `auto`). Unset means `redis`.
    #[serde(default)]
    pub backend: Option<String>,
    #[serde(default)]
    pub redis_db: Option<i64>,
    #[serde(default = "default_fallback_dir")]
    pub fallback_dir: String,
    #[serde(default = "default_storage_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_storage_timeout_ms")]
    pub operation_timeout_ms: u64,
    #[serde(default = "default_retry_after")]
    pub retry_after_secs: u64,
    /// Prepended to the `maintenance_mode` table name.
    #[serde(default)]
    pub table_prefix: String,
    /// Peers whose `X-Forwarded-For` is honoured. Empty means the header is ignored.
    #[serde(default)]
    pub trusted_proxies: Vec<String>,
}

fn default_fallback_dir() -> String { "data".to_string() }
fn default_storage_timeout_ms() -> u64 { 2000 }
fn default_retry_after() -> u64 { 60 }

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            backend: None,
            redis_db: None,
            fallback_dir: default_fallback_dir(),
            connect_timeout_ms: default_storage_timeout_ms(),
            operation_timeout_ms: default_storage_timeout_ms(),
            retry_after_secs: default_retry_after(),
            table_prefix: String::new(),
            trusted_proxies: Vec::new(),
        }
    }
}

impl MaintenanceConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Connection target for the Redis maintenance backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
    pub db: i64,
}

impl RedisSettings {
    /// Resolve host, port and db from the process environment and `cfg`.
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::resolve(cfg, |key| std::env::var(key).ok())
    }

    /// Precedence per setting: environment > config file > built-in default.
    /// Empty or unparsable environment values fall through.
    pub fn resolve<F>(cfg: &AppConfig, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let cache = cfg.cache.redis.as_ref();

        let host = env_value(ENV_REDIS_HOST)
            .or_else(|| cache.map(|c| c.host.trim().to_string()).filter(|h| !h.is_empty()))
            .unwrap_or_else(|| DEFAULT_REDIS_HOST.to_string());
        let port = env_value(ENV_REDIS_PORT)
            .and_then(|v| v.parse::<u16>().ok())
            .or_else(|| cache.and_then(|c| c.port))
            .unwrap_or(DEFAULT_REDIS_PORT);
        let db = env_value(ENV_REDIS_DB)
            .and_then(|v| v.parse::<i64>().ok())
            .or(cfg.maintenance.redis_db)
            .unwrap_or(DEFAULT_REDIS_DB);

        Self { host, port, db }
    }

    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("redis://[{}]:{}/{}", self.host, self.port, self.db)
        } else {
            format!("redis://{}:{}/{}", self.host, self.port, self.db)
        }
    }
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_from_file(&path)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    load_from_str(&content)
}

pub fn load_from_str(content: &str) -> Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(content)?;
    Ok(cfg)
}

impl AppConfig {
    /// Load `CONFIG_PATH` (default `config.toml`), treating a missing file as
    /// all-defaults, then apply env overrides and validate.
    pub fn load_and_validate() -> Result<Self> {
        let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        let mut cfg = match std::fs::read_to_string(&path) {
            Ok(content) => load_from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
            Err(e) => return Err(anyhow!("cannot read {path}: {e}")),
        };
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.server.normalize()?;
        self.database.normalize_from_env();
        self.maintenance.normalize_from_env();
        self.maintenance.validate()?;
        if !self.database.url.trim().is_empty() {
            self.database.validate()?;
        }
        Ok(())
    }

    /// Whether the deployment declares a Redis cache that maintenance state can reuse.
    pub fn declares_redis_cache(&self) -> bool {
        self.cache.redis.as_ref().map(|r| !r.host.trim().is_empty()).unwrap_or(false)
    }
}

impl ServerConfig {
    fn normalize(&mut self) -> Result<()> {
        if self.host.trim().is_empty() {
            self.host = "127.0.0.1".to_string();
        }
        if self.port == 0 {
            return Err(anyhow!("server.port must be within 1..=65535"));
        }
        match self.worker_threads {
            Some(0) | None => self.worker_threads = Some(4),
            Some(_) => {}
        }
        Ok(())
    }
}

impl DatabaseConfig {
    pub fn normalize_from_env(&mut self) {
        if self.url.trim().is_empty() {
            if let Ok(url) = std::env::var("DATABASE_URL") {
                self.url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(anyhow!("database.url is empty; set it in config.toml or DATABASE_URL"));
        }
        let lower = self.url.to_lowercase();
        if !(lower.starts_with("postgresql://") || lower.starts_with("postgres://") || lower.starts_with("sqlite:")) {
            return Err(anyhow!("database.url must start with postgres://, postgresql:// or sqlite:"));
        }
        if self.min_connections == 0 {
            return Err(anyhow!("database.min_connections must be >= 1"));
        }
        if self.max_connections < self.min_connections {
            return Err(anyhow!("database.max_connections must be >= min_connections"));
        }
        if self.connect_timeout_secs == 0 || self.acquire_timeout_secs == 0 {
            return Err(anyhow!("database timeouts must be positive seconds"));
        }
        Ok(())
    }
}

impl MaintenanceConfig {
    pub fn normalize_from_env(&mut self) {
        if let Ok(backend) = std::env::var(ENV_BACKEND) {
            if !backend.trim().is_empty() {
                self.backend = Some(backend.trim().to_string());
            }
        }
        if let Ok(dir) = std::env::var(ENV_FALLBACK_DIR) {
            if !dir.trim().is_empty() {
                self.fallback_dir = dir.trim().to_string();
            }
        }
        if self.fallback_dir.trim().is_empty() {
            self.fallback_dir = default_fallback_dir();
        }
        if let Ok(prefix) = std::env::var(ENV_TABLE_PREFIX) {
            self.table_prefix = prefix.trim().to_string();
        }
        if let Ok(proxies) = std::env::var(ENV_TRUSTED_PROXIES) {
            self.trusted_proxies = proxies
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    /// Parse `trusted_proxies`; a bare address is a single-host network.
    pub fn trusted_proxy_nets(&self) -> Result<Vec<IpNet>> {
        self.trusted_proxies
            .iter()
            .map(|entry| {
                let entry = entry.trim();
                entry
                    .parse::<IpNet>()
                    .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                    .map_err(|_| anyhow!("maintenance.trusted_proxies: `{entry}` is not an address or CIDR"))
            })
            .collect()
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_ms == 0 || self.operation_timeout_ms == 0 {
            return Err(anyhow!("maintenance storage timeouts must be positive milliseconds"));
        }
        if !self.table_prefix.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(anyhow!("maintenance.table_prefix may only contain ASCII letters, digits and `_`"));
        }
        self.trusted_proxy_nets()?;
        Ok(())
    }
}
