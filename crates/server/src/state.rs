use std::sync::Arc;

use configs::AppConfig;
use ipnet::IpNet;
use service::MaintenanceGate;

use crate::errors::StartupError;

/// Env var holding the shared secret for `/admin/*`.
pub const ENV_ADMIN_TOKEN: &str = "MAINTENANCE_ADMIN_TOKEN";

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<MaintenanceGate>,
    /// `None` disables the admin routes.
    pub admin_token: Option<Arc<str>>,
    pub retry_after_secs: u64,
    /// Peers whose `X-Forwarded-For` header is honoured. Empty means none.
    pub trusted_proxies: Arc<[IpNet]>,
}

impl AppState {
    pub fn new(gate: Arc<MaintenanceGate>, admin_token: Option<String>, retry_after_secs: u64) -> Self {
        let admin_token = admin_token
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(Arc::from);
        Self { gate, admin_token, retry_after_secs, trusted_proxies: Arc::from(Vec::new()) }
    }

    pub fn with_trusted_proxies(mut self, proxies: Vec<IpNet>) -> Self {
        self.trusted_proxies = Arc::from(proxies);
        self
    }

    pub fn from_config(gate: Arc<MaintenanceGate>, cfg: &AppConfig) -> Result<Self, StartupError> {
        let proxies = cfg
            .maintenance
            .trusted_proxy_nets()
            .map_err(|e| StartupError::InvalidConfig(e.to_string()))?;
        Ok(Self::new(gate, std::env::var(ENV_ADMIN_TOKEN).ok(), cfg.maintenance.retry_after_secs)
            .with_trusted_proxies(proxies))
    }
}
