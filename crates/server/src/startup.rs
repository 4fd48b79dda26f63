use std::net::SocketAddr;
use std::sync::Arc;

use configs::{AppConfig, ServerConfig};
use service::events::MAINTENANCE_MODE_CHANGED;
use service::{MaintenanceEvent, MaintenanceGate};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::errors::StartupError;
use crate::routes;
use crate::state::{AppState, ENV_ADMIN_TOKEN};

fn bind_addr(server: &ServerConfig) -> Result<SocketAddr, StartupError> {
    let addr = format!("{}:{}", server.host, server.port);
    addr.parse().map_err(|e: std::net::AddrParseError| StartupError::BindAddr {
        addr: addr.clone(),
        reason: e.to_string(),
    })
}

/// Log every maintenance state change seen on this node.
fn spawn_event_logger(mut rx: broadcast::Receiver<MaintenanceEvent>) {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(MaintenanceEvent::StateChanged { is_on }) => {
                    info!(event = MAINTENANCE_MODE_CHANGED, is_on, "maintenance state changed");
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "maintenance event logger lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Build the app from configuration and serve until the listener fails.
pub async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::load_and_validate().map_err(|e| StartupError::InvalidConfig(e.to_string()))?;

    common::env::ensure_data_dir(&cfg.maintenance.fallback_dir).await?;

    let gate = Arc::new(MaintenanceGate::from_config(&cfg));
    spawn_event_logger(gate.events().subscribe());

    let state = AppState::from_config(gate, &cfg)?;
    if state.admin_token.is_none() {
        warn!(env = ENV_ADMIN_TOKEN, "no admin token configured; /admin routes are disabled");
    }
    if state.trusted_proxies.is_empty() {
        info!("no trusted proxies configured; X-Forwarded-For is ignored");
    }

    let app = routes::build_router(state, routes::default_app_routes());

    let addr = bind_addr(&cfg.server)?;
    info!(%addr, fallback_dir = %cfg.maintenance.fallback_dir, "starting maintenance server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_from_config() -> anyhow::Result<()> {
        let server = ServerConfig { host: "0.0.0.0".into(), port: 8080, worker_threads: None };
        assert_eq!(bind_addr(&server)?, "0.0.0.0:8080".parse::<SocketAddr>()?);
        Ok(())
    }

    #[test]
    fn bad_host_is_reported() {
        let server = ServerConfig { host: "not a host".into(), port: 80, worker_threads: None };
        assert!(matches!(bind_addr(&server), Err(StartupError::BindAddr { .. })));
    }
}
