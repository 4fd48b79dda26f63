use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::state::AppState;

pub const ADMIN_TOKEN_HEADER: &str = "X-Admin-Token";

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MaintenanceStatus {
    pub enabled: bool,
    pub addresses: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetEnabled {
    pub enabled: bool,
}

#[derive(Debug, Deserialize)]
pub struct SetAddresses {
    /// Comma-joined allow-list; `""` clears it.
    pub addresses: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OkBody {
    pub ok: bool,
}

pub async fn get_maintenance(State(state): State<AppState>) -> Json<MaintenanceStatus> {
    let enabled = state.gate.is_on("").await;
    let addresses = state.gate.get_address_info().await;
    Json(MaintenanceStatus { enabled, addresses })
}

pub async fn put_maintenance(
    State(state): State<AppState>,
    Json(payload): Json<SetEnabled>,
) -> Json<OkBody> {
    let ok = state.gate.set(payload.enabled).await;
    info!(event = "maintenance_toggled", enabled = payload.enabled, ok, "admin changed maintenance mode");
    Json(OkBody { ok })
}

pub async fn put_addresses(
    State(state): State<AppState>,
    Json(payload): Json<SetAddresses>,
) -> Result<Json<OkBody>, ApiError> {
    let ok = state.gate.set_addresses(&payload.addresses).await?;
    info!(event = "maintenance_addresses_set", addresses = %payload.addresses, ok, "admin replaced allow-list");
    Ok(Json(OkBody { ok }))
}

/// Middleware: require `X-Admin-Token` to equal the configured token.
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Err(ApiError::AdminDisabled);
    };
    let provided = req.headers().get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok());
    if provided != Some(expected) {
        warn!(event = "admin_auth_failed", path = %req.uri().path(), "rejected admin request");
        return Err(ApiError::Unauthorized);
    }
    Ok(next.run(req).await)
}
