use std::net::{IpAddr, SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use ipnet::IpNet;
use service::observability::BLOCKED_REQUESTS_TOTAL;
use tracing::debug;

use crate::errors::ApiError;
use crate::state::AppState;

pub const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

fn is_trusted(ip: &IpAddr, trusted: &[IpNet]) -> bool {
    trusted.iter().any(|net| net.contains(ip))
}

/// Caller address used for allow-list checks.
///
/// `X-Forwarded-For` is only read when the TCP peer is a trusted proxy. The
/// hops are then walked right to left and the first one outside the trusted
/// set is the caller; if every hop is trusted, the leftmost one is used.
/// Without a peer address the caller is `""`.
pub fn client_ip(req: &Request, trusted: &[IpNet]) -> String {
    let Some(peer) = req.extensions().get::<ConnectInfo<SocketAddr>>().map(|ConnectInfo(addr)| addr.ip()) else {
        return String::new();
    };
    if !is_trusted(&peer, trusted) {
        return peer.to_string();
    }
    let hops: Vec<&str> = req
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.split(',').map(str::trim).filter(|hop| !hop.is_empty()).collect())
        .unwrap_or_default();
    let caller = hops
        .iter()
        .rev()
        .find(|hop| !hop.parse::<IpAddr>().is_ok_and(|ip| is_trusted(&ip, trusted)))
        .or(hops.first());
    match caller {
        Some(hop) => hop.to_string(),
        None => peer.to_string(),
    }
}

/// Reject with 503 while maintenance blocks the caller.
pub async fn maintenance_guard(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let ip = client_ip(&req, &state.trusted_proxies);
    if state.gate.is_on(&ip).await {
        BLOCKED_REQUESTS_TOTAL.inc();
        debug!(event = "maintenance_blocked", client_ip = %ip, path = %req.uri().path());
        return ApiError::UnderMaintenance { retry_after_secs: state.retry_after_secs }.into_response();
    }
    next.run(req).await
}
