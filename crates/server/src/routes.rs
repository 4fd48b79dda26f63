use axum::{
    http::{header, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use tower_http::trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use common::types::Health;

use crate::state::AppState;

pub mod admin;
pub mod guard;

pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub async fn metrics() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [(header::CONTENT_TYPE, "text/plain".to_string())],
            format!("metrics encode error: {e}"),
        );
    }
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        String::from_utf8(buffer).unwrap_or_default(),
    )
}

async fn index() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "service": "cluster-maintenance", "status": "ok" }))
}

async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" })))
}

/// Routes served by the standalone binary. Embedders pass their own.
pub fn default_app_routes() -> Router<AppState> {
    Router::new().route("/", get(index)).fallback(not_found)
}

/// Compose the full router.
///
/// `app` is wrapped in the maintenance guard. `/health`, `/metrics` and
/// `/admin/*` bypass it so health checks keep working and operators can always
/// switch maintenance off.
pub fn build_router(state: AppState, app: Router<AppState>) -> Router {
    let guarded = app.layer(middleware::from_fn_with_state(state.clone(), guard::maintenance_guard));

    let admin_routes = Router::new()
        .route("/admin/maintenance", get(admin::get_maintenance).put(admin::put_maintenance))
        .route("/admin/maintenance/addresses", put(admin::put_addresses))
        .route_layer(middleware::from_fn_with_state(state.clone(), admin::require_admin_token));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(admin_routes)
        .merge(guarded)
        .with_state(state)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO).include_headers(false))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}
