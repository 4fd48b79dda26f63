use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use service::MaintenanceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Maintenance(#[from] MaintenanceError),
    #[error("missing or invalid admin token")]
    Unauthorized,
    #[error("admin api disabled: no admin token configured")]
    AdminDisabled,
    #[error("service under maintenance")]
    UnderMaintenance { retry_after_secs: u64 },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Maintenance(MaintenanceError::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::AdminDisabled => StatusCode::FORBIDDEN,
            ApiError::UnderMaintenance { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = serde_json::json!({ "error": self.to_string() });
        if let ApiError::Maintenance(e) = &self {
            body["code"] = e.code().into();
        }
        let mut res = (status, Json(body)).into_response();
        if let ApiError::UnderMaintenance { retry_after_secs } = self {
            res.headers_mut().insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        res
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("invalid bind address `{addr}`: {reason}")]
    BindAddr { addr: String, reason: String },
}
