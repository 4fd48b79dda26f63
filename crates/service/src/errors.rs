use thiserror::Error;

/// Failure to reach, read from, or write to the shared maintenance store.
///
/// Never surfaces past [`crate::gate::MaintenanceGate`]; the gate answers
/// from the local fallback instead.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: &'static str, timeout_ms: u64 },
    #[error("command error: {0}")]
    Command(String),
    #[error("malformed value for `{key}`: {detail}")]
    Malformed { key: &'static str, detail: String },
    #[error("unknown maintenance storage backend `{requested}`; valid backends: {}", .valid.join(", "))]
    UnknownBackend { requested: String, valid: Vec<&'static str> },
}

impl From<models::errors::ModelError> for StorageError {
    fn from(e: models::errors::ModelError) -> Self {
        match e {
            models::errors::ModelError::Db(msg) => StorageError::Command(msg),
            models::errors::ModelError::Validation(msg) => StorageError::Command(msg),
        }
    }
}

/// Errors the gate returns to its caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MaintenanceError {
    #[error("one or more IP addresses is expected (comma-separated), got `{0}`")]
    InvalidInput(String),
}

impl MaintenanceError {
    /// Stable numeric code for external mapping/logging
    pub fn code(&self) -> u16 {
        match self {
            MaintenanceError::InvalidInput(_) => 1001,
        }
    }
}
