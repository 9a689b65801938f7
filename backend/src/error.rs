use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("An active scan already exists for {0}")]
    DuplicateActiveScan(String),

    #[error("Maximum concurrent scans reached ({0})")]
    ConcurrencyLimitExceeded(u32),

    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    #[error("Cannot delete active scan {0}")]
    CannotDeleteActive(String),

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ApiError {
    /// Create a new validation error
    pub fn validation<T: Into<String>>(msg: T) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new not found error
    pub fn not_found<T: Into<String>>(msg: T) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a new persistence error
    pub fn persistence<T: Into<String>>(msg: T) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a new invalid transition error
    pub fn invalid_transition<T: Into<String>>(msg: T) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Whether this error originated in the storage layer.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ApiError::Persistence(_)
                | ApiError::Database(_)
                | ApiError::Migration(_)
                | ApiError::Io(_)
                | ApiError::Serialization(_)
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let error_id = Uuid::new_v4();
        let message = self.to_string();

        let (status, error_code) = match self {
            ApiError::NotFound(_) => {
                tracing::info!(error_id = %error_id, error = %message, "resource not found");
                (StatusCode::NOT_FOUND, "NOT_FOUND")
            }
            ApiError::DuplicateActiveScan(_) => {
                tracing::warn!(error_id = %error_id, error = %message, "duplicate active scan");
                (StatusCode::CONFLICT, "DUPLICATE_ACTIVE_SCAN")
            }
            ApiError::ConcurrencyLimitExceeded(_) => {
                tracing::warn!(error_id = %error_id, error = %message, "concurrency limit exceeded");
                (StatusCode::TOO_MANY_REQUESTS, "CONCURRENCY_LIMIT_EXCEEDED")
            }
            ApiError::InvalidTransition(_) => {
                tracing::warn!(error_id = %error_id, error = %message, "invalid scan transition");
                (StatusCode::CONFLICT, "INVALID_TRANSITION")
            }
            ApiError::CannotDeleteActive(_) => {
                tracing::warn!(error_id = %error_id, error = %message, "delete of active scan rejected");
                (StatusCode::CONFLICT, "CANNOT_DELETE_ACTIVE")
            }
            ApiError::UnknownModule(_) => {
                tracing::info!(error_id = %error_id, error = %message, "unknown scan module");
                (StatusCode::NOT_FOUND, "UNKNOWN_MODULE")
            }
            ApiError::Validation(_) => {
                tracing::warn!(error_id = %error_id, error = %message, "validation error occurred");
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::Persistence(_)
            | ApiError::Database(_)
            | ApiError::Migration(_)
            | ApiError::Io(_)
            | ApiError::Serialization(_) => {
                tracing::error!(error_id = %error_id, error = %message, "persistence error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
            }
            ApiError::Config(_) | ApiError::Configuration(_) => {
                tracing::error!(error_id = %error_id, error = %message, "configuration error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR")
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "code": error_code,
                "error_id": error_id,
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

/// Human-readable message of the most recent failed mutating operation.
#[derive(Debug, Default)]
pub struct LastError {
    message: std::sync::RwLock<Option<String>>,
}

impl LastError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message: impl Into<String>) {
        let mut guard = self
            .message
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Some(message.into());
    }

    pub fn clear(&self) {
        let mut guard = self
            .message
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = None;
    }

    pub fn get(&self) -> Option<String> {
        self.message
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Record `err` with a context prefix and hand it back to the caller.
    pub fn capture(&self, context: &str, err: ApiError) -> ApiError {
        self.set(format!("{}: {}", context, err));
        err
    }
}
