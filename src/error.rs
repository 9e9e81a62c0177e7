//! Error types for the agency portal.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Top-level error type for the portal.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Outbound email delivery errors. Absorbed by the dispatcher — recorded on
/// the reminder, never raised to an API caller.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Missing targetEmail")]
    MissingTarget,

    #[error("Failed to build email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),

    #[error("Send timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

/// Object-store errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Delete failed: {0}")]
    Delete(String),

    #[error("Unrecognized storage URL: {0}")]
    BadUrl(String),
}

/// HTTP-facing error with a stable machine-checkable category.
///
/// Maps the portal taxonomy onto status codes: validation 400,
/// authorization 403, not-found 404, rate-limited 429, the rest 500.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Authorization(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Sweep already ran recently; retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl ApiError {
    fn category(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Authorization(_) => "authorization",
            Self::NotFound { .. } => "not_found",
            Self::RateLimited { .. } => "rate_limited",
            Self::Storage(_) => "storage",
            Self::Database(_) => "database",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Storage(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DatabaseError> for ApiError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::NotFound { entity, id } => Self::NotFound {
                entity: "record",
                id: format!("{entity}/{id}"),
            },
            other => Self::Database(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "ok": false,
            "error": self.to_string(),
            "category": self.category(),
        });
        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for the portal.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_categories_are_stable() {
        assert_eq!(ApiError::Validation("x".into()).category(), "validation");
        assert_eq!(
            ApiError::Authorization("x".into()).category(),
            "authorization"
        );
        assert_eq!(
            ApiError::NotFound {
                entity: "reminder",
                id: "1".into()
            }
            .category(),
            "not_found"
        );
        assert_eq!(
            ApiError::RateLimited {
                retry_after_secs: 10
            }
            .category(),
            "rate_limited"
        );
    }

    #[test]
    fn missing_target_renders_bare_marker() {
        // Recorded verbatim as a reminder's lastError; no wrapping prefix.
        assert_eq!(
            DeliveryError::MissingTarget.to_string(),
            "Missing targetEmail"
        );
    }

    #[test]
    fn db_not_found_maps_to_404() {
        let api: ApiError = DatabaseError::NotFound {
            entity: "reminder".into(),
            id: "abc".into(),
        }
        .into();
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn db_query_maps_to_500() {
        let api: ApiError = DatabaseError::Query("boom".into()).into();
        assert_eq!(api.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
