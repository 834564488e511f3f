use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::error::Error;
use std::fmt;

/// Failures of the folio allocator.
///
/// `Validation` is always raised before any transaction is opened; `AllocationFailed`
/// covers every storage failure and is safe to retry because an aborted transaction
/// leaves the counter untouched.
#[derive(Debug, thiserror::Error)]
pub enum FolioError {
    #[error("invalid {field}: {message}")]
    Validation { field: &'static str, message: String },
    #[error("folio allocation failed: {0}")]
    AllocationFailed(#[source] sqlx::Error),
}

/// Failures of the audit recorder. An empty diff is not an error.
#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("invalid mutation: {0}")]
    InvalidMutation(String),
    #[error("audit write failed: {0}")]
    WriteFailed(#[source] sqlx::Error),
    #[error("audit fragment could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failures of the generic entity store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),
    #[error("{entity} record {id} not found")]
    NotFound { entity: String, id: i64 },
    #[error("invalid record data: {0}")]
    InvalidData(String),
    #[error(transparent)]
    Audit(#[from] AuditError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// The primary error type for the HTTP layer.
///
/// Each domain failure maps onto its own variant so clients can tell a rejected
/// argument from a retryable allocation failure or a failed audit write.
#[derive(Debug)]
pub enum AppError {
    /// For internal server errors that are not expected to be handled by the client.
    Internal(anyhow::Error),
    /// For client errors due to invalid requests.
    BadRequest(String),
    /// For when a requested resource is not found.
    NotFound(String),
    /// For when a service is temporarily unavailable.
    ServiceUnavailable(String),
    /// For errors related to database operations.
    Database(String),
    /// For when a request carries no valid credentials or actor context.
    Unauthorized(String),
    /// For when a privileged route is disabled or the admin token does not match.
    Forbidden(String),
    /// For when a specific field in a request fails validation.
    ValidationError {
        /// The name of the field that failed validation.
        field: String,
        /// A message describing the validation error.
        message: String,
    },
    /// The folio counter transaction could not commit. Retryable.
    AllocationFailed(String),
    /// The audit entry could not be written and the mutation was rolled back.
    AuditWriteFailed(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Internal(e) => write!(f, "Internal error: {}", e),
            AppError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
            AppError::Database(msg) => write!(f, "Database error: {}", msg),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::ValidationError { field, message } => {
                write!(f, "Validation error on field '{}': {}", field, message)
            }
            AppError::AllocationFailed(msg) => write!(f, "Folio allocation failed: {}", msg),
            AppError::AuditWriteFailed(msg) => write!(f, "Audit write failed: {}", msg),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Internal(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message, details) = match self {
            AppError::Internal(e) => {
                let error_id = uuid::Uuid::new_v4();
                tracing::error!(%error_id, "Internal error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                    Some(json!({ "error_id": error_id.to_string() })),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            AppError::ServiceUnavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg, None)
            }
            AppError::Database(msg) => {
                tracing::error!("Database error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                    Some(json!({ "details": msg })),
                )
            }
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg, None),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg, None),
            AppError::ValidationError { field, message } => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Validation failed for field '{}'", field),
                Some(json!({ "field": field, "message": message })),
            ),
            AppError::AllocationFailed(msg) => {
                tracing::error!("Folio allocation failed: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "ALLOCATION_FAILED",
                    "The folio could not be allocated, retry the request".to_string(),
                    Some(json!({ "details": msg, "retryable": true })),
                )
            }
            AppError::AuditWriteFailed(msg) => {
                tracing::error!("Audit write failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "AUDIT_WRITE_FAILED",
                    "The change was not applied because its audit entry could not be written"
                        .to_string(),
                    Some(json!({ "details": msg })),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": error_message,
            },
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        if let Some(details) = details {
            body["error"]["details"] = details;
        }

        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
            sqlx::Error::PoolTimedOut => {
                AppError::ServiceUnavailable("Database connection pool timed out".to_string())
            }
            _ => AppError::Database(format!("Database error: {}", err)),
        }
    }
}

impl From<FolioError> for AppError {
    fn from(err: FolioError) -> Self {
        match err {
            FolioError::Validation { field, message } => {
                AppError::ValidationError { field: field.to_string(), message }
            }
            FolioError::AllocationFailed(e) => AppError::AllocationFailed(e.to_string()),
        }
    }
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::InvalidMutation(msg) => AppError::BadRequest(msg),
            other => AppError::AuditWriteFailed(other.to_string()),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownEntity(entity) => {
                AppError::NotFound(format!("Unknown entity type: {}", entity))
            }
            e @ StoreError::NotFound { .. } => AppError::NotFound(e.to_string()),
            StoreError::InvalidData(msg) => AppError::BadRequest(msg),
            StoreError::Audit(e) => e.into(),
            StoreError::Database(e) => e.into(),
        }
    }
}

/// A type alias for `Result<T, AppError>`, used throughout the HTTP layer.
pub type AppResult<T> = Result<T, AppError>;

/// An extension trait for `Option` that provides a convenient way to convert
/// an `Option` to a `Result` with a `NotFound` error.
pub trait OptionExt<T> {
    /// Converts an `Option<T>` to a `Result<T, AppError>`.
    ///
    /// # Arguments
    ///
    /// * `entity` - A string describing the entity that was not found.
    fn ok_or_not_found(self, entity: &str) -> AppResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, entity: &str) -> AppResult<T> {
        self.ok_or_else(|| AppError::NotFound(format!("{} not found", entity)))
    }
}
