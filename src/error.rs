use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Failure outcomes of the persistence gateway.
///
/// Every gateway operation reports failures as one of these kinds; nothing is
/// swallowed on the way up.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("No balance found for account {0}")]
    NotFound(String),

    #[error("Store unreachable: {0}")]
    ConnectionFailure(String),

    #[error("Could not start transaction: {0}")]
    SessionFailure(String),

    #[error("Query failed: {0}")]
    QueryFailure(String),

    #[error("Insert failed for account {account_id}: {message}")]
    InsertFailure {
        account_id: String,
        /// Rejected by the natural-key uniqueness constraint.
        conflict: bool,
        message: String,
    },

    #[error("Update failed for balance {id}: {message}")]
    UpdateFailure { id: i64, message: String },

    #[error("Delete failed for balance {id}: {message}")]
    DeleteFailure { id: i64, message: String },

    #[error("Could not decode balance row: {0}")]
    DecodeFailure(String),

    #[error("Operation canceled: {0}")]
    Canceled(CancelCause),
}

/// Why an operation context stopped an in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelCause {
    Canceled,
    DeadlineExceeded,
}

impl fmt::Display for CancelCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelCause::Canceled => write!(f, "context canceled"),
            CancelCause::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

/// Discriminant of [`StoreError`], cheap to copy into logs and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    ConnectionFailure,
    SessionFailure,
    QueryFailure,
    InsertFailure,
    UpdateFailure,
    DeleteFailure,
    DecodeFailure,
    Canceled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ConnectionFailure => "CONNECTION_FAILURE",
            ErrorKind::SessionFailure => "SESSION_FAILURE",
            ErrorKind::QueryFailure => "QUERY_FAILURE",
            ErrorKind::InsertFailure => "INSERT_FAILURE",
            ErrorKind::UpdateFailure => "UPDATE_FAILURE",
            ErrorKind::DeleteFailure => "DELETE_FAILURE",
            ErrorKind::DecodeFailure => "DECODE_FAILURE",
            ErrorKind::Canceled => "CANCELED",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound(_) => ErrorKind::NotFound,
            StoreError::ConnectionFailure(_) => ErrorKind::ConnectionFailure,
            StoreError::SessionFailure(_) => ErrorKind::SessionFailure,
            StoreError::QueryFailure(_) => ErrorKind::QueryFailure,
            StoreError::InsertFailure { .. } => ErrorKind::InsertFailure,
            StoreError::UpdateFailure { .. } => ErrorKind::UpdateFailure,
            StoreError::DeleteFailure { .. } => ErrorKind::DeleteFailure,
            StoreError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            StoreError::Canceled(_) => ErrorKind::Canceled,
        }
    }

    /// True when an insert lost the first-write race on `account_id`.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::InsertFailure { conflict: true, .. })
    }

    pub(crate) fn insert(account_id: &str, err: sqlx::Error) -> Self {
        if is_decode_error(&err) {
            return StoreError::DecodeFailure(err.to_string());
        }
        let conflict = err
            .as_database_error()
            .and_then(|db| db.code())
            .map_or(false, |code| code == UNIQUE_VIOLATION);
        StoreError::InsertFailure {
            account_id: account_id.to_string(),
            conflict,
            message: err.to_string(),
        }
    }

    pub(crate) fn query(err: sqlx::Error) -> Self {
        if is_decode_error(&err) {
            StoreError::DecodeFailure(err.to_string())
        } else {
            StoreError::QueryFailure(err.to_string())
        }
    }

    pub(crate) fn connection(err: sqlx::Error) -> Self {
        StoreError::ConnectionFailure(err.to_string())
    }

    pub(crate) fn session(err: sqlx::Error) -> Self {
        StoreError::SessionFailure(err.to_string())
    }

    pub(crate) fn update(id: i64, err: sqlx::Error) -> Self {
        StoreError::UpdateFailure {
            id,
            message: err.to_string(),
        }
    }

    pub(crate) fn delete(id: i64, err: sqlx::Error) -> Self {
        StoreError::DeleteFailure {
            id,
            message: err.to_string(),
        }
    }
}

fn is_decode_error(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::TypeNotFound { .. }
    )
}

/// Top-level error type for the worker process and its HTTP surface
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// API error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            AppError::Store(err) => {
                let kind = err.kind();
                let status = match &err {
                    StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                    StoreError::InsertFailure { conflict: true, .. } => StatusCode::CONFLICT,
                    StoreError::Canceled(_)
                    | StoreError::ConnectionFailure(_)
                    | StoreError::SessionFailure(_) => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let details = match &err {
                    StoreError::InsertFailure {
                        account_id,
                        conflict,
                        ..
                    } => Some(serde_json::json!({
                        "account_id": account_id,
                        "conflict": conflict,
                    })),
                    _ => None,
                };
                (status, kind.as_str(), err.to_string(), details)
            }
            AppError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg, None),
            AppError::Config(_) | AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
                None,
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            error_code: error_code.to_string(),
            details,
        });

        (status, body).into_response()
    }
}

impl From<config::ConfigError> for AppError {
    fn from(error: config::ConfigError) -> Self {
        AppError::Config(format!("Error loading configuration: {:?}", error))
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(error: sqlx::migrate::MigrateError) -> Self {
        AppError::Internal(format!("Migration error: {:?}", error))
    }
}

/// Result type alias for the application
pub type AppResult<T> = Result<T, AppError>;
