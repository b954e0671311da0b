use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use thiserror::Error;
use validator::ValidationErrors;

/// AppError
///
/// The single error type flowing out of repositories, services and handlers. Its
/// `IntoResponse` impl is the only place where failures turn into HTTP status codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("{0} not found")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("payment provider error: {0}")]
    Payment(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl AppError {
    pub fn not_found(what: &str) -> Self {
        AppError::NotFound(what.to_string())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        AppError::BadRequest(msg.into())
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::RowNotFound = err {
            return AppError::NotFound("resource".to_string());
        }
        if let Some(db_err) = err.as_database_error() {
            // 23505 unique_violation, 23503 foreign_key_violation (Postgres SQLSTATE).
            match db_err.code().as_deref() {
                Some("23505") => {
                    return AppError::Conflict(
                        db_err
                            .constraint()
                            .map(|c| format!("{c} already exists"))
                            .unwrap_or_else(|| "resource already exists".to_string()),
                    );
                }
                Some("23503") => {
                    return AppError::BadRequest(
                        "operation violates a reference to another resource".to_string(),
                    );
                }
                _ => {}
            }
        }
        AppError::Database(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors): (StatusCode, String, Option<Value>) = match self {
            AppError::Validation(ref errs) => (
                StatusCode::BAD_REQUEST,
                "validation failed".to_string(),
                serde_json::to_value(errs.field_errors()).ok(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, None),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "authentication required".to_string(),
                None,
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                "insufficient permissions".to_string(),
                None,
            ),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{what} not found"), None),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            AppError::Database(ref e) => {
                // Storage failures surface as a generic 400, details stay in the logs.
                tracing::error!("Database error: {:?}", e);
                (StatusCode::BAD_REQUEST, "request could not be processed".to_string(), None)
            }
            AppError::Payment(ref msg) => {
                tracing::error!("Payment provider error: {}", msg);
                (StatusCode::BAD_REQUEST, "payment request failed".to_string(), None)
            }
            AppError::Storage(ref msg) => {
                tracing::error!("Storage error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "storage unavailable".to_string(), None)
            }
            AppError::Internal(ref msg) => {
                tracing::error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_string(), None)
            }
        };

        let body = match errors {
            Some(errors) => json!({ "message": message, "errors": errors }),
            None => json!({ "message": message }),
        };

        (status, Json(body)).into_response()
    }
}
