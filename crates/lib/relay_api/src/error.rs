//! Application error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::error;

use relay_core::auth::AuthError;
use relay_core::storage::StorageError;

use crate::models::ErrorResponse;
use crate::services::control::ControlError;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Upstream fetch failed: {0}")]
    BadGateway(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::StorageUnavailable(m) => {
                (StatusCode::SERVICE_UNAVAILABLE, "storage_unavailable", m.as_str())
            }
            AppError::BadGateway(m) => (StatusCode::BAD_GATEWAY, "fetch_failed", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(m) => {
                error!(error = %m, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidToken | AuthError::MalformedToken(_) => {
                AppError::Unauthorized(e.to_string())
            }
            AuthError::Forbidden(_) => AppError::Forbidden(e.to_string()),
            AuthError::TokenError(msg) => AppError::Internal(msg),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(iid) => AppError::NotFound(format!("installation {iid}")),
            StorageError::NotConfigured | StorageError::Unavailable(_) => {
                AppError::StorageUnavailable(e.to_string())
            }
            StorageError::Sql(sqlx_error) => {
                AppError::StorageUnavailable(format!("database error: {sqlx_error}"))
            }
            StorageError::SettingsFetch(fetch) => AppError::BadGateway(fetch.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<ControlError> for AppError {
    fn from(e: ControlError) -> Self {
        match e {
            ControlError::Unauthenticated => AppError::Unauthorized(e.to_string()),
            ControlError::Auth(auth) => auth.into(),
            ControlError::Storage(storage) => storage.into(),
        }
    }
}
