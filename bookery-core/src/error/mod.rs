//! Unified error handling for Bookery Core
//!
//! Every rejection leaves the service as `{"code": ..., "message": ...}` with a
//! fixed message per code. The precise reason is logged, never returned, so a
//! response cannot reveal whether a tenant or account exists.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-wide result type
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Tenant not found: {0}")]
    TenantNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl AppError {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "UNAUTHENTICATED",
            AppError::MalformedToken(_) => "MALFORMED_TOKEN",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::TenantNotFound(_) => "TENANT_NOT_FOUND",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthenticated(_) | AppError::MalformedToken(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::TenantNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Client-facing message, constant per code
    fn public_message(&self) -> &'static str {
        match self {
            AppError::Unauthenticated(_) => "Authentication required",
            AppError::MalformedToken(_) => "Authentication required",
            AppError::Forbidden(_) => "Access denied",
            AppError::TenantNotFound(_) => "Tenant not found",
            AppError::NotFound(_) => "Not found",
            AppError::BadRequest(_) => "Invalid request",
            AppError::Unavailable(_) => "Service temporarily unavailable",
            AppError::Database(_) | AppError::Redis(_) | AppError::Internal(_) => {
                "An internal error occurred"
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            AppError::Database(e) => tracing::error!("Database error: {:?}", e),
            AppError::Redis(e) => tracing::error!("Redis error: {:?}", e),
            AppError::Internal(e) => tracing::error!("Internal error: {:?}", e),
            AppError::Unavailable(msg) => tracing::warn!("Service unavailable: {}", msg),
            other => tracing::debug!(code = other.code(), "Request rejected: {}", other),
        }

        let body = Json(ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message().to_string(),
        });

        (self.status(), body).into_response()
    }
}
