//! Unified error handling for RelayBill
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the application, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    // ==================== Authentication Errors ====================
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: insufficient permissions")]
    Forbidden,

    #[error("Multi-factor authentication required")]
    MfaRequired,

    // ==================== Business Logic Errors ====================
    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Invalid billing period: {0}")]
    InvalidPeriod(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // ==================== External Service Errors ====================
    #[error("{service} unavailable: {message}")]
    Upstream { service: String, message: String },
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) | AppError::InvalidPeriod(_) => {
                StatusCode::BAD_REQUEST
            }

            // 401 Unauthorized
            AppError::InvalidToken(_) | AppError::TokenExpired | AppError::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            AppError::Forbidden | AppError::MfaRequired => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::CustomerNotFound(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_) | AppError::AlreadyExists(_) => StatusCode::CONFLICT,

            // 502 Bad Gateway
            AppError::Upstream { .. } => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden => "forbidden",
            AppError::MfaRequired => "mfa_required",
            AppError::CustomerNotFound(_) => "customer_not_found",
            AppError::InvalidPeriod(_) => "invalid_period",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::AlreadyExists(_) => "already_exists",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
            AppError::Upstream { .. } => "upstream_unavailable",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(AppError::TokenExpired.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::MfaRequired.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::CustomerNotFound("42".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidPeriod("end before start".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Upstream {
                service: "twilio".to_string(),
                message: "timeout".to_string()
            }
            .status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(AppError::MfaRequired.error_code(), "mfa_required");
        assert_eq!(
            AppError::CustomerNotFound("1".to_string()).error_code(),
            "customer_not_found"
        );
    }

    #[test]
    fn test_upstream_display() {
        let err = AppError::Upstream {
            service: "retell".to_string(),
            message: "HTTP 503".to_string(),
        };
        assert_eq!(err.to_string(), "retell unavailable: HTTP 503");
    }
}
