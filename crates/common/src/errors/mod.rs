//! Error types for the Tenon platform
//!
//! Provides:
//! - Distinct error types for different failure modes
//! - HTTP status code mapping
//! - The flat wire shape `{error, required?, role?}` expected by clients

use crate::rbac::{Permission, Role};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    #[error("Invalid format: {message}")]
    InvalidFormat { message: String },

    // Duplicate email / tenant domain on registration; clients treat this
    // as a form error, so it maps to 400 rather than 409
    #[error("{message}")]
    Duplicate { message: String },

    // Authentication errors
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{message}")]
    Unauthorized { message: String },

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Insufficient permissions")]
    PermissionDenied { required: Permission, role: Role },

    #[error("{message}")]
    Forbidden { message: String },

    #[error("Tenant mismatch")]
    TenantMismatch,

    // Resource errors
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    #[error("Tenant not found: {id}")]
    TenantNotFound { id: String },

    #[error("User not found: {id}")]
    UserNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    #[error("Schema provisioning failed: {message}")]
    Provisioning { message: String },

    // AI provider errors
    #[error("AI provider is not configured")]
    AiNotConfigured,

    #[error("AI provider error: {message}")]
    AiProvider { message: String },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Crypto error: {message}")]
    Crypto { message: String },

    #[error("Cache error: {message}")]
    CacheError { message: String },

    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Service unavailable: {message}")]
    ServiceUnavailable { message: String },

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. }
            | AppError::MissingField { .. }
            | AppError::InvalidFormat { .. }
            | AppError::Duplicate { .. }
            | AppError::AiNotConfigured => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::InvalidCredentials
            | AppError::Unauthorized { .. }
            | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::PermissionDenied { .. }
            | AppError::Forbidden { .. }
            | AppError::TenantMismatch => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. }
            | AppError::TenantNotFound { .. }
            | AppError::UserNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Provisioning { .. }
            | AppError::AiProvider { .. }
            | AppError::HttpClient(_)
            | AppError::Crypto { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::CacheError { .. } | AppError::ServiceUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Flat error body served to clients.
///
/// `required` and `role` are present only on permission denials.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl ErrorBody {
    fn from_error(err: &AppError) -> Self {
        match err {
            AppError::PermissionDenied { required, role } => ErrorBody {
                error: err.to_string(),
                required: Some(required.as_str().to_string()),
                role: Some(role.as_str().to_string()),
            },
            _ => ErrorBody {
                error: err.to_string(),
                required: None,
                role: None,
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                status = status.as_u16(),
                "Client error"
            );
        }

        let body = ErrorBody::from_error(&self);

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::CacheError {
            message: err.to_string(),
        }
    }
}

impl From<bcrypt::BcryptError> for AppError {
    fn from(err: bcrypt::BcryptError) -> Self {
        AppError::Crypto {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        let err = AppError::TenantNotFound { id: "t1".into() };
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);

        let err = AppError::Duplicate {
            message: "Email already registered".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);

        let err = AppError::InvalidCredentials;
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
        assert!(err.is_client_error());
    }

    #[test]
    fn test_permission_denied_body() {
        let err = AppError::PermissionDenied {
            required: Permission::RegopsCreate,
            role: Role::RegularUser,
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);

        let body = ErrorBody::from_error(&err);
        assert_eq!(body.required.as_deref(), Some("regops.create"));
        assert_eq!(body.role.as_deref(), Some("regular_user"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["required"], "regops.create");
        assert_eq!(json["role"], "regular_user");
    }

    #[test]
    fn test_plain_body_omits_rbac_fields() {
        let err = AppError::InvalidCredentials;
        let body = ErrorBody::from_error(&err);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["error"], "Invalid credentials");
        assert!(json.get("required").is_none());
        assert!(json.get("role").is_none());
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
