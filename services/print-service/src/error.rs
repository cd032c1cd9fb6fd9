use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

use crate::domain::coupon::CouponError;
use crate::domain::order::TransitionError;
use crate::domain::pricing::PricingError;
use crate::utils::page_count::PageCountError;
use crate::utils::storage::StorageError;

// Error body shared by every endpoint
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

// Every failure the print service can surface
#[derive(Debug)]
pub enum AppError {
    DatabaseError(sqlx::Error),
    ValidationError(String),
    UnauthorizedError(String),
    ForbiddenError(String),
    NotFoundError(String),
    ConflictError(String),
    GoneError(String),
    PaymentError(String),
    GatewayError(String),
    StorageError(String),
    MaintenanceError,
    InternalError(String),
    TokenError(String),
    HttpClientError(reqwest::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::DatabaseError(e) => write!(f, "Database error: {}", e),
            AppError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
            AppError::UnauthorizedError(msg) => write!(f, "Unauthorized error: {}", msg),
            AppError::ForbiddenError(msg) => write!(f, "Forbidden error: {}", msg),
            AppError::NotFoundError(msg) => write!(f, "Not found: {}", msg),
            AppError::ConflictError(msg) => write!(f, "Conflict: {}", msg),
            AppError::GoneError(msg) => write!(f, "Gone: {}", msg),
            AppError::PaymentError(msg) => write!(f, "Payment error: {}", msg),
            AppError::GatewayError(msg) => write!(f, "Gateway error: {}", msg),
            AppError::StorageError(msg) => write!(f, "Storage error: {}", msg),
            AppError::MaintenanceError => write!(f, "Service under maintenance"),
            AppError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            AppError::TokenError(msg) => write!(f, "Token error: {}", msg),
            AppError::HttpClientError(e) => write!(f, "HTTP client error: {}", e),
        }
    }
}

impl std::error::Error for AppError {}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        AppError::InternalError(format!("Migration failed: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for AppError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        AppError::TokenError(err.to_string())
    }
}

impl From<shared::utils::jwt::JwtError> for AppError {
    fn from(err: shared::utils::jwt::JwtError) -> Self {
        AppError::TokenError(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::HttpClientError(err)
    }
}

impl From<PricingError> for AppError {
    fn from(err: PricingError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<PageCountError> for AppError {
    fn from(err: PageCountError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<axum_extra::extract::multipart::MultipartError> for AppError {
    fn from(err: axum_extra::extract::multipart::MultipartError) -> Self {
        AppError::ValidationError(format!("Invalid multipart body: {}", err))
    }
}

impl From<CouponError> for AppError {
    fn from(err: CouponError) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<TransitionError> for AppError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::NotAllowed => AppError::ForbiddenError(err.to_string()),
            other => AppError::ConflictError(other.to_string()),
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => {
                AppError::NotFoundError(format!("File not found: {}", path))
            }
            StorageError::InvalidPath(path) => {
                AppError::ValidationError(format!("Invalid file path: {}", path))
            }
            other => AppError::StorageError(other.to_string()),
        }
    }
}

fn debug_details(msg: String) -> Option<String> {
    if cfg!(debug_assertions) {
        Some(msg)
    } else {
        None
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match &self {
            AppError::DatabaseError(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "database_error",
                    "A database error occurred",
                    debug_details(e.to_string()),
                )
            }
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                msg.as_str(),
                None,
            ),
            AppError::UnauthorizedError(msg) => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                msg.as_str(),
                None,
            ),
            AppError::ForbiddenError(msg) => {
                (StatusCode::FORBIDDEN, "forbidden", msg.as_str(), None)
            }
            AppError::NotFoundError(msg) => {
                (StatusCode::NOT_FOUND, "not_found", msg.as_str(), None)
            }
            AppError::ConflictError(msg) => {
                (StatusCode::CONFLICT, "conflict", msg.as_str(), None)
            }
            AppError::GoneError(msg) => (StatusCode::GONE, "gone", msg.as_str(), None),
            AppError::PaymentError(msg) => {
                tracing::warn!("Payment error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "payment_error",
                    msg.as_str(),
                    None,
                )
            }
            AppError::GatewayError(msg) => {
                tracing::error!("Gateway error: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "payment_gateway_error",
                    "The payment gateway could not be reached, please try again",
                    debug_details(msg.clone()),
                )
            }
            AppError::StorageError(msg) => {
                tracing::error!("Storage error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "storage_error",
                    "A file storage error occurred",
                    debug_details(msg.clone()),
                )
            }
            AppError::MaintenanceError => (
                StatusCode::SERVICE_UNAVAILABLE,
                "maintenance",
                "FastCopy is under maintenance, please check back soon",
                None,
            ),
            AppError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal server error occurred",
                    debug_details(msg.clone()),
                )
            }
            AppError::TokenError(msg) => (
                StatusCode::UNAUTHORIZED,
                "token_error",
                "Token is invalid or expired",
                debug_details(msg.clone()),
            ),
            AppError::HttpClientError(e) => {
                tracing::error!("HTTP client error: {:?}", e);
                (
                    StatusCode::BAD_GATEWAY,
                    "http_client_error",
                    "Communication with an external service failed",
                    debug_details(e.to_string()),
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
            details,
        };

        (status, Json(error_response)).into_response()
    }
}

// Constructors
impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        AppError::NotFoundError(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::ConflictError(msg.into())
    }

    pub fn gone(msg: impl Into<String>) -> Self {
        AppError::GoneError(msg.into())
    }

    pub fn payment(msg: impl Into<String>) -> Self {
        AppError::PaymentError(msg.into())
    }

    pub fn gateway(msg: impl Into<String>) -> Self {
        AppError::GatewayError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        AppError::InternalError(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        AppError::UnauthorizedError(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        AppError::ForbiddenError(msg.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;
