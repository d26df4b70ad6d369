//! Error Types for the Tidings API
//!
//! - `ErrorCode` categorises failures and maps each to an HTTP status
//! - `ApiError` is the JSON error body returned by every endpoint
//! - `From<FeedError>` translates domain errors at the HTTP boundary
//!
//! Range store failures keep the store's own status code when it is a valid
//! HTTP error status, so callers see the same code the store reported.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tidings_core::{AccessError, FeedError, StorageError, ValidationError};

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request is well-formed but the caller lacks the permission.
    Forbidden,

    /// Request validation failed
    ValidationFailed,

    /// Request contains invalid input data
    InvalidInput,

    /// Required field is missing from request
    MissingField,

    /// Caller's scope is not registered
    ScopeNotFound,

    /// A record with the same tick already exists
    EntityAlreadyExists,

    /// Requested window is older than the retention policy allows
    Expired,

    /// A single record exceeds the result size ceiling
    PayloadTooLarge,

    /// The range store reported a failure
    StoreError,

    /// Operation timed out
    Timeout,

    /// Internal server error
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,

            ErrorCode::ValidationFailed | ErrorCode::InvalidInput | ErrorCode::MissingField => {
                StatusCode::BAD_REQUEST
            }

            ErrorCode::ScopeNotFound => StatusCode::NOT_FOUND,
            ErrorCode::EntityAlreadyExists => StatusCode::CONFLICT,
            ErrorCode::Expired => StatusCode::GONE,
            ErrorCode::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ErrorCode::StoreError => StatusCode::BAD_GATEWAY,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::ScopeNotFound => "Scope not found",
            ErrorCode::EntityAlreadyExists => "Entity already exists",
            ErrorCode::Expired => "Requested window has expired; resynchronise from source",
            ErrorCode::PayloadTooLarge => "Record exceeds the result size ceiling",
            ErrorCode::StoreError => "Range store request failed",
            ErrorCode::Timeout => "Operation timed out",
            ErrorCode::InternalError => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    /// Status reported by an upstream store, replacing the code's default.
    #[serde(skip)]
    pub upstream_status: Option<u16>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            upstream_status: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.upstream_status
            .and_then(|status| StatusCode::from_u16(status).ok())
            .filter(|status| status.is_client_error() || status.is_server_error())
            .unwrap_or_else(|| self.code.status_code())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn scope_not_found(scope: impl fmt::Display) -> Self {
        Self::new(ErrorCode::ScopeNotFound, format!("Scope {} not found", scope))
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// A store failure carrying the store's status code.
    pub fn store_status(status: u16, reason: impl fmt::Display) -> Self {
        let mut err = Self::new(
            ErrorCode::StoreError,
            format!("Range store returned status {}: {}", status, reason),
        )
        .with_details(serde_json::json!({ "status": status }));
        err.upstream_status = Some(status);
        err
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<FeedError> for ApiError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::Storage(StorageError::Status { status, reason }) => {
                ApiError::store_status(status, reason)
            }
            FeedError::Storage(StorageError::Timeout { elapsed_ms }) => {
                ApiError::from_code(ErrorCode::Timeout)
                    .with_details(serde_json::json!({ "elapsedMs": elapsed_ms }))
            }
            FeedError::Storage(StorageError::DuplicateTick { partition, tick }) => ApiError::new(
                ErrorCode::EntityAlreadyExists,
                format!("Tick {} already exists in {}", tick, partition),
            ),
            FeedError::Storage(err @ StorageError::StalledScan { .. }) => {
                ApiError::new(ErrorCode::StoreError, err.to_string())
            }
            FeedError::Storage(StorageError::LockPoisoned) => {
                tracing::error!("Storage lock poisoned");
                ApiError::from_code(ErrorCode::InternalError)
            }
            FeedError::Access(AccessError::UnknownScope { scope }) => {
                ApiError::scope_not_found(scope)
            }
            FeedError::Access(AccessError::PermissionDenied { user_id, operation }) => {
                ApiError::forbidden(format!(
                    "User {} may not perform {}",
                    user_id, operation
                ))
            }
            FeedError::Validation(ValidationError::RequiredFieldMissing { field }) => {
                ApiError::missing_field(&field)
            }
            FeedError::Validation(err @ ValidationError::InvalidValue { .. }) => {
                ApiError::new(ErrorCode::ValidationFailed, err.to_string())
            }
            FeedError::Config(err) => {
                tracing::error!(error = %err, "Configuration error surfaced to a request");
                ApiError::from_code(ErrorCode::InternalError)
            }
            err @ FeedError::Expired { .. } => {
                ApiError::new(ErrorCode::Expired, err.to_string())
            }
            FeedError::RecordTooLarge { tick, limit } => ApiError::new(
                ErrorCode::PayloadTooLarge,
                format!("Record at tick {} exceeds the {} byte ceiling", tick, limit),
            )
            .with_details(serde_json::json!({ "tick": tick, "limit": limit })),
        }
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;
