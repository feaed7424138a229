//! API error types and response handling.
//!
//! Every handler returns [`ApiResult`]; errors render as a consistent JSON
//! body with a machine-readable code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use bustrack_core::{StoreError, TrackerError};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Result type alias for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type.
#[derive(Debug, Clone)]
pub enum ApiError {
    /// 400 Bad Request - Invalid input from client.
    BadRequest {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 403 Forbidden - The observer's location is not available.
    Forbidden {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 404 Not Found - Resource does not exist.
    NotFound {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 409 Conflict - Operation does not fit the current session state.
    Conflict {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },

    /// 500 Internal Server Error - Unexpected server-side error.
    InternalError {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
        /// Optional details.
        details: Option<String>,
    },

    /// 503 Service Unavailable - A position feed is temporarily unavailable.
    ServiceUnavailable {
        /// Machine-readable error code.
        error_code: String,
        /// Human-readable error message.
        message: String,
    },
}

/// Standard JSON error response body.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "error": "NO_ACTIVE_SESSION",
    "message": "No active tracking session",
    "details": null
}))]
pub struct ErrorResponse {
    /// Machine-readable error code.
    #[schema(example = "NO_ACTIVE_SESSION")]
    pub error: String,

    /// Human-readable error message.
    #[schema(example = "No active tracking session")]
    pub message: String,

    /// Optional additional details for debugging.
    #[schema(nullable)]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// 400 with the given code and message.
    pub fn bad_request(error_code: &str, message: impl Into<String>) -> Self {
        Self::BadRequest {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }

    /// 404 with the given code and message.
    pub fn not_found(error_code: &str, message: impl Into<String>) -> Self {
        Self::NotFound {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message, details) = match self {
            Self::BadRequest {
                error_code,
                message,
            } => (StatusCode::BAD_REQUEST, error_code, message, None),
            Self::Forbidden {
                error_code,
                message,
            } => (StatusCode::FORBIDDEN, error_code, message, None),
            Self::NotFound {
                error_code,
                message,
            } => (StatusCode::NOT_FOUND, error_code, message, None),
            Self::Conflict {
                error_code,
                message,
            } => (StatusCode::CONFLICT, error_code, message, None),
            Self::InternalError {
                error_code,
                message,
                details,
            } => {
                tracing::error!(
                    error_code = %error_code,
                    message = %message,
                    details = ?details,
                    "Internal server error"
                );
                (StatusCode::INTERNAL_SERVER_ERROR, error_code, message, details)
            }
            Self::ServiceUnavailable {
                error_code,
                message,
            } => (StatusCode::SERVICE_UNAVAILABLE, error_code, message, None),
        };

        let body = ErrorResponse {
            error,
            message,
            details: details.map(serde_json::Value::String),
        };
        (status, Json(body)).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BadRequest { message, .. } => write!(f, "Bad Request: {message}"),
            Self::Forbidden { message, .. } => write!(f, "Forbidden: {message}"),
            Self::NotFound { message, .. } => write!(f, "Not Found: {message}"),
            Self::Conflict { message, .. } => write!(f, "Conflict: {message}"),
            Self::InternalError { message, .. } => write!(f, "Internal Error: {message}"),
            Self::ServiceUnavailable { message, .. } => {
                write!(f, "Service Unavailable: {message}")
            }
        }
    }
}

impl std::error::Error for ApiError {}

impl From<TrackerError> for ApiError {
    fn from(err: TrackerError) -> Self {
        let error_code = err.error_code().to_string();
        let message = err.to_string();

        match err {
            TrackerError::InvalidCoordinate { .. } | TrackerError::InvalidIdentifier(_) => {
                Self::BadRequest {
                    error_code,
                    message,
                }
            }
            TrackerError::PermissionDenied => Self::Forbidden {
                error_code,
                message,
            },
            TrackerError::TargetUnresolvable(_) | TrackerError::ConfigNotFound(_) => {
                Self::NotFound {
                    error_code,
                    message,
                }
            }
            TrackerError::NoActiveSession => Self::Conflict {
                error_code,
                message,
            },
            TrackerError::TransientSampleFailure(_) => Self::ServiceUnavailable {
                error_code,
                message,
            },
            TrackerError::ConfigParseError(_)
            | TrackerError::ConfigValidationError(_)
            | TrackerError::PersistenceError(_)
            | TrackerError::IoError(_) => Self::InternalError {
                error_code,
                message,
                details: None,
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::InternalError {
            error_code: "PERSISTENCE_ERROR".to_string(),
            message: "Failed to read session history".to_string(),
            details: Some(err.to_string()),
        }
    }
}
