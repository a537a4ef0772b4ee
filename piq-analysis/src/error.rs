//! Error types for the piq-analysis HTTP surface

use crate::orchestrator::DispatchError;
use crate::progress::HubError;
use crate::target::TargetError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No authenticated identity (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated, but not allowed (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (409) - analysis already in progress
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Temporarily unable to accept work (503)
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "ANALYSIS_IN_PROGRESS", msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<TargetError> for ApiError {
    fn from(err: TargetError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        match err {
            HubError::Forbidden { .. } => ApiError::Forbidden(err.to_string()),
            HubError::ChannelClosed => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<DispatchError> for ApiError {
    fn from(err: DispatchError) -> Self {
        match err {
            DispatchError::AlreadyRunning => ApiError::Conflict(err.to_string()),
            DispatchError::Saturated | DispatchError::ShuttingDown => {
                ApiError::ServiceUnavailable(err.to_string())
            }
            DispatchError::Lock(_) | DispatchError::Store(_) => {
                tracing::error!(error = %err, "Analysis dispatch failed");
                ApiError::Internal(err.to_string())
            }
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
