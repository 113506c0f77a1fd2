//! Error types for utamemo-ai

use crate::services::{CardGenerationError, LineCardError};
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
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Caller may not act on the resource (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Conflict (409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Language model missing or credentials rejected (503)
    #[error("Language model not configured: {0}")]
    LlmNotConfigured(String),

    /// Language model call or reply failed (502)
    #[error("Language model error: {0}")]
    Llm(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),

    /// utamemo-common error
    #[error("Common error: {0}")]
    Common(utamemo_common::Error),
}

impl From<utamemo_common::Error> for ApiError {
    fn from(err: utamemo_common::Error) -> Self {
        match err {
            utamemo_common::Error::NotFound(msg) => ApiError::NotFound(msg),
            utamemo_common::Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Common(other),
        }
    }
}

impl From<CardGenerationError> for ApiError {
    fn from(err: CardGenerationError) -> Self {
        if err.is_configuration() {
            ApiError::LlmNotConfigured(err.to_string())
        } else {
            ApiError::Llm(err.to_string())
        }
    }
}

impl From<LineCardError> for ApiError {
    fn from(err: LineCardError) -> Self {
        match err {
            LineCardError::Generation(e) => e.into(),
            LineCardError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg),
            ApiError::LlmNotConfigured(msg) => (StatusCode::SERVICE_UNAVAILABLE, "LLM_NOT_CONFIGURED", msg),
            ApiError::Llm(msg) => (StatusCode::BAD_GATEWAY, "LLM_ERROR", msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string()),
            ApiError::Common(ref err) => {
                tracing::error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", err.to_string())
            }
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

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_common_errors_map_to_client_statuses() {
        let not_found: ApiError = utamemo_common::Error::NotFound("song".into()).into();
        assert_eq!(not_found.into_response().status(), StatusCode::NOT_FOUND);

        let invalid: ApiError = utamemo_common::Error::InvalidInput("title".into()).into();
        assert_eq!(invalid.into_response().status(), StatusCode::BAD_REQUEST);

        let internal: ApiError = utamemo_common::Error::Internal("boom".into()).into();
        assert_eq!(internal.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_card_generation_errors_map_to_upstream_statuses() {
        let unauthorized: ApiError = CardGenerationError::Llm(LlmError::Unauthorized(401)).into();
        assert_eq!(unauthorized.into_response().status(), StatusCode::SERVICE_UNAVAILABLE);

        let upstream: ApiError = CardGenerationError::Llm(LlmError::Api(500, "down".into())).into();
        assert_eq!(upstream.into_response().status(), StatusCode::BAD_GATEWAY);

        let garbled: ApiError = CardGenerationError::InvalidResponse("no json".into()).into();
        assert_eq!(garbled.into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
