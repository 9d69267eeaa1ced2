//! Error taxonomy for the HTTP surface.
//!
//! Collaborator failures are caught at the boundary and turned into structured
//! JSON responses; nothing here is allowed to take the process down. The voice
//! webhooks additionally never surface these directly — they fail safe with
//! apology markup instead (see `voice`).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("call was not accepted: status must be \"accepted\"")]
    InvalidStatus,

    #[error("missing required parameter: {0}")]
    MissingParameter(&'static str),

    #[error("no call found for sid {0}")]
    CallNotFound(String),

    #[error("no pending call to accept")]
    NoPendingCall,

    #[error("multiple calls are pending, a call_sid is required")]
    AmbiguousCall,

    #[error("telephony provider request failed: {0}")]
    Upstream(String),

    #[error("telephony provider is not configured")]
    NotConfigured,

    #[error("file upload failed: {0}")]
    Upload(String),

    #[error("failed to store uploaded file: {0}")]
    Storage(String),

    #[error("token signing failed: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl ApiError {
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidStatus => "INVALID_STATUS",
            ApiError::MissingParameter(_) => "MISSING_PARAMETER",
            ApiError::CallNotFound(_) => "CALL_NOT_FOUND",
            ApiError::NoPendingCall => "NO_PENDING_CALL",
            ApiError::AmbiguousCall => "AMBIGUOUS_CALL",
            ApiError::Upstream(_) => "UPSTREAM_ERROR",
            ApiError::NotConfigured => "NOT_CONFIGURED",
            ApiError::Upload(_) => "UPLOAD_FAILED",
            ApiError::Storage(_) => "STORAGE_ERROR",
            ApiError::Token(_) => "TOKEN_ERROR",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidStatus
            | ApiError::MissingParameter(_)
            | ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::CallNotFound(_) | ApiError::NoPendingCall => StatusCode::NOT_FOUND,
            ApiError::AmbiguousCall => StatusCode::CONFLICT,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Storage(_) | ApiError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let body = Json(json!({
            "success": false,
            "error": self.code(),
            "detail": self.to_string(),
        }));
        (status, body).into_response()
    }
}
