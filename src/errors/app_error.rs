use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Result alias for handler-level fallible operations.
pub type AppResult<T> = Result<T, AppError>;

/// Request-level errors surfaced to HTTP callers.
///
/// Everything that the relay deliberately swallows (an unreachable
/// recognizer, a malformed upstream frame, a failed viewer push) never
/// becomes an `AppError` - those paths degrade a single session and are
/// only logged. What remains here is client input validation plus the few
/// places where the caller genuinely needs to know an upstream dependency
/// is not available.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The submitted audio fragment had zero length.
    #[error("audio fragment is empty")]
    EmptyPayload,

    /// The requested resource does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// An upstream dependency required for this request is not configured
    /// or not reachable (e.g. the text-generation endpoint).
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::EmptyPayload => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}
