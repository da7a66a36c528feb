use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Result alias for authentication operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Authentication and credential-resolution failures.
///
/// All variants except `ConfigError` map to 401 so that callers cannot
/// distinguish a missing token from an invalid one.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing authorization")]
    MissingAuthHeader,

    #[error("invalid authorization header")]
    InvalidAuthHeader,

    #[error("invalid token")]
    InvalidToken,

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("auth configuration error: {0}")]
    ConfigError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        // Terse bodies: callers cannot distinguish why a credential failed
        match self {
            AuthError::ConfigError(msg) => {
                tracing::error!("auth configuration error: {msg}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": "Internal server error" })),
                )
                    .into_response()
            }
            _ => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "message": "Unauthorized" })),
            )
                .into_response(),
        }
    }
}
