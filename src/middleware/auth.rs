use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::auth::{Auth, extract_token};
use crate::errors::auth_error::AuthError;
use crate::state::AppState;

/// Authentication middleware that validates bearer tokens.
///
/// Token extraction priority (for browser/EventSource compatibility):
/// 1. Authorization header: `Authorization: Bearer <token>`
/// 2. Query parameter: `?token=<token>` (EventSource cannot set headers)
///
/// The middleware:
/// 1. Extracts the token from Authorization header or query parameter
/// 2. Verifies the HS256 signature and resolves the user id
/// 3. Inserts an [`Auth`] into request extensions on success
/// 4. Returns 401 if validation fails
///
/// When `auth_required` is disabled an anonymous `Auth` is inserted so
/// handlers that scope data per user keep working in development.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !state.config.auth_required {
        tracing::debug!("authentication disabled, inserting anonymous identity");
        request.extensions_mut().insert(Auth::empty());
        return Ok(next.run(request).await);
    }

    let token = extract_token(&request)?;

    let verifier = state
        .token_verifier
        .as_ref()
        .ok_or_else(|| AuthError::ConfigError("JWT secret not configured".to_string()))?;

    match verifier.verify(&token) {
        Ok(auth) => {
            tracing::debug!(
                user_id = ?auth.user_id,
                path = %request.uri().path(),
                "authentication successful"
            );
            request.extensions_mut().insert(auth);
            Ok(next.run(request).await)
        }
        Err(e) => {
            tracing::warn!(
                path = %request.uri().path(),
                error = %e,
                "authentication failed"
            );
            Err(e)
        }
    }
}
