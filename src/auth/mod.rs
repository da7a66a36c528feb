//! Viewer and clinician identity resolution
//!
//! Requests authenticate with an HS256-signed bearer token carrying the
//! user id. Browsers attach it as `Authorization: Bearer <token>`;
//! EventSource connections cannot set headers, so the same token is also
//! accepted as a `?token=` query parameter.

use axum::extract::Request;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::errors::auth_error::AuthError;

/// Resolved identity attached to a request via extensions.
///
/// `user_id` is `None` when authentication is disabled (development mode);
/// handlers that scope data per user fall back to a shared anonymous
/// identity in that case.
#[derive(Debug, Clone, Default)]
pub struct Auth {
    pub user_id: Option<String>,
}

impl Auth {
    /// Identity used when authentication is disabled.
    pub fn empty() -> Self {
        Self { user_id: None }
    }

    pub fn new(user_id: String) -> Self {
        Self {
            user_id: Some(user_id),
        }
    }

    /// The user id to scope sessions and records by.
    pub fn user_id_or_anonymous(&self) -> &str {
        self.user_id.as_deref().unwrap_or("anonymous")
    }
}

/// Access-token claims.
///
/// Current tokens store the user id under `sub`, but older tokens used a
/// `user_id` claim. Support both.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[allow(dead_code)]
    exp: usize,
}

/// Validates HS256 access tokens against the configured signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a token and resolve the user id it carries.
    pub fn verify(&self, token: &str) -> Result<Auth, AuthError> {
        let data = decode::<AccessClaims>(token, &self.key, &self.validation)
            .map_err(|_| AuthError::InvalidToken)?;

        let user_id = data
            .claims
            .user_id
            .or(data.claims.sub)
            .filter(|id| !id.is_empty())
            .ok_or(AuthError::InvalidToken)?;

        Ok(Auth::new(user_id))
    }
}

/// Extract an authentication token from a request.
///
/// Supports multiple token sources for browser compatibility:
/// 1. Authorization header: `Authorization: Bearer <token>` (preferred)
/// 2. Query parameter: `?token=<token>` (for EventSource connections)
pub fn extract_token(request: &Request) -> Result<String, AuthError> {
    // Try Authorization header first (preferred method)
    if let Some(auth_header) = request.headers().get("authorization") {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        if let Some(token) = auth_str.strip_prefix("Bearer ") {
            tracing::debug!("Token extracted from Authorization header");
            return Ok(token.to_string());
        }
        return Err(AuthError::InvalidAuthHeader);
    }

    // Try query parameter (for EventSource browser connections)
    if let Some(query) = request.uri().query() {
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            if key == "token" {
                tracing::debug!("Token extracted from query parameter");
                return Ok(value.to_string());
            }
        }
    }

    Err(AuthError::MissingAuthHeader)
}
