//! Typed error hierarchy for the gateway
//!
//! - `app_error` - request-level errors surfaced to HTTP callers
//! - `auth_error` - authentication and credential resolution failures

pub mod app_error;
pub mod auth_error;

pub use app_error::{AppError, AppResult};
pub use auth_error::{AuthError, AuthResult};
