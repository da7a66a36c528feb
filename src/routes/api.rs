use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{notes, transcription};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router with protected routes
///
/// Note: Authentication middleware should be applied in main.rs after state is available
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/appointments/{id}/transcription",
            get(transcription::list_transcriptions),
        )
        .route(
            "/appointments/{id}/notes/draft",
            post(notes::generate_note_draft),
        )
        .layer(TraceLayer::new_for_http())
}
